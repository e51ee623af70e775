use crate::service::ServiceState;
use crate::types::auth::{AuthRequest, AuthResponse, AuthUser, HealthResponse};
use crate::{RollcallError, router::RollcallState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

/// POST /api/auth/login
pub async fn login_handler(
    State(state): State<RollcallState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, RollcallError> {
    let username = state.auth.login(request).await?;
    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        user: AuthUser { id: None, username },
    }))
}

/// POST /api/auth/signup
pub async fn signup_handler(
    State(state): State<RollcallState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, RollcallError> {
    let created = state.auth.signup(request).await?;
    Ok(Json(AuthResponse {
        success: true,
        message: "Account created successfully".to_string(),
        user: AuthUser {
            id: Some(created.id),
            username: created.username,
        },
    }))
}

/// GET /api/health -> service state and store reachability.
pub async fn health_handler(
    State(state): State<RollcallState>,
) -> Result<impl IntoResponse, RollcallError> {
    let service_state = state.auth.status().await?;
    let database = match state.connections.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            warn!(error = %e, "health check could not reach the store");
            "down"
        }
    };
    let healthy = database == "up" && service_state == ServiceState::Ready;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((
        status,
        Json(HealthResponse {
            state: service_state,
            database,
        }),
    ))
}
