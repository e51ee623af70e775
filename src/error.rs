use crate::service::credential_service::ServiceState;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RollcallError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Credential service not ready (state: {0})")]
    NotReady(ServiceState),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreFailure> for RollcallError {
    fn from(e: StoreFailure) -> Self {
        if e.is_connectivity() {
            return RollcallError::Connectivity(e.to_string());
        }
        match e {
            StoreFailure::Sql(e) => RollcallError::Database(e),
            timeout @ StoreFailure::Timeout(_) => RollcallError::Connectivity(timeout.to_string()),
        }
    }
}

/// Failure of a single bounded round trip to the store.
#[derive(Debug, ThisError)]
pub enum StoreFailure {
    #[error(transparent)]
    Sql(#[from] SqlxError),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl StoreFailure {
    /// The store could not be reached or did not answer in time.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            StoreFailure::Timeout(_)
                | StoreFailure::Sql(
                    SqlxError::PoolTimedOut
                        | SqlxError::PoolClosed
                        | SqlxError::WorkerCrashed
                        | SqlxError::Io(_)
                )
        )
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreFailure::Sql(SqlxError::Database(db)) if db.is_unique_violation())
    }
}

impl RollcallError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RollcallError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            RollcallError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            RollcallError::DuplicateUsername(_) => (StatusCode::CONFLICT, "DUPLICATE_USERNAME"),
            RollcallError::NotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            RollcallError::Connectivity(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            RollcallError::Schema(_)
            | RollcallError::Database(_)
            | RollcallError::Config(_)
            | RollcallError::RactorError(_)
            | RollcallError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for RollcallError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            RollcallError::InvalidCredentials
            | RollcallError::InvalidInput(_)
            | RollcallError::DuplicateUsername(_) => self.to_string(),
            RollcallError::NotReady(_) | RollcallError::Connectivity(_) => {
                "Authentication is temporarily unavailable.".to_string()
            }
            _ => "An internal server error occurred.".to_string(),
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
