use crate::db::ConnectionManager;
use crate::handlers::auth::{health_handler, login_handler, signup_handler};
use crate::service::AuthHandle;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct RollcallState {
    pub auth: AuthHandle,
    pub connections: Arc<ConnectionManager>,
}

impl RollcallState {
    pub fn new(auth: AuthHandle, connections: Arc<ConnectionManager>) -> Self {
        Self { auth, connections }
    }
}

pub fn rollcall_router(state: RollcallState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}
