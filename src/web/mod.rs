pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod session;
pub mod survey;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/survey", survey::router(state.clone()))
        .nest("/dashboard", dashboard::router(state.clone()))
        .nest("/admin", admin::router(state))
}
