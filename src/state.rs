use crate::analytics::latest::LatestRequestGuard;
use crate::db::PgStore;
use crate::middleware::RateLimiter;
use crate::services::ai::AiService;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: PgStore,
    pub ai: Option<Arc<AiService>>,
    pub session_key: Vec<u8>,
    pub secure_cookies: bool,
    pub submit_limiter: RateLimiter,
    pub login_limiter: RateLimiter,
    pub dashboard_requests: LatestRequestGuard<(Uuid, Uuid)>, // (admin_id, deployment_id)
}

pub type SharedState = Arc<AppState>;
