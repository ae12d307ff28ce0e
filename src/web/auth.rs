use crate::db;
use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use crate::web::session::{self, AdminSession};
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub admin_id: Uuid,
    pub name: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct CurrentAdmin {
    pub admin_id: Uuid,
    pub name: String,
    pub email: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .with_state(state)
}

async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let ip = state.login_limiter.client_key(&headers, &addr);
    if !state.login_limiter.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(AppError::RateLimited);
    }

    let admin = db::find_admin_by_email(&state.pool, payload.email.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&admin.hash).map_err(|_| AppError::Unauthorized)?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            tracing::warn!("Failed login for {}", admin.email);
            AppError::Unauthorized
        })?;

    let token = session::sign_session(admin.id, &state.session_key)
        .map_err(|e| AppError::Internal(format!("session signing failed: {e}")))?;

    let secure_flag = if state.secure_cookies { "; Secure" } else { "" };
    let cookie = HeaderValue::from_str(&format!(
        "session={token}; HttpOnly; SameSite=Lax; Path=/{secure_flag}"
    ))
    .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, cookie);

    tracing::info!("Admin {} logged in", admin.id);
    Ok((
        response_headers,
        Json(LoginResponse {
            admin_id: admin.id,
            name: admin.name,
            token,
        }),
    ))
}

async fn me(
    AdminSession(admin_id): AdminSession,
    State(state): State<SharedState>,
) -> AppResult<Json<CurrentAdmin>> {
    let admin = db::find_admin_by_id(&state.pool, admin_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(CurrentAdmin {
        admin_id: admin.id,
        name: admin.name,
        email: admin.email,
    }))
}
