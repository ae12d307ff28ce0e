mod analytics;
mod config;
mod db;
mod domain;
mod error;
mod middleware;
mod services;
mod state;
mod web;

use crate::analytics::latest::LatestRequestGuard;
use crate::config::AppConfig;
use crate::db::{seed, PgStore};
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let bootstrap_admin = config
        .bootstrap_admin
        .as_ref()
        .map(|(email, password)| (email.as_str(), password.as_str()));
    seed::seed_all(&pool, bootstrap_admin).await?;

    let ai = match &config.openai_api_key {
        Some(key) => Some(Arc::new(services::ai::AiService::new(
            key.clone(),
            config.openai_model.clone(),
        ))),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, AI recommendations disabled");
            None
        }
    };

    let shared: SharedState = Arc::new(state::AppState {
        store: PgStore::new(pool.clone()),
        pool,
        ai,
        session_key: config.session_key.clone(),
        secure_cookies: config.secure_cookies,
        submit_limiter: RateLimiter::new(config.submit_rate_limit, config.submit_rate_window_secs)
            .trusting_proxy(config.trust_proxy),
        login_limiter: RateLimiter::new(5, 60).trusting_proxy(config.trust_proxy),
        dashboard_requests: LatestRequestGuard::new(),
    });

    let scheduler = JobScheduler::new().await?;

    // Rate limiter and dashboard token cleanup - hourly
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.submit_limiter.cleanup().await;
                state.login_limiter.cleanup().await;
                let tracked = state
                    .dashboard_requests
                    .prune(std::time::Duration::from_secs(3600))
                    .await;
                tracing::debug!("Dashboard request guard: {} tracked keys", tracked);
            })
        })?)
        .await?;

    // Close deployments past their closing time - every 5 minutes
    let shared_for_close = shared.clone();
    scheduler
        .add(Job::new_async("0 */5 * * * *", move |_uuid, _l| {
            let state = shared_for_close.clone();
            Box::pin(async move {
                match db::close_expired_deployments(&state.pool, chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(closed) => tracing::info!("Closed {} expired deployments", closed),
                    Err(e) => tracing::error!("Failed to close expired deployments: {}", e),
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Rate limiter and dashboard token cleanup: hourly");
    tracing::info!("  - Deployment auto-close: every 5 min");

    let app = Router::new().merge(web::routes(shared.clone())).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive()),
    );

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
