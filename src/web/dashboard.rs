use crate::analytics::dashboard::{build_dashboard, DashboardData, DashboardInput};
use crate::analytics::latest::LatestRequestGuard;
use crate::db::SurveyStore;
use crate::domain::filters::Filters;
use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use crate::web::session::AdminSession;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::hash::Hash;
use uuid::Uuid;

#[derive(Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:deployment_id", get(dashboard))
        .route("/:deployment_id/recommendations", post(recommendations))
        .with_state(state)
}

fn parse_filters(query: Result<Query<Filters>, QueryRejection>) -> AppResult<Filters> {
    query
        .map(|Query(filters)| filters)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

async fn compute(state: &SharedState, deployment_id: Uuid, filters: &Filters) -> AppResult<DashboardData> {
    let deployment = state.store.load_deployment(deployment_id).await?;
    let template = state.store.load_template(deployment.template_id).await?;
    let respondents = state.store.load_respondents(deployment_id).await?;

    let input = DashboardInput {
        template: &template,
        respondents: &respondents,
        survey_status: deployment.status,
        total_invited: deployment.total_invited,
    };
    Ok(build_dashboard(&input, filters))
}

/// Runs `work` under a fresh token for `key` and drops its result if a newer
/// request for the same key was issued meanwhile.
async fn latest_only<K, T, F>(guard: &LatestRequestGuard<K>, key: &K, work: F) -> AppResult<T>
where
    K: Eq + Hash + Clone,
    F: Future<Output = AppResult<T>>,
{
    let token = guard.issue(key).await;
    let result = work.await?;
    if !guard.is_latest(key, token).await {
        tracing::debug!("Dropping stale dashboard result {}", token);
        return Err(AppError::Superseded);
    }
    Ok(result)
}

async fn dashboard(
    AdminSession(admin_id): AdminSession,
    State(state): State<SharedState>,
    Path(deployment_id): Path<Uuid>,
    query: Result<Query<Filters>, QueryRejection>,
) -> AppResult<Json<DashboardData>> {
    let filters = parse_filters(query)?;
    let key = (admin_id, deployment_id);
    let data = latest_only(
        &state.dashboard_requests,
        &key,
        compute(&state, deployment_id, &filters),
    )
    .await?;
    Ok(Json(data))
}

async fn recommendations(
    AdminSession(_admin_id): AdminSession,
    State(state): State<SharedState>,
    Path(deployment_id): Path<Uuid>,
    query: Result<Query<Filters>, QueryRejection>,
) -> AppResult<Json<RecommendationsResponse>> {
    let ai = state
        .ai
        .clone()
        .ok_or(AppError::Unavailable("AI recommendations"))?;
    let filters = parse_filters(query)?;
    let data = compute(&state, deployment_id, &filters).await?;

    let scores = domain_scores(&data);
    if scores.is_empty() {
        return Err(AppError::BadRequest(
            "Nenhuma resposta corresponde aos filtros selecionados".to_string(),
        ));
    }
    let context: Vec<(String, String)> = filters
        .active()
        .into_iter()
        .map(|(key, value)| (key.as_str().to_string(), value.to_string()))
        .collect();

    let recommendations = ai.recommend(&scores, &context).await.map_err(|e| {
        tracing::error!("Recommendation generation failed for {}: {}", deployment_id, e);
        AppError::Internal(e.to_string())
    })?;
    Ok(Json(RecommendationsResponse { recommendations }))
}

/// Domains without any answers are left out of the AI input.
fn domain_scores(data: &DashboardData) -> BTreeMap<String, f64> {
    data.domains
        .iter()
        .filter(|d| d.domain_score > 0.0)
        .map(|d| (d.domain_name.clone(), d.domain_score))
        .collect()
}
