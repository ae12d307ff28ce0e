use crate::db::{self, SurveyStore};
use crate::domain::models::{Demographics, DeploymentStatus, OrgUnitKind, SurveyTemplate};
use crate::domain::scoring::LikertResponse;
use crate::error::{AppError, AppResult};
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::services::ingestion;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Serialize)]
struct PublicQuestion {
    id: Uuid,
    code: String,
    text: String,
}

#[derive(Serialize)]
struct PublicDomain {
    name: String,
    questions: Vec<PublicQuestion>,
}

#[derive(Serialize, Default)]
struct OrgOptions {
    units: Vec<String>,
    sectors: Vec<String>,
    positions: Vec<String>,
}

#[derive(Serialize)]
struct QuestionnaireResponse {
    deployment_id: Uuid,
    name: String,
    status: DeploymentStatus,
    scale: Vec<&'static str>,
    domains: Vec<PublicDomain>,
    org_options: OrgOptions,
}

#[derive(Deserialize)]
struct SubmitPayload {
    #[serde(default)]
    demographics: Demographics,
    responses: HashMap<Uuid, String>,
}

#[derive(Serialize)]
struct SubmitResponse {
    respondent_id: Uuid,
}

pub fn router(state: SharedState) -> Router {
    let submit_routes = Router::new()
        .route("/:deployment_id/submit", post(submit))
        .route_layer(middleware::from_fn_with_state(
            state.submit_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/:deployment_id", get(questionnaire))
        .merge(submit_routes)
        .with_state(state)
}

/// Scoring direction and benchmarks stay server-side.
fn public_domains(template: &SurveyTemplate) -> Vec<PublicDomain> {
    template
        .domains
        .iter()
        .map(|d| PublicDomain {
            name: d.name.clone(),
            questions: d
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    id: q.id,
                    code: q.code.clone(),
                    text: q.text.clone(),
                })
                .collect(),
        })
        .collect()
}

async fn questionnaire(
    State(state): State<SharedState>,
    Path(deployment_id): Path<Uuid>,
) -> AppResult<Json<QuestionnaireResponse>> {
    let deployment = state.store.load_deployment(deployment_id).await?;
    let template = state.store.load_template(deployment.template_id).await?;

    let mut org_options = OrgOptions::default();
    for unit in db::list_org_units(&state.pool, deployment.company_id).await? {
        match unit.kind {
            OrgUnitKind::Unit => org_options.units.push(unit.name),
            OrgUnitKind::Sector => org_options.sectors.push(unit.name),
            OrgUnitKind::Position => org_options.positions.push(unit.name),
        }
    }

    Ok(Json(QuestionnaireResponse {
        deployment_id,
        name: deployment.name,
        status: deployment.status,
        scale: LikertResponse::ALL.iter().map(|r| r.label()).collect(),
        domains: public_domains(&template),
        org_options,
    }))
}

async fn submit(
    State(state): State<SharedState>,
    Path(deployment_id): Path<Uuid>,
    Json(payload): Json<SubmitPayload>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    if payload.responses.is_empty() {
        return Err(AppError::BadRequest("Nenhuma resposta enviada".to_string()));
    }

    let respondent_id = ingestion::submit(
        &state.store,
        deployment_id,
        payload.demographics,
        &payload.responses,
    )
    .await
    .map_err(|e| {
        tracing::warn!("Submission to deployment {} rejected: {}", deployment_id, e);
        e
    })?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { respondent_id })))
}
