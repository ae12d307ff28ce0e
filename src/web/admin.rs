use crate::db::{self, NewDeployment, SurveyStore, TemplateSummary};
use crate::domain::models::{Company, Deployment, DeploymentStatus, OrgUnit, OrgUnitKind, SurveyTemplate};
use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use crate::web::session::AdminSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateCompanyPayload {
    pub name: String,
    pub registration_number: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateOrgUnitPayload {
    pub kind: OrgUnitKind,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateDeploymentPayload {
    pub company_id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub total_invited: i32,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdateStatusPayload {
    pub status: DeploymentStatus,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/:company_id/org-units",
            get(list_org_units).post(create_org_unit),
        )
        .route("/companies/:company_id/deployments", get(list_deployments))
        .route("/templates", get(list_templates))
        .route("/templates/:template_id", get(get_template))
        .route("/deployments", post(create_deployment))
        .route("/deployments/:deployment_id/status", post(update_status))
        .with_state(state)
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("O campo {field} é obrigatório")));
    }
    Ok(trimmed.to_string())
}

async fn list_companies(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
) -> AppResult<Json<Vec<Company>>> {
    Ok(Json(db::list_companies(&state.pool).await?))
}

async fn create_company(
    AdminSession(admin_id): AdminSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateCompanyPayload>,
) -> AppResult<(StatusCode, Json<Company>)> {
    let name = required(&payload.name, "name")?;
    let company = db::insert_company(
        &state.pool,
        &name,
        payload.registration_number.as_deref().map(str::trim),
    )
    .await
    .map_err(AppError::saving)?;
    tracing::info!("Admin {} created company {}", admin_id, company.id);
    Ok((StatusCode::CREATED, Json(company)))
}

async fn list_org_units(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<OrgUnit>>> {
    Ok(Json(db::list_org_units(&state.pool, company_id).await?))
}

async fn create_org_unit(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<CreateOrgUnitPayload>,
) -> AppResult<(StatusCode, Json<OrgUnit>)> {
    let name = required(&payload.name, "name")?;
    let unit = db::insert_org_unit(&state.pool, company_id, payload.kind, &name, payload.parent_id)
        .await
        .map_err(AppError::saving)?;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn list_templates(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(db::list_templates(&state.pool).await?))
}

async fn get_template(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
    Path(template_id): Path<Uuid>,
) -> AppResult<Json<SurveyTemplate>> {
    Ok(Json(state.store.load_template(template_id).await?))
}

async fn list_deployments(
    AdminSession(_): AdminSession,
    State(state): State<SharedState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Deployment>>> {
    Ok(Json(db::list_deployments(&state.pool, company_id).await?))
}

async fn create_deployment(
    AdminSession(admin_id): AdminSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateDeploymentPayload>,
) -> AppResult<(StatusCode, Json<Deployment>)> {
    let name = required(&payload.name, "name")?;
    if payload.total_invited < 0 {
        return Err(AppError::BadRequest("total_invited não pode ser negativo".to_string()));
    }
    let opens_at = payload.opens_at.unwrap_or_else(Utc::now);
    if matches!(payload.closes_at, Some(closes_at) if closes_at <= opens_at) {
        return Err(AppError::BadRequest("closes_at deve ser posterior a opens_at".to_string()));
    }

    // Fails with 404 before insert when the template does not exist
    state.store.load_template(payload.template_id).await?;

    let deployment = db::insert_deployment(
        &state.pool,
        &NewDeployment {
            company_id: payload.company_id,
            template_id: payload.template_id,
            name: &name,
            total_invited: payload.total_invited,
            opens_at,
            closes_at: payload.closes_at,
        },
    )
    .await
    .map_err(AppError::saving)?;
    tracing::info!("Admin {} created deployment {}", admin_id, deployment.id);
    Ok((StatusCode::CREATED, Json(deployment)))
}

async fn update_status(
    AdminSession(admin_id): AdminSession,
    State(state): State<SharedState>,
    Path(deployment_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> AppResult<Json<Deployment>> {
    let deployment = db::update_deployment_status(&state.pool, deployment_id, payload.status)
        .await
        .map_err(AppError::saving)?
        .ok_or(AppError::NotFound { entity: "deployment" })?;
    tracing::info!(
        "Admin {} set deployment {} to {:?}",
        admin_id,
        deployment_id,
        payload.status
    );
    Ok(Json(deployment))
}
