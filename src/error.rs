use crate::db::StoreError;
use crate::domain::scoring::ScoringError;
use crate::services::ingestion::IngestionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error type for HTTP handlers. Renders `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("could not load data: {0}")]
    Load(#[source] StoreError),

    #[error("could not save data: {0}")]
    Save(#[source] StoreError),

    #[error("conflicts with an existing record: {0}")]
    Conflict(String),

    #[error("referenced record does not exist: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Submit(#[from] IngestionError),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("too many requests")]
    RateLimited,

    #[error("request superseded by a newer one")]
    Superseded,

    #[error("service unavailable: {0}")]
    Unavailable(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, .. } => AppError::NotFound { entity },
            StoreError::Conflict(constraint) => AppError::Conflict(constraint),
            StoreError::MissingReference(constraint) => AppError::MissingReference(constraint),
            other => AppError::Load(other),
        }
    }
}

impl AppError {
    /// Like `From<StoreError>`, but server-side failures are reported as failed writes.
    pub fn saving(err: StoreError) -> Self {
        match err {
            StoreError::Database(_) | StoreError::Corrupt(_) => AppError::Save(err),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Load(err) => {
                tracing::error!(error = %err, "Failed to load data");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LOAD_FAILED",
                    "Não foi possível carregar os dados".to_string(),
                )
            }
            AppError::Save(err) => {
                tracing::error!(error = %err, "Failed to save data");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SAVE_FAILED",
                    "Não foi possível salvar os dados".to_string(),
                )
            }
            AppError::Conflict(constraint) => {
                tracing::debug!(constraint = %constraint, "Unique constraint violated");
                (
                    StatusCode::CONFLICT,
                    "ALREADY_EXISTS",
                    "Já existe um registro com esses dados".to_string(),
                )
            }
            AppError::MissingReference(constraint) => {
                tracing::debug!(constraint = %constraint, "Foreign key violated");
                (
                    StatusCode::NOT_FOUND,
                    "REFERENCE_NOT_FOUND",
                    "Um registro referenciado não existe".to_string(),
                )
            }
            AppError::Submit(err) => match err {
                IngestionError::Scoring(ScoringError::InvalidResponse { question_id, value }) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_RESPONSE",
                    format!("Resposta inválida \"{value}\" para a pergunta {question_id}"),
                ),
                IngestionError::Scoring(other) => {
                    (StatusCode::BAD_REQUEST, "INVALID_RESPONSE", other.to_string())
                }
                IngestionError::UnknownDeployment(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Pesquisa não encontrada".to_string(),
                ),
                IngestionError::NoAnswers => (
                    StatusCode::BAD_REQUEST,
                    "EMPTY_SUBMISSION",
                    "Nenhuma resposta corresponde às perguntas desta pesquisa".to_string(),
                ),
                IngestionError::DeploymentClosed(_) => (
                    StatusCode::CONFLICT,
                    "DEPLOYMENT_CLOSED",
                    "Esta pesquisa não está aceitando respostas".to_string(),
                ),
                IngestionError::Store(store) => {
                    tracing::error!(error = %store, "Failed to store submission");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "SUBMIT_FAILED",
                        "Não foi possível enviar suas respostas".to_string(),
                    )
                }
            },
            AppError::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Registro não encontrado: {entity}"),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Autenticação necessária".to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Muitas requisições. Tente novamente mais tarde.".to_string(),
            ),
            AppError::Superseded => (
                StatusCode::CONFLICT,
                "SUPERSEDED",
                "Uma requisição mais recente para este painel está em andamento".to_string(),
            ),
            AppError::Unavailable(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                format!("Serviço não configurado: {what}"),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Ocorreu um erro interno".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}
