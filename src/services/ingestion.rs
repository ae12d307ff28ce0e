use crate::db::{NewSubmission, StoreError, SurveyStore};
use crate::domain::models::{Answer, Demographics, SurveyTemplate};
use crate::domain::scoring::{calculated_score, LikertResponse, ScoringError, Sentiment};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("deployment {0} not found")]
    UnknownDeployment(Uuid),
    #[error("deployment {0} is not accepting responses")]
    DeploymentClosed(Uuid),
    #[error("no response matches a question of the survey")]
    NoAnswers,
    #[error("could not submit: {0}")]
    Store(#[from] StoreError),
}

/// Scores every template question that has a response. Questions without a
/// response are skipped; the whole batch fails on the first unknown label.
pub fn prepare_answers(
    template: &SurveyTemplate,
    responses: &HashMap<Uuid, String>,
) -> Result<Vec<Answer>, ScoringError> {
    let mut answers = Vec::with_capacity(responses.len());
    for (domain, question) in template.questions() {
        let Some(raw) = responses.get(&question.id) else {
            continue;
        };
        let response = LikertResponse::parse(question.id, raw)?;
        let score = calculated_score(response, question.is_inverted);
        answers.push(Answer {
            question_id: question.id,
            raw_response: response,
            calculated_score: score,
            sentiment: Sentiment::from_score(score),
            domain_name: domain.name.clone(),
            question_code: question.code.clone(),
        });
    }

    if answers.len() < responses.len() {
        tracing::warn!(
            "Ignoring {} responses for questions outside template {}",
            responses.len() - answers.len(),
            template.id
        );
    }
    Ok(answers)
}

pub fn prepare_submission(
    deployment_id: Uuid,
    demographics: Demographics,
    responses: &HashMap<Uuid, String>,
    template: &SurveyTemplate,
    now: DateTime<Utc>,
) -> Result<NewSubmission, IngestionError> {
    let answers = prepare_answers(template, responses)?;
    if answers.is_empty() {
        return Err(IngestionError::NoAnswers);
    }
    Ok(NewSubmission {
        respondent_id: Uuid::new_v4(),
        deployment_id,
        demographics,
        completed_at: now,
        answers,
    })
}

/// Validates and atomically stores one completed questionnaire. Returns the new
/// respondent id.
pub async fn submit(
    store: &dyn SurveyStore,
    deployment_id: Uuid,
    demographics: Demographics,
    responses: &HashMap<Uuid, String>,
) -> Result<Uuid, IngestionError> {
    let deployment = match store.load_deployment(deployment_id).await {
        Ok(deployment) => deployment,
        Err(StoreError::NotFound { .. }) => return Err(IngestionError::UnknownDeployment(deployment_id)),
        Err(e) => return Err(e.into()),
    };
    let now = Utc::now();
    if !deployment.accepts_responses(now) {
        return Err(IngestionError::DeploymentClosed(deployment_id));
    }

    let template = store.load_template(deployment.template_id).await?;
    let submission = prepare_submission(deployment_id, demographics, responses, &template, now)?;

    store.insert_submission(&submission).await.map_err(|e| {
        tracing::error!("Failed to store submission for deployment {}: {}", deployment_id, e);
        e
    })?;

    tracing::info!(
        "Stored respondent {} with {} answers for deployment {}",
        submission.respondent_id,
        submission.answers.len(),
        deployment_id
    );
    Ok(submission.respondent_id)
}
