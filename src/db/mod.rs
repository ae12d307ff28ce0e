pub mod seed;

use crate::domain::models::{
    Answer, Company, Demographics, Deployment, DeploymentStatus, Domain, OrgUnit, OrgUnitKind,
    Question, Respondent, RespondentStatus, SurveyTemplate,
};
use crate::domain::scoring::{calculated_score, checked_score, LikertResponse, ScoringError, Sentiment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
    #[error("conflicts with an existing record: {0}")]
    Conflict(String),
    #[error("references a missing record: {0}")]
    MissingReference(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string());
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference(
                    db_err.constraint().unwrap_or("foreign key").to_string(),
                );
            }
        }
        StoreError::Database(err)
    }
}

impl From<ScoringError> for StoreError {
    fn from(err: ScoringError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// One completed questionnaire, ready to be written in a single transaction.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub respondent_id: Uuid,
    pub deployment_id: Uuid,
    pub demographics: Demographics,
    pub completed_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

/// Reads and writes the survey core depends on.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn load_template(&self, template_id: Uuid) -> Result<SurveyTemplate, StoreError>;
    async fn load_deployment(&self, deployment_id: Uuid) -> Result<Deployment, StoreError>;
    async fn load_respondents(&self, deployment_id: Uuid) -> Result<Vec<Respondent>, StoreError>;
    /// Writes the respondent and every answer, or nothing.
    async fn insert_submission(&self, submission: &NewSubmission) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
}

#[derive(Debug, FromRow)]
struct DomainRow {
    id: Uuid,
    name: String,
    benchmark_private_sector: f64,
    p25: f64,
    p75: f64,
    diagnosis_low: String,
    diagnosis_medium: String,
    diagnosis_high: String,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    domain_id: Uuid,
    code: String,
    text: String,
    is_inverted: bool,
}

#[derive(Debug, FromRow)]
struct RespondentRow {
    id: Uuid,
    deployment_id: Uuid,
    status: RespondentStatus,
    unit: String,
    sector: String,
    position: String,
    age_range: String,
    current_role_time: String,
    gender: Option<String>,
    has_health_condition: Option<bool>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    respondent_id: Uuid,
    question_id: Uuid,
    raw_response: String,
    calculated_score: i16,
    sentiment: Sentiment,
    domain_name: String,
    question_code: String,
    is_inverted: bool,
}

impl TryFrom<AnswerRow> for Answer {
    type Error = StoreError;

    /// Stored score and sentiment must agree with the label and the question's direction.
    fn try_from(row: AnswerRow) -> Result<Self, Self::Error> {
        let raw_response = LikertResponse::parse(row.question_id, &row.raw_response)?;
        let score = checked_score(row.calculated_score)?;
        if score != calculated_score(raw_response, row.is_inverted) {
            return Err(StoreError::Corrupt(format!(
                "answer to {} stores score {} for \"{}\"",
                row.question_id, score, row.raw_response
            )));
        }
        if row.sentiment != Sentiment::from_score(score) {
            return Err(StoreError::Corrupt(format!(
                "answer to {} stores sentiment {:?} for score {}",
                row.question_id, row.sentiment, score
            )));
        }
        Ok(Answer {
            question_id: row.question_id,
            raw_response,
            calculated_score: score,
            sentiment: row.sentiment,
            domain_name: row.domain_name,
            question_code: row.question_code,
        })
    }
}

fn assemble_template(
    template: TemplateRow,
    domains: Vec<DomainRow>,
    questions: Vec<QuestionRow>,
) -> SurveyTemplate {
    let mut by_domain: HashMap<Uuid, Vec<Question>> = HashMap::new();
    for q in questions {
        by_domain.entry(q.domain_id).or_default().push(Question {
            id: q.id,
            code: q.code,
            text: q.text,
            is_inverted: q.is_inverted,
        });
    }

    let domains = domains
        .into_iter()
        .map(|d| Domain {
            questions: by_domain.remove(&d.id).unwrap_or_default(),
            id: d.id,
            name: d.name,
            benchmark_private_sector: d.benchmark_private_sector,
            p25: d.p25,
            p75: d.p75,
            diagnosis_low: d.diagnosis_low,
            diagnosis_medium: d.diagnosis_medium,
            diagnosis_high: d.diagnosis_high,
        })
        .collect();

    SurveyTemplate {
        id: template.id,
        name: template.name,
        domains,
    }
}

fn assemble_respondents(
    rows: Vec<RespondentRow>,
    answers: Vec<AnswerRow>,
) -> Result<Vec<Respondent>, StoreError> {
    let mut by_respondent: HashMap<Uuid, Vec<Answer>> = HashMap::new();
    for row in answers {
        let respondent_id = row.respondent_id;
        by_respondent
            .entry(respondent_id)
            .or_default()
            .push(Answer::try_from(row)?);
    }

    Ok(rows
        .into_iter()
        .map(|r| Respondent {
            answers: by_respondent.remove(&r.id).unwrap_or_default(),
            id: r.id,
            deployment_id: r.deployment_id,
            status: r.status,
            demographics: Demographics {
                unit: r.unit,
                sector: r.sector,
                position: r.position,
                age_range: r.age_range,
                current_role_time: r.current_role_time,
                gender: r.gender,
                has_health_condition: r.has_health_condition,
            },
            completed_at: r.completed_at,
        })
        .collect())
}

#[async_trait]
impl SurveyStore for PgStore {
    async fn load_template(&self, template_id: Uuid) -> Result<SurveyTemplate, StoreError> {
        let template = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name FROM survey_templates WHERE id = $1",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound {
            entity: "template",
            id: template_id,
        })?;

        let domains = sqlx::query_as::<_, DomainRow>(
            r#"
            SELECT id, name, benchmark_private_sector, p25, p75,
                   diagnosis_low, diagnosis_medium, diagnosis_high
            FROM domains
            WHERE template_id = $1
            ORDER BY order_index ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT q.id, q.domain_id, q.code, q.text, q.is_inverted
            FROM questions q
            JOIN domains d ON d.id = q.domain_id
            WHERE d.template_id = $1
            ORDER BY d.order_index ASC, q.order_index ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble_template(template, domains, questions))
    }

    async fn load_deployment(&self, deployment_id: Uuid) -> Result<Deployment, StoreError> {
        find_deployment(&self.pool, deployment_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "deployment",
                id: deployment_id,
            })
    }

    async fn load_respondents(&self, deployment_id: Uuid) -> Result<Vec<Respondent>, StoreError> {
        let rows = sqlx::query_as::<_, RespondentRow>(
            r#"
            SELECT id, deployment_id, status, unit, sector, position, age_range,
                   current_role_time, gender, has_health_condition, completed_at
            FROM respondents
            WHERE deployment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await?;

        let answers = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.respondent_id, a.question_id, a.raw_response, a.calculated_score,
                   a.sentiment, a.domain_name, a.question_code, q.is_inverted
            FROM answers a
            JOIN respondents r ON r.id = a.respondent_id
            JOIN questions q ON q.id = a.question_id
            WHERE r.deployment_id = $1
            "#,
        )
        .bind(deployment_id)
        .fetch_all(&self.pool)
        .await?;

        assemble_respondents(rows, answers)
    }

    async fn insert_submission(&self, submission: &NewSubmission) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let demographics = &submission.demographics;

        sqlx::query(
            r#"
            INSERT INTO respondents (
                id, deployment_id, status, unit, sector, position, age_range,
                current_role_time, gender, has_health_condition, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(submission.respondent_id)
        .bind(submission.deployment_id)
        .bind(RespondentStatus::Completed)
        .bind(&demographics.unit)
        .bind(&demographics.sector)
        .bind(&demographics.position)
        .bind(&demographics.age_range)
        .bind(&demographics.current_role_time)
        .bind(&demographics.gender)
        .bind(demographics.has_health_condition)
        .bind(submission.completed_at)
        .execute(&mut *tx)
        .await?;

        for answer in &submission.answers {
            sqlx::query(
                r#"
                INSERT INTO answers (
                    id, respondent_id, question_id, raw_response, calculated_score,
                    sentiment, domain_name, question_code
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(submission.respondent_id)
            .bind(answer.question_id)
            .bind(answer.raw_response.label())
            .bind(answer.calculated_score as i16)
            .bind(answer.sentiment)
            .bind(&answer.domain_name)
            .bind(&answer.question_code)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

// ============================================
// Admin accounts
// ============================================

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DbAdmin {
    pub id: Uuid,
    pub email: String,
    pub hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub async fn find_admin_by_email(pool: &PgPool, email: &str) -> Result<Option<DbAdmin>, StoreError> {
    let admin = sqlx::query_as::<_, DbAdmin>(
        "SELECT id, email, hash, name, created_at FROM admins WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(admin)
}

pub async fn find_admin_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbAdmin>, StoreError> {
    let admin = sqlx::query_as::<_, DbAdmin>(
        "SELECT id, email, hash, name, created_at FROM admins WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(admin)
}

// ============================================
// Companies and organisational structure
// ============================================

pub async fn insert_company(
    pool: &PgPool,
    name: &str,
    registration_number: Option<&str>,
) -> Result<Company, StoreError> {
    let company = sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (id, name, registration_number)
        VALUES ($1, $2, $3)
        RETURNING id, name, registration_number, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(registration_number)
    .fetch_one(pool)
    .await?;
    Ok(company)
}

pub async fn list_companies(pool: &PgPool) -> Result<Vec<Company>, StoreError> {
    let companies = sqlx::query_as::<_, Company>(
        "SELECT id, name, registration_number, created_at FROM companies ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(companies)
}

pub async fn insert_org_unit(
    pool: &PgPool,
    company_id: Uuid,
    kind: OrgUnitKind,
    name: &str,
    parent_id: Option<Uuid>,
) -> Result<OrgUnit, StoreError> {
    let unit = sqlx::query_as::<_, OrgUnit>(
        r#"
        INSERT INTO org_units (id, company_id, kind, name, parent_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, company_id, kind, name, parent_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(kind)
    .bind(name)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;
    Ok(unit)
}

pub async fn list_org_units(pool: &PgPool, company_id: Uuid) -> Result<Vec<OrgUnit>, StoreError> {
    let units = sqlx::query_as::<_, OrgUnit>(
        r#"
        SELECT id, company_id, kind, name, parent_id
        FROM org_units
        WHERE company_id = $1
        ORDER BY kind ASC, name ASC
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(units)
}

// ============================================
// Templates and deployments
// ============================================

#[derive(Debug, Serialize, FromRow)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub question_count: i64,
}

pub async fn list_templates(pool: &PgPool) -> Result<Vec<TemplateSummary>, StoreError> {
    let templates = sqlx::query_as::<_, TemplateSummary>(
        r#"
        SELECT t.id, t.name, COUNT(q.id)::bigint AS question_count
        FROM survey_templates t
        LEFT JOIN domains d ON d.template_id = t.id
        LEFT JOIN questions q ON q.domain_id = d.id
        GROUP BY t.id, t.name
        ORDER BY t.name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(templates)
}

pub struct NewDeployment<'a> {
    pub company_id: Uuid,
    pub template_id: Uuid,
    pub name: &'a str,
    pub total_invited: i32,
    pub opens_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
}

pub async fn insert_deployment(
    pool: &PgPool,
    new: &NewDeployment<'_>,
) -> Result<Deployment, StoreError> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        INSERT INTO deployments (id, company_id, template_id, name, status, total_invited, opens_at, closes_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, company_id, template_id, name, status, total_invited, opens_at, closes_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.company_id)
    .bind(new.template_id)
    .bind(new.name)
    .bind(DeploymentStatus::Draft)
    .bind(new.total_invited)
    .bind(new.opens_at)
    .bind(new.closes_at)
    .fetch_one(pool)
    .await?;
    Ok(deployment)
}

pub async fn find_deployment(pool: &PgPool, id: Uuid) -> Result<Option<Deployment>, StoreError> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, company_id, template_id, name, status, total_invited, opens_at, closes_at, created_at
        FROM deployments
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(deployment)
}

pub async fn list_deployments(pool: &PgPool, company_id: Uuid) -> Result<Vec<Deployment>, StoreError> {
    let deployments = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, company_id, template_id, name, status, total_invited, opens_at, closes_at, created_at
        FROM deployments
        WHERE company_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(deployments)
}

pub async fn update_deployment_status(
    pool: &PgPool,
    id: Uuid,
    status: DeploymentStatus,
) -> Result<Option<Deployment>, StoreError> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        UPDATE deployments SET status = $2
        WHERE id = $1
        RETURNING id, company_id, template_id, name, status, total_invited, opens_at, closes_at, created_at
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?;
    Ok(deployment)
}

/// Closes open deployments whose closing time has passed. Returns how many changed.
pub async fn close_expired_deployments(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE deployments SET status = 'closed'
        WHERE status = 'open' AND closes_at IS NOT NULL AND closes_at <= $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_row(respondent_id: Uuid, raw: &str, score: i16) -> AnswerRow {
        AnswerRow {
            respondent_id,
            question_id: Uuid::new_v4(),
            raw_response: raw.to_string(),
            calculated_score: score,
            sentiment: Sentiment::from_score(score.clamp(0, 5) as u8),
            domain_name: "Demandas".to_string(),
            question_code: "Q-01".to_string(),
            is_inverted: false,
        }
    }

    fn respondent_row(id: Uuid) -> RespondentRow {
        RespondentRow {
            id,
            deployment_id: Uuid::nil(),
            status: RespondentStatus::Completed,
            unit: "Unit A".to_string(),
            sector: "TI".to_string(),
            position: "Analista".to_string(),
            age_range: "26-35".to_string(),
            current_role_time: "1-3 anos".to_string(),
            gender: None,
            has_health_condition: Some(false),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_answers_are_grouped_under_their_respondent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let respondents = assemble_respondents(
            vec![respondent_row(a), respondent_row(b)],
            vec![answer_row(a, "Sempre", 5), answer_row(a, "Nunca", 1), answer_row(b, "Às vezes", 3)],
        )
        .unwrap();

        assert_eq!(respondents.len(), 2);
        assert_eq!(respondents[0].answers.len(), 2);
        assert_eq!(respondents[1].answers.len(), 1);
        assert_eq!(respondents[1].answers[0].raw_response, LikertResponse::Sometimes);
        assert_eq!(respondents[0].demographics.position, "Analista");
    }

    #[test]
    fn test_corrupt_answer_rows_are_rejected() {
        let a = Uuid::new_v4();
        let bad_label = assemble_respondents(vec![respondent_row(a)], vec![answer_row(a, "Talvez", 3)]);
        assert!(matches!(bad_label, Err(StoreError::Corrupt(_))));

        let bad_score = assemble_respondents(vec![respondent_row(a)], vec![answer_row(a, "Sempre", 9)]);
        assert!(matches!(bad_score, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_answer_rows_must_agree_with_label_and_direction() {
        let a = Uuid::new_v4();

        // "Sempre" on a normal question scores 5, not 1
        let wrong_direction = assemble_respondents(vec![respondent_row(a)], vec![answer_row(a, "Sempre", 1)]);
        assert!(matches!(wrong_direction, Err(StoreError::Corrupt(_))));

        let mut inverted = answer_row(a, "Sempre", 1);
        inverted.is_inverted = true;
        let respondents = assemble_respondents(vec![respondent_row(a)], vec![inverted]).unwrap();
        assert_eq!(respondents[0].answers[0].calculated_score, 1);
        assert_eq!(respondents[0].answers[0].sentiment, Sentiment::Unfavorable);

        let mut wrong_sentiment = answer_row(a, "Muitas vezes", 4);
        wrong_sentiment.sentiment = Sentiment::Neutral;
        let rejected = assemble_respondents(vec![respondent_row(a)], vec![wrong_sentiment]);
        assert!(matches!(rejected, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_non_constraint_errors_stay_database_errors() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[test]
    fn test_template_keeps_domain_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let domain_row = |id: Uuid, name: &str| DomainRow {
            id,
            name: name.to_string(),
            benchmark_private_sector: 3.0,
            p25: 2.5,
            p75: 3.5,
            diagnosis_low: String::new(),
            diagnosis_medium: String::new(),
            diagnosis_high: String::new(),
        };
        let question_row = |domain_id: Uuid, code: &str| QuestionRow {
            id: Uuid::new_v4(),
            domain_id,
            code: code.to_string(),
            text: String::new(),
            is_inverted: false,
        };

        let template = assemble_template(
            TemplateRow {
                id: Uuid::new_v4(),
                name: "Indicador".to_string(),
            },
            vec![domain_row(first, "Demandas"), domain_row(second, "Controle")],
            vec![
                question_row(first, "Q-01"),
                question_row(second, "Q-02"),
                question_row(first, "Q-03"),
            ],
        );

        let names: Vec<&str> = template.domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Demandas", "Controle"]);
        let codes: Vec<&str> = template.domains[0]
            .questions
            .iter()
            .map(|q| q.code.as_str())
            .collect();
        assert_eq!(codes, vec!["Q-01", "Q-03"]);
    }
}
