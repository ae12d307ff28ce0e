use crate::domain::scoring::{LikertResponse, Sentiment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "respondent_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RespondentStatus {
    Pending,
    Started,
    Completed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "deployment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Draft,
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "org_unit_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrgUnitKind {
    Unit,
    Sector,
    Position,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub code: String,
    pub text: String,
    pub is_inverted: bool,
}

/// Reference constants (benchmark, p25, p75, diagnostics) are supplied with the
/// template and only used for display.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Domain {
    pub id: Uuid,
    pub name: String,
    pub benchmark_private_sector: f64,
    pub p25: f64,
    pub p75: f64,
    pub diagnosis_low: String,
    pub diagnosis_medium: String,
    pub diagnosis_high: String,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SurveyTemplate {
    pub id: Uuid,
    pub name: String,
    pub domains: Vec<Domain>,
}

impl SurveyTemplate {
    pub fn questions(&self) -> impl Iterator<Item = (&Domain, &Question)> {
        self.domains
            .iter()
            .flat_map(|domain| domain.questions.iter().map(move |q| (domain, q)))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Demographics {
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub current_role_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_health_condition: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question_id: Uuid,
    pub raw_response: LikertResponse,
    pub calculated_score: u8,
    pub sentiment: Sentiment,
    pub domain_name: String,
    pub question_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Respondent {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub status: RespondentStatus,
    pub demographics: Demographics,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow)]
pub struct Deployment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub status: DeploymentStatus,
    pub total_invited: i32,
    pub opens_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Open status alone is not enough: the scheduled close job may lag behind `closes_at`.
    pub fn accepts_responses(&self, now: DateTime<Utc>) -> bool {
        self.status == DeploymentStatus::Open
            && self.opens_at <= now
            && self.closes_at.map_or(true, |closes_at| now < closes_at)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub registration_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow)]
pub struct OrgUnit {
    pub id: Uuid,
    pub company_id: Uuid,
    pub kind: OrgUnitKind,
    pub name: String,
    pub parent_id: Option<Uuid>,
}
