//! Likert scoring rules.
//!
//! Every question is answered on the same five-point scale. The raw label maps to
//! a base score of 1..=5; inverted questions are mirrored (`6 - base`) so that a
//! higher score always means better wellbeing.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("invalid response {value:?} for question {question_id}")]
    InvalidResponse { question_id: Uuid, value: String },
    #[error("score {0} is outside the 1-5 scale")]
    OutOfRange(i16),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LikertResponse {
    #[serde(rename = "Nunca")]
    Never,
    #[serde(rename = "Raramente")]
    Rarely,
    #[serde(rename = "Às vezes")]
    Sometimes,
    #[serde(rename = "Muitas vezes")]
    Often,
    #[serde(rename = "Sempre")]
    Always,
}

impl LikertResponse {
    /// Canonical order, lowest to highest.
    pub const ALL: [LikertResponse; 5] = [
        LikertResponse::Never,
        LikertResponse::Rarely,
        LikertResponse::Sometimes,
        LikertResponse::Often,
        LikertResponse::Always,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LikertResponse::Never => "Nunca",
            LikertResponse::Rarely => "Raramente",
            LikertResponse::Sometimes => "Às vezes",
            LikertResponse::Often => "Muitas vezes",
            LikertResponse::Always => "Sempre",
        }
    }

    pub fn base_score(&self) -> u8 {
        match self {
            LikertResponse::Never => 1,
            LikertResponse::Rarely => 2,
            LikertResponse::Sometimes => 3,
            LikertResponse::Often => 4,
            LikertResponse::Always => 5,
        }
    }

    /// Parses a stored or submitted label. Exact match only; anything else is
    /// reported against the question it was submitted for.
    pub fn parse(question_id: Uuid, raw: &str) -> Result<Self, ScoringError> {
        LikertResponse::ALL
            .into_iter()
            .find(|r| r.label() == raw)
            .ok_or_else(|| ScoringError::InvalidResponse {
                question_id,
                value: raw.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "sentiment", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Unfavorable,
    Neutral,
    Favorable,
}

impl Sentiment {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Sentiment::Unfavorable,
            3 => Sentiment::Neutral,
            _ => Sentiment::Favorable,
        }
    }
}

pub fn calculated_score(response: LikertResponse, is_inverted: bool) -> u8 {
    let base = response.base_score();
    if is_inverted {
        6 - base
    } else {
        base
    }
}

/// Validates a persisted score before it enters aggregation.
pub fn checked_score(raw: i16) -> Result<u8, ScoringError> {
    match raw {
        1..=5 => Ok(raw as u8),
        other => Err(ScoringError::OutOfRange(other)),
    }
}
