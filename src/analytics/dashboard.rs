//! Dashboard aggregation
//! Recomputed from raw answers on every request; nothing here is cached or persisted.
use crate::domain::filters::{FilterKey, Filters, ALL};
use crate::domain::models::{
    Answer, DeploymentStatus, Domain, Question, Respondent, RespondentStatus, SurveyTemplate,
};
use crate::domain::scoring::Sentiment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentBucket {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentBreakdown {
    pub favorable: SentimentBucket,
    pub neutral: SentimentBucket,
    pub unfavorable: SentimentBucket,
}

impl SentimentBreakdown {
    fn from_answers<'a>(answers: impl IntoIterator<Item = &'a Answer>) -> (Self, usize) {
        let (mut favorable, mut neutral, mut unfavorable) = (0usize, 0usize, 0usize);
        for answer in answers {
            match answer.sentiment {
                Sentiment::Favorable => favorable += 1,
                Sentiment::Neutral => neutral += 1,
                Sentiment::Unfavorable => unfavorable += 1,
            }
        }
        let total = favorable + neutral + unfavorable;
        let bucket = |count: usize| SentimentBucket {
            count,
            percentage: percentage(count, total),
        };
        (
            Self {
                favorable: bucket(favorable),
                neutral: bucket(neutral),
                unfavorable: bucket(unfavorable),
            },
            total,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionAnalysis {
    pub question_id: Uuid,
    pub code: String,
    pub text: String,
    pub is_inverted: bool,
    pub total_answers: usize,
    /// Mean calculated score, unrounded. 0 when nobody answered.
    pub average_score: f64,
    pub sentiment: SentimentBreakdown,
}

impl QuestionAnalysis {
    pub fn has_data(&self) -> bool {
        self.average_score > 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    pub level: DiagnosisLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainAnalysis {
    pub domain_id: Uuid,
    pub domain_name: String,
    pub domain_score: f64,
    pub benchmark_private_sector: f64,
    pub p25: f64,
    pub p75: f64,
    pub diagnosis: Option<Diagnosis>,
    pub questions: Vec<QuestionAnalysis>,
    pub strong_point: Option<QuestionAnalysis>,
    pub weak_point: Option<QuestionAnalysis>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemographicOptions {
    pub units: Vec<String>,
    pub sectors: Vec<String>,
    pub age_ranges: Vec<String>,
    pub current_role_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardData {
    pub survey_status: DeploymentStatus,
    pub total_respondents: usize,
    pub completion_rate: f64,
    pub overall_sentiment: SentimentBreakdown,
    pub domains: Vec<DomainAnalysis>,
    pub demographic_options: DemographicOptions,
}

/// Everything the engine needs for one deployment, already fetched.
pub struct DashboardInput<'a> {
    pub template: &'a SurveyTemplate,
    pub respondents: &'a [Respondent],
    pub survey_status: DeploymentStatus,
    pub total_invited: i32,
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn answers_for<'a>(
    respondents: &'a [&'a Respondent],
    question_id: Uuid,
) -> impl Iterator<Item = &'a Answer> + 'a {
    respondents
        .iter()
        .flat_map(|r| r.answers.iter())
        .filter(move |a| a.question_id == question_id)
}

pub fn analyze_question(question: &Question, respondents: &[&Respondent]) -> QuestionAnalysis {
    let answers: Vec<&Answer> = answers_for(respondents, question.id).collect();
    let (sentiment, total) = SentimentBreakdown::from_answers(answers.iter().copied());
    let average_score = if total == 0 {
        0.0
    } else {
        let sum: u32 = answers.iter().map(|a| a.calculated_score as u32).sum();
        sum as f64 / total as f64
    };

    QuestionAnalysis {
        question_id: question.id,
        code: question.code.clone(),
        text: question.text.clone(),
        is_inverted: question.is_inverted,
        total_answers: total,
        average_score,
        sentiment,
    }
}

/// Ties resolve to the question that comes first in template order.
fn extreme_point(questions: &[QuestionAnalysis], prefer_higher: bool) -> Option<QuestionAnalysis> {
    questions
        .iter()
        .filter(|q| q.has_data())
        .fold(None::<&QuestionAnalysis>, |best, q| match best {
            None => Some(q),
            Some(current) => {
                let better = if prefer_higher {
                    q.average_score > current.average_score
                } else {
                    q.average_score < current.average_score
                };
                Some(if better { q } else { current })
            }
        })
        .cloned()
}

pub fn diagnose(domain: &Domain, domain_score: f64) -> Option<Diagnosis> {
    if domain_score <= 0.0 {
        return None;
    }
    let (level, message) = if domain_score <= domain.p25 {
        (DiagnosisLevel::Low, &domain.diagnosis_low)
    } else if domain_score >= domain.p75 {
        (DiagnosisLevel::High, &domain.diagnosis_high)
    } else {
        (DiagnosisLevel::Medium, &domain.diagnosis_medium)
    };
    Some(Diagnosis {
        level,
        message: message.clone(),
    })
}

pub fn analyze_domain(domain: &Domain, respondents: &[&Respondent]) -> DomainAnalysis {
    let questions: Vec<QuestionAnalysis> = domain
        .questions
        .iter()
        .map(|q| analyze_question(q, respondents))
        .collect();

    let answered: Vec<f64> = questions
        .iter()
        .filter(|q| q.has_data())
        .map(|q| q.average_score)
        .collect();
    let domain_score = if answered.is_empty() {
        0.0
    } else {
        answered.iter().sum::<f64>() / answered.len() as f64
    };

    DomainAnalysis {
        domain_id: domain.id,
        domain_name: domain.name.clone(),
        domain_score,
        benchmark_private_sector: domain.benchmark_private_sector,
        p25: domain.p25,
        p75: domain.p75,
        diagnosis: diagnose(domain, domain_score),
        strong_point: extreme_point(&questions, true),
        weak_point: extreme_point(&questions, false),
        questions,
    }
}

/// Facet values come from every respondent, never the filtered subset, so the
/// dropdowns keep offering all observed values.
pub fn demographic_options(respondents: &[Respondent]) -> DemographicOptions {
    let collect = |key: FilterKey| -> Vec<String> {
        let observed: BTreeSet<&str> = respondents
            .iter()
            .map(|r| key.value_of(&r.demographics))
            .filter(|v| !v.is_empty() && *v != ALL)
            .collect();
        std::iter::once(ALL.to_string())
            .chain(observed.into_iter().map(str::to_string))
            .collect()
    };

    DemographicOptions {
        units: collect(FilterKey::Unit),
        sectors: collect(FilterKey::Sector),
        age_ranges: collect(FilterKey::AgeRange),
        current_role_times: collect(FilterKey::CurrentRoleTime),
    }
}

pub fn completion_rate(respondents: &[Respondent], total_invited: i32) -> f64 {
    if total_invited <= 0 {
        return 0.0;
    }
    let completed = respondents
        .iter()
        .filter(|r| r.status == RespondentStatus::Completed)
        .count();
    completed as f64 / total_invited as f64 * 100.0
}

pub fn build_dashboard(input: &DashboardInput<'_>, filters: &Filters) -> DashboardData {
    let filtered = filters.apply(input.respondents);
    tracing::debug!(
        "dashboard: {} of {} respondents pass filters {:?}",
        filtered.len(),
        input.respondents.len(),
        filters.active()
    );

    let domains: Vec<DomainAnalysis> = input
        .template
        .domains
        .iter()
        .map(|d| analyze_domain(d, &filtered))
        .collect();

    let template_answers = input
        .template
        .questions()
        .flat_map(|(_, q)| answers_for(&filtered, q.id).collect::<Vec<_>>());
    let (overall_sentiment, _) = SentimentBreakdown::from_answers(template_answers);

    DashboardData {
        survey_status: input.survey_status,
        total_respondents: filtered.len(),
        completion_rate: completion_rate(input.respondents, input.total_invited),
        overall_sentiment,
        domains,
        demographic_options: demographic_options(input.respondents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Demographics;
    use crate::domain::scoring::{calculated_score, LikertResponse};

    fn question(code: &str, is_inverted: bool) -> Question {
        Question {
            id: Uuid::new_v4(),
            code: code.to_string(),
            text: format!("Pergunta {code}"),
            is_inverted,
        }
    }

    fn domain(name: &str, questions: Vec<Question>) -> Domain {
        Domain {
            id: Uuid::new_v4(),
            name: name.to_string(),
            benchmark_private_sector: 3.5,
            p25: 3.0,
            p75: 4.0,
            diagnosis_low: "baixo".to_string(),
            diagnosis_medium: "médio".to_string(),
            diagnosis_high: "alto".to_string(),
            questions,
        }
    }

    fn answer(q: &Question, response: LikertResponse) -> Answer {
        let score = calculated_score(response, q.is_inverted);
        Answer {
            question_id: q.id,
            raw_response: response,
            calculated_score: score,
            sentiment: Sentiment::from_score(score),
            domain_name: "D".to_string(),
            question_code: q.code.clone(),
        }
    }

    fn respondent(unit: &str, answers: Vec<Answer>) -> Respondent {
        Respondent {
            id: Uuid::new_v4(),
            deployment_id: Uuid::nil(),
            status: RespondentStatus::Completed,
            demographics: Demographics {
                unit: unit.to_string(),
                sector: "TI".to_string(),
                age_range: "26-35".to_string(),
                current_role_time: "1-3 anos".to_string(),
                ..Default::default()
            },
            completed_at: None,
            answers,
        }
    }

    #[test]
    fn test_single_always_answer() {
        let q1 = question("Q-01", false);
        let r = respondent("Unit A", vec![answer(&q1, LikertResponse::Always)]);
        let analysis = analyze_question(&q1, &[&r]);
        assert_eq!(analysis.average_score, 5.0);
        assert_eq!(analysis.total_answers, 1);
        assert_eq!(analysis.sentiment.favorable.count, 1);
        assert_eq!(analysis.sentiment.favorable.percentage, 100.0);
    }

    #[test]
    fn test_unanswered_question_is_all_zero() {
        let q = question("Q-02", true);
        let analysis = analyze_question(&q, &[]);
        assert_eq!(analysis.average_score, 0.0);
        assert_eq!(analysis.total_answers, 0);
        assert_eq!(analysis.sentiment, SentimentBreakdown::default());
        assert!(!analysis.has_data());
    }

    #[test]
    fn test_sentiment_percentages() {
        let q = question("Q-03", false);
        let respondents = vec![
            respondent("A", vec![answer(&q, LikertResponse::Always)]),
            respondent("A", vec![answer(&q, LikertResponse::Sometimes)]),
            respondent("A", vec![answer(&q, LikertResponse::Never)]),
            respondent("A", vec![answer(&q, LikertResponse::Rarely)]),
        ];
        let refs: Vec<&Respondent> = respondents.iter().collect();
        let analysis = analyze_question(&q, &refs);
        assert_eq!(analysis.average_score, (5.0 + 3.0 + 1.0 + 2.0) / 4.0);
        assert_eq!(analysis.sentiment.favorable.percentage, 25.0);
        assert_eq!(analysis.sentiment.neutral.percentage, 25.0);
        assert_eq!(analysis.sentiment.unfavorable.count, 2);
        assert_eq!(analysis.sentiment.unfavorable.percentage, 50.0);
    }

    #[test]
    fn test_domain_score_skips_unanswered_questions() {
        let answered = question("Q-04", false);
        let unanswered = question("Q-05", false);
        let d = domain("Demandas", vec![unanswered.clone(), answered.clone()]);
        let respondents = vec![
            respondent("A", vec![answer(&answered, LikertResponse::Often)]),
            respondent("A", vec![answer(&answered, LikertResponse::Often)]),
        ];
        let refs: Vec<&Respondent> = respondents.iter().collect();
        let analysis = analyze_domain(&d, &refs);
        assert_eq!(analysis.domain_score, 4.0);
        assert_eq!(analysis.questions.len(), 2);
        assert_eq!(
            analysis.strong_point.as_ref().map(|q| q.question_id),
            Some(answered.id)
        );
        assert_eq!(
            analysis.weak_point.as_ref().map(|q| q.question_id),
            Some(answered.id)
        );
        assert_eq!(
            analysis.diagnosis.map(|d| d.level),
            Some(DiagnosisLevel::High)
        );
    }

    #[test]
    fn test_domain_without_answers() {
        let d = domain("Controle", vec![question("Q-06", false), question("Q-07", true)]);
        let analysis = analyze_domain(&d, &[]);
        assert_eq!(analysis.domain_score, 0.0);
        assert!(analysis.strong_point.is_none());
        assert!(analysis.weak_point.is_none());
        assert!(analysis.diagnosis.is_none());
    }

    #[test]
    fn test_strong_and_weak_ties_resolve_to_template_order() {
        let first = question("Q-08", false);
        let second = question("Q-09", false);
        let low = question("Q-10", false);
        let low_again = question("Q-11", false);
        let d = domain(
            "Apoio",
            vec![first.clone(), second.clone(), low.clone(), low_again.clone()],
        );
        let r = respondent(
            "A",
            vec![
                answer(&first, LikertResponse::Always),
                answer(&second, LikertResponse::Always),
                answer(&low, LikertResponse::Rarely),
                answer(&low_again, LikertResponse::Rarely),
            ],
        );
        let analysis = analyze_domain(&d, &[&r]);
        assert_eq!(analysis.strong_point.map(|q| q.question_id), Some(first.id));
        assert_eq!(analysis.weak_point.map(|q| q.question_id), Some(low.id));
    }

    #[test]
    fn test_diagnosis_levels() {
        let d = domain("Cargo", vec![]);
        assert_eq!(diagnose(&d, 0.0), None);
        assert_eq!(diagnose(&d, 2.5).map(|x| x.level), Some(DiagnosisLevel::Low));
        assert_eq!(diagnose(&d, 3.0).map(|x| x.level), Some(DiagnosisLevel::Low));
        assert_eq!(diagnose(&d, 3.5).map(|x| x.message), Some("médio".to_string()));
        assert_eq!(diagnose(&d, 4.0).map(|x| x.level), Some(DiagnosisLevel::High));
    }

    #[test]
    fn test_completion_rate_guards_zero_invited() {
        let respondents = vec![respondent("A", vec![])];
        assert_eq!(completion_rate(&respondents, 0), 0.0);
        assert_eq!(completion_rate(&respondents, 4), 25.0);
    }

    #[test]
    fn test_completion_rate_ignores_pending() {
        let mut pending = respondent("A", vec![]);
        pending.status = RespondentStatus::Started;
        let respondents = vec![respondent("A", vec![]), pending];
        assert_eq!(completion_rate(&respondents, 2), 50.0);
    }

    fn sample_template() -> (SurveyTemplate, Question, Question) {
        let q1 = question("Q-01", false);
        let q2 = question("Q-02", true);
        let template = SurveyTemplate {
            id: Uuid::new_v4(),
            name: "Indicador".to_string(),
            domains: vec![domain("Demandas", vec![q1.clone()]), domain("Controle", vec![q2.clone()])],
        };
        (template, q1, q2)
    }

    #[test]
    fn test_filter_restricts_totals_but_not_facets() {
        let (template, q1, q2) = sample_template();
        let respondents: Vec<Respondent> = (0..10)
            .map(|i| {
                let unit = match i {
                    0..=2 => "Unit A",
                    3..=6 => "Unit B",
                    _ => "Unit C",
                };
                respondent(
                    unit,
                    vec![answer(&q1, LikertResponse::Always), answer(&q2, LikertResponse::Never)],
                )
            })
            .collect();
        let input = DashboardInput {
            template: &template,
            respondents: &respondents,
            survey_status: DeploymentStatus::Open,
            total_invited: 20,
        };
        let filters = Filters {
            unit: Some("Unit A".to_string()),
            ..Default::default()
        };

        let data = build_dashboard(&input, &filters);
        assert_eq!(data.total_respondents, 3);
        assert_eq!(data.completion_rate, 50.0);
        assert_eq!(
            data.demographic_options.units,
            vec!["all", "Unit A", "Unit B", "Unit C"]
        );
        assert_eq!(data.demographic_options.sectors, vec!["all", "TI"]);
        assert_eq!(data.overall_sentiment.favorable.count, 6);
        assert_eq!(data.overall_sentiment.favorable.percentage, 100.0);
        assert_eq!(data.domains[1].domain_score, 5.0);

        let unfiltered = build_dashboard(&input, &Filters::default());
        assert_eq!(unfiltered.total_respondents, 10);
        assert_eq!(unfiltered.demographic_options, data.demographic_options);
    }

    #[test]
    fn test_filter_matching_nobody_yields_zero_state() {
        let (template, q1, _) = sample_template();
        let respondents = vec![respondent("Unit A", vec![answer(&q1, LikertResponse::Often)])];
        let input = DashboardInput {
            template: &template,
            respondents: &respondents,
            survey_status: DeploymentStatus::Closed,
            total_invited: 0,
        };
        let filters = Filters {
            unit: Some("Unit Z".to_string()),
            ..Default::default()
        };
        let data = build_dashboard(&input, &filters);
        assert_eq!(data.total_respondents, 0);
        assert_eq!(data.completion_rate, 0.0);
        assert_eq!(data.overall_sentiment, SentimentBreakdown::default());
        assert!(data.domains.iter().all(|d| d.domain_score == 0.0));
        assert!(data
            .domains
            .iter()
            .flat_map(|d| d.questions.iter())
            .all(|q| q.average_score.is_finite()));
    }

    #[test]
    fn test_build_is_deterministic() {
        let (template, q1, q2) = sample_template();
        let respondents = vec![
            respondent("Unit A", vec![answer(&q1, LikertResponse::Sometimes)]),
            respondent("Unit B", vec![answer(&q2, LikertResponse::Often)]),
        ];
        let input = DashboardInput {
            template: &template,
            respondents: &respondents,
            survey_status: DeploymentStatus::Open,
            total_invited: 3,
        };
        let first = serde_json::to_string(&build_dashboard(&input, &Filters::default())).unwrap();
        let second = serde_json::to_string(&build_dashboard(&input, &Filters::default())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_answers_outside_template_are_ignored() {
        let (template, q1, _) = sample_template();
        let stray = question("Q-99", false);
        let respondents = vec![respondent(
            "Unit A",
            vec![answer(&q1, LikertResponse::Always), answer(&stray, LikertResponse::Never)],
        )];
        let input = DashboardInput {
            template: &template,
            respondents: &respondents,
            survey_status: DeploymentStatus::Open,
            total_invited: 1,
        };
        let data = build_dashboard(&input, &Filters::default());
        assert_eq!(data.overall_sentiment.unfavorable.count, 0);
        assert_eq!(data.overall_sentiment.favorable.count, 1);
    }
}
