use crate::domain::models::{Demographics, Respondent};
use serde::{Deserialize, Serialize};

/// Wildcard value meaning "no constraint" for a filter key.
pub const ALL: &str = "all";

/// Demographic filter applied to dashboard queries.
///
/// Keys are fixed; unknown query keys are rejected during deserialisation. A
/// missing key and the value `"all"` both mean no constraint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Filters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_role_time: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKey {
    Unit,
    Sector,
    AgeRange,
    CurrentRoleTime,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Unit,
        FilterKey::Sector,
        FilterKey::AgeRange,
        FilterKey::CurrentRoleTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Unit => "unit",
            FilterKey::Sector => "sector",
            FilterKey::AgeRange => "age_range",
            FilterKey::CurrentRoleTime => "current_role_time",
        }
    }

    pub fn value_of<'a>(&self, demographics: &'a Demographics) -> &'a str {
        match self {
            FilterKey::Unit => &demographics.unit,
            FilterKey::Sector => &demographics.sector,
            FilterKey::AgeRange => &demographics.age_range,
            FilterKey::CurrentRoleTime => &demographics.current_role_time,
        }
    }
}

impl Filters {
    fn raw(&self, key: FilterKey) -> Option<&String> {
        match key {
            FilterKey::Unit => self.unit.as_ref(),
            FilterKey::Sector => self.sector.as_ref(),
            FilterKey::AgeRange => self.age_range.as_ref(),
            FilterKey::CurrentRoleTime => self.current_role_time.as_ref(),
        }
    }

    /// Concrete value required for `key`, or `None` when unconstrained.
    pub fn constraint(&self, key: FilterKey) -> Option<&str> {
        self.raw(key).map(String::as_str).filter(|v| *v != ALL)
    }

    /// Active (key, value) pairs, in a fixed key order.
    pub fn active(&self) -> Vec<(FilterKey, &str)> {
        FilterKey::ALL
            .into_iter()
            .filter_map(|key| self.constraint(key).map(|value| (key, value)))
            .collect()
    }

    pub fn matches(&self, demographics: &Demographics) -> bool {
        FilterKey::ALL.into_iter().all(|key| match self.constraint(key) {
            Some(expected) => key.value_of(demographics) == expected,
            None => true,
        })
    }

    pub fn apply<'a>(&self, respondents: &'a [Respondent]) -> Vec<&'a Respondent> {
        respondents
            .iter()
            .filter(|r| self.matches(&r.demographics))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RespondentStatus;
    use uuid::Uuid;

    fn respondent(unit: &str, sector: &str, age: &str) -> Respondent {
        Respondent {
            id: Uuid::new_v4(),
            deployment_id: Uuid::nil(),
            status: RespondentStatus::Completed,
            demographics: Demographics {
                unit: unit.to_string(),
                sector: sector.to_string(),
                age_range: age.to_string(),
                current_role_time: "1-3 anos".to_string(),
                ..Default::default()
            },
            completed_at: None,
            answers: Vec::new(),
        }
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let all = vec![
            respondent("Unit A", "TI", "18-25"),
            respondent("Unit B", "RH", "26-35"),
        ];
        let filtered = Filters::default().apply(&all);
        assert_eq!(filtered.len(), all.len());
    }

    #[test]
    fn test_all_wildcard_is_unconstrained() {
        let filters = Filters {
            unit: Some(ALL.to_string()),
            sector: Some(ALL.to_string()),
            ..Default::default()
        };
        assert!(filters.active().is_empty());
        assert!(filters.matches(&respondent("X", "Y", "Z").demographics));
    }

    #[test]
    fn test_every_active_key_must_match() {
        let filters = Filters {
            unit: Some("Unit A".to_string()),
            age_range: Some("18-25".to_string()),
            ..Default::default()
        };
        assert!(filters.matches(&respondent("Unit A", "TI", "18-25").demographics));
        assert!(!filters.matches(&respondent("Unit A", "TI", "26-35").demographics));
        assert!(!filters.matches(&respondent("unit a", "TI", "18-25").demographics));
    }

    #[test]
    fn test_filtered_is_subset() {
        let all: Vec<Respondent> = (0..10)
            .map(|i| respondent(if i < 3 { "Unit A" } else { "Unit B" }, "TI", "18-25"))
            .collect();
        let filters = Filters {
            unit: Some("Unit A".to_string()),
            ..Default::default()
        };
        let filtered = filters.apply(&all);
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|r| all.iter().any(|a| a.id == r.id)));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let ok: Result<Filters, _> =
            serde_json::from_str(r#"{"unit":"Unit A","current_role_time":"all"}"#);
        assert!(ok.is_ok());
        let bad: Result<Filters, _> = serde_json::from_str(r#"{"gender":"F"}"#);
        assert!(bad.is_err());
    }
}
