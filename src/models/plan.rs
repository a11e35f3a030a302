//! Government plans, their status and rating enums

use crate::models::update::GovernmentPlanUpdate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Implementation status of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    NotStarted,
    Started,
    PartiallyImplemented,
    Implemented,
    Deferred,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 5] = [
        PlanStatus::NotStarted,
        PlanStatus::Started,
        PlanStatus::PartiallyImplemented,
        PlanStatus::Implemented,
        PlanStatus::Deferred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::NotStarted => "not_started",
            PlanStatus::Started => "started",
            PlanStatus::PartiallyImplemented => "partially_implemented",
            PlanStatus::Implemented => "implemented",
            PlanStatus::Deferred => "deferred",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanStatus::NotStarted => "not started",
            PlanStatus::Started => "started",
            PlanStatus::PartiallyImplemented => "partially implemented",
            PlanStatus::Implemented => "implemented",
            PlanStatus::Deferred => "deferred",
        }
    }

    /// Badge colour on plan cards
    pub fn css_class(&self) -> &'static str {
        match self {
            PlanStatus::NotStarted => "light",
            PlanStatus::Started => "primary",
            PlanStatus::PartiallyImplemented => "warning",
            PlanStatus::Implemented => "success",
            PlanStatus::Deferred => "danger",
        }
    }

    /// Read an update's status column, where the empty string means "no change"
    pub fn from_column(value: &str) -> Option<PlanStatus> {
        value.parse().ok()
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("'{}' is not a valid plan status", s))
    }
}

/// Editorial rating of how well a plan is being implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum PlanRating {
    Terrible = 1,
    Bad = 2,
    Okay = 3,
    Good = 4,
    Excellent = 5,
}

impl PlanRating {
    pub fn label(&self) -> &'static str {
        match self {
            PlanRating::Terrible => "terrible",
            PlanRating::Bad => "bad",
            PlanRating::Okay => "OK",
            PlanRating::Good => "good",
            PlanRating::Excellent => "excellent",
        }
    }
}

impl From<PlanRating> for i32 {
    fn from(rating: PlanRating) -> Self {
        rating as i32
    }
}

impl TryFrom<i32> for PlanRating {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PlanRating::Terrible),
            2 => Ok(PlanRating::Bad),
            3 => Ok(PlanRating::Okay),
            4 => Ok(PlanRating::Good),
            5 => Ok(PlanRating::Excellent),
            other => Err(format!("{} is not a valid rating (1-5)", other)),
        }
    }
}

/// A tracked policy commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernmentPlan {
    pub id: i32,
    pub government_id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub quote: String,
    pub public: bool,
    pub due_date: Option<NaiveDate>,
    pub measure: String,
    pub status: PlanStatus,
    pub rating: Option<PlanRating>,
    pub reference: String,
    pub category_ids: Vec<i32>,
    pub responsible_publicbody_id: Option<i32>,
    pub group_id: Option<i32>,
    pub proposals: Option<serde_json::Value>,
    pub properties: serde_json::Value,
}

impl GovernmentPlan {
    /// Pull status and rating from the latest public updates that carry them.
    ///
    /// Returns true when at least one such update exists, meaning the plan
    /// must be written back.
    pub fn apply_updates(&mut self, updates: &[GovernmentPlanUpdate]) -> bool {
        let public = || updates.iter().filter(|u| u.public);

        let last_status = public()
            .filter_map(|u| u.status.map(|status| ((u.timestamp, u.id), status)))
            .max_by_key(|(key, _)| *key);
        let last_rating = public()
            .filter_map(|u| u.rating.map(|rating| ((u.timestamp, u.id), rating)))
            .max_by_key(|(key, _)| *key);

        if let Some((_, status)) = last_status {
            self.status = status;
        }
        if let Some((_, rating)) = last_rating {
            self.rating = Some(rating);
        }
        last_status.is_some() || last_rating.is_some()
    }

    /// Links into the planning document for each reference
    pub fn reference_links(&self, planning_document: &str) -> Vec<String> {
        if self.reference.starts_with("https://") {
            return vec![self.reference.clone()];
        }
        self.reference
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("{}#p-{}", planning_document, r))
            .collect()
    }

    /// Tag FOI requests about this plan carry
    pub fn foirequest_reference(&self) -> String {
        format!("govplan:plan@{}", self.id)
    }
}

/// Create or replace a plan
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlanInput {
    pub government_id: i32,
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    /// Prepopulated from the title when empty
    #[serde(default)]
    #[validate(length(max = 255))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub public: bool,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub measure: String,
    #[serde(default = "default_status")]
    pub status: PlanStatus,
    pub rating: Option<PlanRating>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub reference: String,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    pub responsible_publicbody_id: Option<i32>,
    pub group_id: Option<i32>,
    #[serde(default = "empty_object")]
    #[validate(custom(function = "validate_properties"))]
    pub properties: serde_json::Value,
}

fn default_status() -> PlanStatus {
    PlanStatus::NotStarted
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

fn validate_properties(value: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if value.is_object() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("properties");
    err.message = Some("Properties must be a JSON object".into());
    Err(err)
}

/// Filters of the admin plan list
#[derive(Debug, Default, Deserialize)]
pub struct PlanListQuery {
    pub government: Option<i32>,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
    pub public: Option<bool>,
    /// `key` or `key:value`
    pub properties: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    pub(crate) fn plan() -> GovernmentPlan {
        GovernmentPlan {
            id: 7,
            government_id: 1,
            title: "Digitale Verwaltung".to_string(),
            slug: "digitale-verwaltung".to_string(),
            description: String::new(),
            quote: String::new(),
            public: true,
            due_date: None,
            measure: String::new(),
            status: PlanStatus::NotStarted,
            rating: None,
            reference: String::new(),
            category_ids: vec![],
            responsible_publicbody_id: None,
            group_id: None,
            proposals: None,
            properties: serde_json::json!({}),
        }
    }

    fn update(
        id: i32,
        day: u32,
        public: bool,
        status: Option<PlanStatus>,
        rating: Option<PlanRating>,
    ) -> GovernmentPlanUpdate {
        GovernmentPlanUpdate {
            id,
            plan_id: 7,
            user_id: None,
            timestamp: Utc.with_ymd_and_hms(2023, 3, day, 12, 0, 0).unwrap(),
            title: format!("update {}", id),
            content: String::new(),
            url: String::new(),
            status,
            rating,
            public,
            foirequest_id: None,
        }
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in PlanStatus::ALL {
            assert_eq!(status.as_str().parse::<PlanStatus>().unwrap(), status);
        }
        assert_eq!(PlanStatus::from_column(""), None);
        assert!("done".parse::<PlanStatus>().is_err());
    }

    #[test]
    fn test_rating_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&PlanRating::Good).unwrap(), "4");
        assert_eq!(
            serde_json::from_str::<PlanRating>("2").unwrap(),
            PlanRating::Bad
        );
        assert!(serde_json::from_str::<PlanRating>("6").is_err());
    }

    #[test]
    fn test_apply_updates_uses_latest_public_values() {
        let mut plan = plan();
        let updates = vec![
            update(1, 1, true, Some(PlanStatus::Started), Some(PlanRating::Bad)),
            update(2, 5, true, Some(PlanStatus::PartiallyImplemented), None),
            update(3, 9, false, Some(PlanStatus::Deferred), Some(PlanRating::Terrible)),
            update(4, 7, true, None, Some(PlanRating::Good)),
        ];

        assert!(plan.apply_updates(&updates));
        assert_eq!(plan.status, PlanStatus::PartiallyImplemented);
        assert_eq!(plan.rating, Some(PlanRating::Good));
    }

    #[test]
    fn test_apply_updates_ignores_order_of_input() {
        let mut plan = plan();
        let updates = vec![
            update(2, 8, true, Some(PlanStatus::Implemented), None),
            update(1, 2, true, Some(PlanStatus::Started), None),
        ];
        plan.apply_updates(&updates);
        assert_eq!(plan.status, PlanStatus::Implemented);
    }

    #[test]
    fn test_apply_updates_without_public_values_keeps_plan() {
        let mut plan = plan();
        plan.status = PlanStatus::Started;
        plan.rating = Some(PlanRating::Okay);
        let updates = vec![
            update(1, 1, true, None, None),
            update(2, 2, false, Some(PlanStatus::Deferred), Some(PlanRating::Bad)),
        ];

        assert!(!plan.apply_updates(&updates));
        assert_eq!(plan.status, PlanStatus::Started);
        assert_eq!(plan.rating, Some(PlanRating::Okay));
    }

    #[test]
    fn test_reference_links() {
        let mut plan = plan();
        plan.reference = "12, 14 ,".to_string();
        assert_eq!(
            plan.reference_links("https://example.org/vertrag"),
            vec![
                "https://example.org/vertrag#p-12".to_string(),
                "https://example.org/vertrag#p-14".to_string(),
            ]
        );

        plan.reference = "https://example.org/beschluss".to_string();
        assert_eq!(
            plan.reference_links("https://example.org/vertrag"),
            vec!["https://example.org/beschluss".to_string()]
        );
    }

    #[test]
    fn test_plan_input_defaults() {
        let input: PlanInput =
            serde_json::from_str(r#"{"government_id": 1, "title": "Klimaschutz"}"#).unwrap();
        assert_eq!(input.status, PlanStatus::NotStarted);
        assert!(input.properties.is_object());
        assert!(input.validate().is_ok());

        let input: PlanInput = serde_json::from_str(
            r#"{"government_id": 1, "title": "Klimaschutz", "properties": [1]}"#,
        )
        .unwrap();
        assert!(input.validate().is_err());
    }
}
