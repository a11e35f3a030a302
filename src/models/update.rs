//! Plan updates: dated notes that may change a plan's status or rating

use crate::models::government::validate_optional_url;
use crate::models::plan::{PlanRating, PlanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Position;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernmentPlanUpdate {
    pub id: i32,
    pub plan_id: i32,
    pub user_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub url: String,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
    pub public: bool,
    pub foirequest_id: Option<i32>,
}

impl GovernmentPlanUpdate {
    /// Host of the source link with its port, if it has one
    pub fn url_domain(&self) -> Option<String> {
        let url = url::Url::parse(&self.url).ok()?;
        url.host_str()?;
        Some(url[Position::BeforeHost..Position::AfterPort].to_string())
    }
}

/// Create or replace an update
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInput {
    pub plan_id: i32,
    pub user_id: Option<i32>,
    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 1024), custom(function = "validate_optional_url"))]
    pub url: String,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
    #[serde(default)]
    pub public: bool,
    pub foirequest_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateListQuery {
    pub status: Option<PlanStatus>,
    pub public: Option<bool>,
    /// Matches the update title or the plan title
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> GovernmentPlanUpdate {
        GovernmentPlanUpdate {
            id: 1,
            plan_id: 1,
            user_id: None,
            timestamp: Utc::now(),
            title: String::new(),
            content: String::new(),
            url: url.to_string(),
            status: None,
            rating: None,
            public: true,
            foirequest_id: None,
        }
    }

    #[test]
    fn test_url_domain() {
        assert_eq!(
            with_url("https://www.bundestag.de/drucksachen/123").url_domain(),
            Some("www.bundestag.de".to_string())
        );
        assert_eq!(
            with_url("https://example.org:8443/x").url_domain(),
            Some("example.org:8443".to_string())
        );
        assert_eq!(with_url("").url_domain(), None);
        assert_eq!(with_url("bundestag.de/x").url_domain(), None);
    }
}
