//! Government (a governing term) and its request types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A governing term whose plans are tracked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Government {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub public: bool,
    pub jurisdiction_id: Option<i32>,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub planning_document: String,
}

impl Government {
    /// Length of the term in days, 0 when either end is open
    pub fn days_available(&self) -> i64 {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (end - start).num_days(),
            _ => 0,
        }
    }

    pub fn days_left(&self, today: NaiveDate) -> i64 {
        match self.end_date {
            Some(end) if today <= end => (end - today).num_days(),
            _ => 0,
        }
    }

    /// Elapsed share of the term, truncated to a whole percent
    pub fn days_used_percentage(&self, today: NaiveDate) -> i64 {
        let total = self.days_available();
        let Some(start) = self.start_date else {
            return 0;
        };
        if total == 0 {
            return 0;
        }
        let used = (today - start).num_days();
        (used as f64 / total as f64 * 100.0) as i64
    }
}

/// Public API shape of a government
#[derive(Debug, Serialize)]
pub struct GovernmentSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub planning_document: String,
}

impl From<&Government> for GovernmentSummary {
    fn from(government: &Government) -> Self {
        Self {
            id: government.id,
            name: government.name.clone(),
            slug: government.slug.clone(),
            start_date: government.start_date,
            end_date: government.end_date,
            planning_document: government.planning_document.clone(),
        }
    }
}

/// Create or replace a government
#[derive(Debug, Deserialize, Validate)]
pub struct GovernmentInput {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    /// Prepopulated from the name when empty
    #[serde(default)]
    #[validate(length(max = 255))]
    pub slug: String,
    #[serde(default)]
    pub public: bool,
    pub jurisdiction_id: Option<i32>,
    #[serde(default)]
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    #[validate(custom(function = "validate_optional_url"))]
    pub planning_document: String,
}

fn default_true() -> bool {
    true
}

/// Blank is allowed, anything else must be an absolute URL
pub fn validate_optional_url(value: &str) -> Result<(), validator::ValidationError> {
    if value.is_empty() || url::Url::parse(value).is_ok() {
        return Ok(());
    }
    let mut err = validator::ValidationError::new("url");
    err.message = Some("Enter a valid URL.".into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Government {
        Government {
            id: 1,
            name: "Kabinett Scholz".to_string(),
            slug: "scholz".to_string(),
            public: true,
            jurisdiction_id: None,
            description: String::new(),
            start_date: start,
            end_date: end,
            active: true,
            planning_document: String::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_available() {
        let gov = term(Some(date(2021, 12, 8)), Some(date(2025, 12, 8)));
        assert_eq!(gov.days_available(), 1461);
        assert_eq!(term(None, Some(date(2025, 1, 1))).days_available(), 0);
        assert_eq!(term(Some(date(2021, 1, 1)), None).days_available(), 0);
    }

    #[test]
    fn test_days_left() {
        let gov = term(Some(date(2022, 1, 1)), Some(date(2022, 1, 31)));
        assert_eq!(gov.days_left(date(2022, 1, 21)), 10);
        assert_eq!(gov.days_left(date(2022, 2, 1)), 0);
        assert_eq!(term(None, None).days_left(date(2022, 1, 1)), 0);
    }

    #[test]
    fn test_days_used_percentage() {
        let gov = term(Some(date(2022, 1, 1)), Some(date(2022, 1, 11)));
        assert_eq!(gov.days_used_percentage(date(2022, 1, 6)), 50);
        assert_eq!(gov.days_used_percentage(date(2022, 1, 4)), 30);
        assert_eq!(term(None, None).days_used_percentage(date(2022, 1, 4)), 0);
    }

    #[test]
    fn test_optional_url() {
        assert!(validate_optional_url("").is_ok());
        assert!(validate_optional_url("https://example.org/vertrag.pdf").is_ok());
        assert!(validate_optional_url("vertrag.pdf").is_err());
    }
}
