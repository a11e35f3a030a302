//! Sections group a government's plans by category for display

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernmentPlanSection {
    pub id: i32,
    pub government_id: i32,
    pub title: String,
    pub slug: String,
    pub category_ids: Vec<i32>,
    pub description: String,
    /// FontAwesome icon name
    pub icon: String,
    pub order: i32,
    pub featured: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SectionInput {
    pub government_id: i32,
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub slug: String,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub icon: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub order: i32,
    pub featured: Option<DateTime<Utc>>,
}
