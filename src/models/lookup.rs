//! Reference tables the plans point at
//!
//! Categories, public bodies and jurisdictions are owned by the wider
//! platform; only the columns the tracker reads are modelled here.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBody {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub jurisdiction_id: Option<i32>,
}

/// Account allowed to sign in to the admin API
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub is_staff: bool,
    pub can_manage_plans: bool,
    pub group_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub is_staff: bool,
    pub can_manage_plans: bool,
    pub groups: Vec<i32>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_staff: user.is_staff,
            can_manage_plans: user.can_manage_plans,
            groups: user.group_ids.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}
