//! Data models and DTOs (Data Transfer Objects)
//!
//! Domain records for governments, plans, updates and sections, plus the
//! request/response structures used by the API.

pub mod government;
pub mod lookup;
pub mod plan;
pub mod progress;
pub mod proposal;
pub mod section;
pub mod update;

// Re-export commonly used types
pub use government::*;
pub use lookup::*;
pub use plan::*;
pub use progress::*;
pub use proposal::*;
pub use section::*;
pub use update::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Page of results in the shape the public REST API has always used
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}
