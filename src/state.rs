//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::db::{
    GovernmentService, LookupService, PlanService, SectionService, UpdateService, UserService,
};
use crate::links::SiteLinks;
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub governments: GovernmentService,
    pub plans: PlanService,
    pub updates: UpdateService,
    pub sections: SectionService,
    pub lookups: LookupService,
    pub users: UserService,
    pub links: SiteLinks,
    /// PostgreSQL text search configuration used for plan search
    pub search_language: String,
    /// JWT secret key for token signing
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(pool: Pool, settings: &Settings) -> Self {
        Self {
            governments: GovernmentService::new(pool.clone()),
            plans: PlanService::new(pool.clone()),
            updates: UpdateService::new(pool.clone()),
            sections: SectionService::new(pool.clone()),
            lookups: LookupService::new(pool.clone()),
            users: UserService::new(pool),
            links: SiteLinks::new(&settings.site),
            search_language: settings.site.search_language.clone(),
            jwt_secret: settings.auth.jwt_secret.clone(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
