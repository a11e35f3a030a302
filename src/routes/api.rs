//! Public REST read API
//!
//! Only public governments, public plans and public updates are served here,
//! whoever asks.

use crate::auth::PlanScope;
use crate::db::{PlanFilter, PropertyFilter};
use crate::error::{validation_error, ApiResult, AppError};
use crate::links::SiteLinks;
use crate::models::{
    Government, GovernmentPlan, GovernmentPlanUpdate, GovernmentSummary, Page, PlanRating,
    PlanStatus,
};
use crate::state::SharedState;
use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::Uri,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Serialize)]
pub struct PlanResource {
    pub id: i32,
    pub site_url: String,
    pub government: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub quote: String,
    pub due_date: Option<NaiveDate>,
    pub measure: String,
    pub status: PlanStatus,
    pub rating: Option<PlanRating>,
    pub properties: serde_json::Value,
    pub updates: Vec<UpdateResource>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResource {
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub site_url: String,
    pub url: String,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
}

impl PlanResource {
    fn new(
        links: &SiteLinks,
        government: &Government,
        plan: GovernmentPlan,
        updates: Vec<GovernmentPlanUpdate>,
    ) -> Self {
        let updates = updates
            .into_iter()
            .map(|update| UpdateResource {
                site_url: links.absolute(&links.update_path(
                    &government.slug,
                    &plan.slug,
                    update.id,
                )),
                timestamp: update.timestamp,
                title: update.title,
                content: update.content,
                url: update.url,
                status: update.status,
                rating: update.rating,
            })
            .collect();
        Self {
            site_url: links.plan_url(government, &plan),
            id: plan.id,
            government: plan.government_id,
            title: plan.title,
            slug: plan.slug,
            description: plan.description,
            quote: plan.quote,
            due_date: plan.due_date,
            measure: plan.measure,
            status: plan.status,
            rating: plan.rating,
            properties: plan.properties,
            updates,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanApiQuery {
    pub government: Option<String>,
    pub status: Option<String>,
    pub rating: Option<String>,
    pub properties: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/government/
pub async fn list_governments(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<GovernmentSummary>>> {
    let governments = state.governments.list(true).await?;
    Ok(Json(governments.iter().map(GovernmentSummary::from).collect()))
}

/// GET /api/v1/government/{id}/
pub async fn get_government(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<GovernmentSummary>> {
    let government = state
        .governments
        .get(id)
        .await?
        .filter(|g| g.public)
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;
    Ok(Json(GovernmentSummary::from(&government)))
}

/// GET /api/v1/governmentplan/
pub async fn list_plans(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PlanApiQuery>,
) -> ApiResult<Json<Page<PlanResource>>> {
    let governments: HashMap<i32, Government> = state
        .governments
        .list(true)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    let filter = plan_filter(&query, &governments)?;
    let limit = page_size(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let (count, plans) = state
        .plans
        .list(&PlanScope::Public, &filter, Some(limit), offset)
        .await?;
    let results = with_updates(&state, &governments, plans).await?;

    let (next, previous) = page_links(&state.links, &uri, count, limit, offset);
    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

/// GET /api/v1/governmentplan/{id}/
pub async fn get_plan(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PlanResource>> {
    let plan = state
        .plans
        .get(id, &PlanScope::Public)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;
    let government = state
        .governments
        .get(plan.government_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".to_string()))?;

    let updates = state.updates.for_plans(&[plan.id], false).await?;
    Ok(Json(PlanResource::new(&state.links, &government, plan, updates)))
}

fn plan_filter(
    query: &PlanApiQuery,
    public_governments: &HashMap<i32, Government>,
) -> Result<PlanFilter, AppError> {
    let mut filter = PlanFilter::default();

    if let Some(raw) = query.government.as_deref().filter(|s| !s.is_empty()) {
        let id = raw
            .parse::<i32>()
            .ok()
            .filter(|id| public_governments.contains_key(id))
            .ok_or_else(|| {
                validation_error("government: Select a valid choice. That choice is not one of the available choices.")
            })?;
        filter.government_id = Some(id);
    }
    if let Some(raw) = query.status.as_deref().filter(|s| !s.is_empty()) {
        filter.status = Some(raw.parse().map_err(|e: String| validation_error(format!("status: {}", e)))?);
    }
    if let Some(raw) = query.rating.as_deref().filter(|s| !s.is_empty()) {
        let rating = raw
            .parse::<i32>()
            .map_err(|_| validation_error("rating: Enter a whole number."))?;
        filter.rating = Some(
            PlanRating::try_from(rating).map_err(|e| validation_error(format!("rating: {}", e)))?,
        );
    }
    filter.property = query.properties.as_deref().and_then(PropertyFilter::parse);
    Ok(filter)
}

async fn with_updates(
    state: &SharedState,
    governments: &HashMap<i32, Government>,
    plans: Vec<GovernmentPlan>,
) -> Result<Vec<PlanResource>, AppError> {
    let ids: Vec<i32> = plans.iter().map(|p| p.id).collect();
    let mut updates_by_plan: HashMap<i32, Vec<GovernmentPlanUpdate>> = HashMap::new();
    for update in state.updates.for_plans(&ids, false).await? {
        updates_by_plan.entry(update.plan_id).or_default().push(update);
    }

    let mut results = Vec::with_capacity(plans.len());
    for plan in plans {
        // the public scope only returns plans of public governments
        let Some(government) = governments.get(&plan.government_id) else {
            continue;
        };
        let updates = updates_by_plan.remove(&plan.id).unwrap_or_default();
        results.push(PlanResource::new(&state.links, government, plan, updates));
    }
    Ok(results)
}

pub fn page_size(requested: Option<i64>) -> i64 {
    requested
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE)
}

/// Absolute `next` and `previous` URLs keeping every other query parameter
pub fn page_links(
    links: &SiteLinks,
    uri: &Uri,
    count: i64,
    limit: i64,
    offset: i64,
) -> (Option<String>, Option<String>) {
    let next = (offset + limit < count).then(|| page_url(links, uri, limit, Some(offset + limit)));
    let previous = (offset > 0).then(|| {
        let previous_offset = offset - limit;
        page_url(links, uri, limit, (previous_offset > 0).then_some(previous_offset))
    });
    (next, previous)
}

fn page_url(links: &SiteLinks, uri: &Uri, limit: i64, offset: Option<i64>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let existing = uri.query().unwrap_or("");
    for (key, value) in url::form_urlencoded::parse(existing.as_bytes()) {
        if key != "limit" && key != "offset" {
            query.append_pair(&key, &value);
        }
    }
    query.append_pair("limit", &limit.to_string());
    if let Some(offset) = offset {
        query.append_pair("offset", &offset.to_string());
    }
    format!("{}?{}", links.absolute(uri.path()), query.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use pretty_assertions::assert_eq;

    fn links() -> SiteLinks {
        SiteLinks::new(&SiteConfig {
            site_url: "https://example.org".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(page_size(None), 50);
        assert_eq!(page_size(Some(0)), 50);
        assert_eq!(page_size(Some(10)), 10);
        assert_eq!(page_size(Some(1000)), 200);
    }

    #[test]
    fn test_page_links() {
        let uri: Uri = "/api/v1/governmentplan/?status=started&offset=10&limit=10"
            .parse()
            .unwrap();
        let (next, previous) = page_links(&links(), &uri, 25, 10, 10);
        assert_eq!(
            next.as_deref(),
            Some("https://example.org/api/v1/governmentplan/?status=started&limit=10&offset=20")
        );
        assert_eq!(
            previous.as_deref(),
            Some("https://example.org/api/v1/governmentplan/?status=started&limit=10")
        );

        let (next, previous) = page_links(&links(), &uri, 5, 10, 0);
        assert_eq!(next, None);
        assert_eq!(previous, None);
    }

    #[test]
    fn test_plan_filter_rejects_hidden_government() {
        let query = PlanApiQuery {
            government: Some("7".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            plan_filter(&query, &HashMap::new()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_plan_filter_parses_values() {
        let query = PlanApiQuery {
            status: Some("implemented".to_string()),
            rating: Some("5".to_string()),
            properties: Some("ressort:BMI".to_string()),
            ..Default::default()
        };
        let filter = plan_filter(&query, &HashMap::new()).unwrap();
        assert_eq!(filter.status, Some(PlanStatus::Implemented));
        assert_eq!(filter.rating, Some(PlanRating::Excellent));
        assert_eq!(
            filter.property,
            Some(PropertyFilter::Contains("ressort".to_string(), "BMI".to_string()))
        );

        let bad = PlanApiQuery {
            rating: Some("9".to_string()),
            ..Default::default()
        };
        assert!(plan_filter(&bad, &HashMap::new()).is_err());
    }
}
