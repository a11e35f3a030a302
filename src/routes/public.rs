//! Public site endpoints
//!
//! JSON for the plan, section and search pages and for the listing blocks
//! embedded in editorial pages. What a caller sees follows its [`Viewer`].

use crate::auth::{PlanScope, Viewer};
use crate::db::{PlanFilter, UpdateFilter, UpdateWithPlan};
use crate::error::{ApiResult, AppError};
use crate::links::SiteLinks;
use crate::models::{
    plan_progress, Category, Government, GovernmentPlan, GovernmentPlanSection,
    GovernmentPlanUpdate, MessageResponse, PlanProgress, PlanRating, PlanStatus, PublicBody,
    StoredProposal, UpdateProposal,
};
use crate::search::PlanSearch;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use validator::Validate;

/// Search results are capped when a query is given
const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct GovernmentView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub planning_document: String,
    pub url: String,
    pub days_available: i64,
    pub days_left: i64,
    pub days_used_percentage: i64,
}

impl GovernmentView {
    fn new(links: &SiteLinks, government: &Government, today: NaiveDate) -> Self {
        Self {
            id: government.id,
            name: government.name.clone(),
            slug: government.slug.clone(),
            description: government.description.clone(),
            start_date: government.start_date,
            end_date: government.end_date,
            planning_document: government.planning_document.clone(),
            url: links.government_url(government),
            days_available: government.days_available(),
            days_left: government.days_left(today),
            days_used_percentage: government.days_used_percentage(today),
        }
    }
}

/// A plan as shown on cards and the detail page; proposals never leave the admin API
#[derive(Debug, Serialize)]
pub struct PlanCard {
    pub id: i32,
    pub government: i32,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub description: String,
    pub quote: String,
    pub due_date: Option<NaiveDate>,
    pub measure: String,
    pub status: PlanStatus,
    pub status_label: &'static str,
    pub status_css: &'static str,
    pub rating: Option<PlanRating>,
    pub rating_label: Option<&'static str>,
    pub reference: String,
    pub category_ids: Vec<i32>,
    pub properties: serde_json::Value,
}

impl PlanCard {
    fn new(links: &SiteLinks, government_slug: &str, plan: &GovernmentPlan) -> Self {
        Self {
            id: plan.id,
            government: plan.government_id,
            title: plan.title.clone(),
            slug: plan.slug.clone(),
            url: links.absolute(&links.plan_path(government_slug, &plan.slug)),
            description: plan.description.clone(),
            quote: plan.quote.clone(),
            due_date: plan.due_date,
            measure: plan.measure.clone(),
            status: plan.status,
            status_label: plan.status.label(),
            status_css: plan.status.css_class(),
            rating: plan.rating,
            rating_label: plan.rating.map(|r| r.label()),
            reference: plan.reference.clone(),
            category_ids: plan.category_ids.clone(),
            properties: plan.properties.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateView {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub content: String,
    pub url: String,
    pub url_domain: Option<String>,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
    pub site_url: String,
}

impl UpdateView {
    fn new(links: &SiteLinks, government_slug: &str, plan_slug: &str, update: GovernmentPlanUpdate) -> Self {
        Self {
            site_url: links.absolute(&links.update_path(government_slug, plan_slug, update.id)),
            url_domain: update.url_domain(),
            id: update.id,
            timestamp: update.timestamp,
            title: update.title,
            content: update.content,
            url: update.url,
            status: update.status,
            rating: update.rating,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SectionView {
    pub id: i32,
    pub government: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub order: i32,
    pub featured: Option<DateTime<Utc>>,
    pub url: String,
}

impl SectionView {
    fn new(links: &SiteLinks, government: &Government, section: &GovernmentPlanSection) -> Self {
        Self {
            id: section.id,
            government: section.government_id,
            title: section.title.clone(),
            slug: section.slug.clone(),
            description: section.description.clone(),
            icon: section.icon.clone(),
            order: section.order,
            featured: section.featured,
            url: links.section_url(government, section),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanDetail {
    pub government: GovernmentView,
    pub plan: PlanCard,
    pub categories: Vec<Category>,
    pub updates: Vec<UpdateView>,
    pub section: Option<SectionView>,
    pub reference_links: Vec<String>,
    pub responsible_publicbody: Option<PublicBody>,
    pub request_url: Option<String>,
    pub can_propose: bool,
}

#[derive(Debug, Serialize)]
pub struct SectionDetail {
    pub government: GovernmentView,
    pub section: SectionView,
    pub plans: Vec<PlanCard>,
    pub progress: PlanProgress,
}

#[derive(Debug, Serialize)]
pub struct UpdateListItem {
    #[serde(flatten)]
    pub update: UpdateView,
    pub plan_title: String,
    pub plan_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub government: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub government: Option<i32>,
    /// Comma separated category ids
    pub category: Option<String>,
    /// 0 means all
    pub count: Option<i64>,
    pub offset: Option<i64>,
}

impl ListingQuery {
    fn category_ids(&self) -> Vec<i32> {
        self.category
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }

    fn limit(&self) -> Option<i64> {
        self.count.filter(|count| *count > 0)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SectionsQuery {
    pub government: Option<i32>,
}

/// Staff may open non-public plans directly
fn detail_scope(viewer: &Viewer) -> PlanScope {
    if viewer.is_staff() {
        PlanScope::All
    } else {
        viewer.visible_plans()
    }
}

async fn visible_governments(
    state: &SharedState,
    viewer: &Viewer,
) -> Result<HashMap<i32, Government>, AppError> {
    let governments = state
        .governments
        .list(!viewer.sees_hidden_governments())
        .await?;
    Ok(governments.into_iter().map(|g| (g.id, g)).collect())
}

async fn visible_plan(
    state: &SharedState,
    viewer: &Viewer,
    government_slug: &str,
    plan_slug: &str,
) -> Result<(Government, GovernmentPlan), AppError> {
    state
        .plans
        .get_by_slugs(government_slug, plan_slug, &detail_scope(viewer))
        .await?
        .filter(|(government, _)| viewer.can_see_government(government))
        .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))
}

/// Cards for plans whose government is in `governments` and the scope permits
fn cards(
    links: &SiteLinks,
    governments: &HashMap<i32, Government>,
    scope: &PlanScope,
    plans: &[GovernmentPlan],
) -> Vec<PlanCard> {
    plans
        .iter()
        .filter_map(|plan| {
            governments
                .get(&plan.government_id)
                .filter(|g| scope.permits(plan, g))
                .map(|g| PlanCard::new(links, &g.slug, plan))
        })
        .collect()
}

/// Search only ever finds public plans, whoever asks
const SEARCH_SCOPE: PlanScope = PlanScope::Public;

/// GET /govplan/search/
pub async fn search(
    State(state): State<SharedState>,
    viewer: Viewer,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<PlanCard>>> {
    let q = query.q.as_deref().unwrap_or("").trim();
    let search = PlanSearch::new(q, &state.search_language);
    let limit = search.as_ref().map(|_| SEARCH_LIMIT);

    let mut filter = PlanFilter {
        search,
        ..Default::default()
    };
    // non-numeric government ids are ignored
    filter.government_id = query.government.as_deref().and_then(|g| g.parse().ok());
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        match status.parse::<PlanStatus>() {
            Ok(status) => filter.status = Some(status),
            Err(_) => return Ok(Json(Vec::new())),
        }
    }

    let governments = visible_governments(&state, &viewer).await?;
    let (_, plans) = state.plans.list(&SEARCH_SCOPE, &filter, limit, 0).await?;
    Ok(Json(cards(&state.links, &governments, &SEARCH_SCOPE, &plans)))
}

/// GET /govplan/{gov}/plan/{plan}/
pub async fn plan_detail(
    State(state): State<SharedState>,
    viewer: Viewer,
    Path((government_slug, plan_slug)): Path<(String, String)>,
) -> ApiResult<Json<PlanDetail>> {
    let (government, plan) = visible_plan(&state, &viewer, &government_slug, &plan_slug).await?;
    let today = Utc::now().date_naive();

    let updates = state
        .updates
        .for_plans(&[plan.id], false)
        .await?
        .into_iter()
        .map(|u| UpdateView::new(&state.links, &government.slug, &plan.slug, u))
        .collect();
    let section = state
        .plans
        .section(&plan)
        .await?
        .map(|s| SectionView::new(&state.links, &government, &s));
    let categories = state.lookups.categories(&plan.category_ids).await?;
    let responsible_publicbody = match plan.responsible_publicbody_id {
        Some(id) => state.lookups.public_body(id).await?,
        None => None,
    };
    let request_url = responsible_publicbody
        .as_ref()
        .map(|body| state.links.request_url(&plan, body));

    Ok(Json(PlanDetail {
        government: GovernmentView::new(&state.links, &government, today),
        plan: PlanCard::new(&state.links, &government.slug, &plan),
        reference_links: plan.reference_links(&government.planning_document),
        categories,
        updates,
        section,
        responsible_publicbody,
        request_url,
        can_propose: viewer.is_authenticated(),
    }))
}

/// POST /govplan/{gov}/plan/{plan}/propose-update/
pub async fn propose_update(
    State(state): State<SharedState>,
    viewer: Viewer,
    Path((government_slug, plan_slug)): Path<(String, String)>,
    Json(proposal): Json<UpdateProposal>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let user_id = viewer
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Log in to propose an update".to_string()))?;
    proposal
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (_, plan) = visible_plan(&state, &viewer, &government_slug, &plan_slug).await?;
    state
        .plans
        .add_proposal(plan.id, user_id, &StoredProposal::new(proposal, Utc::now()))
        .await?;

    info!(plan_id = plan.id, user_id, "Update proposed");
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "Thank you for your proposal. We will send you an email when it has been approved.",
        )),
    ))
}

/// GET /govplan/{gov}/{section}/
pub async fn section_detail(
    State(state): State<SharedState>,
    viewer: Viewer,
    Path((government_slug, section_slug)): Path<(String, String)>,
) -> ApiResult<Json<SectionDetail>> {
    let (government, section) = state
        .sections
        .get_by_slugs(&government_slug, &section_slug)
        .await?
        .filter(|(government, _)| viewer.can_see_government(government))
        .ok_or_else(|| AppError::NotFound("Section not found".to_string()))?;

    let plans = state.sections.plans(&section, &viewer.visible_plans()).await?;
    let progress = plan_progress(&plans);
    let plans = plans
        .iter()
        .map(|plan| PlanCard::new(&state.links, &government.slug, plan))
        .collect();

    Ok(Json(SectionDetail {
        government: GovernmentView::new(&state.links, &government, Utc::now().date_naive()),
        section: SectionView::new(&state.links, &government, &section),
        plans,
        progress,
    }))
}

/// GET /govplan/plans/
pub async fn list_plans(
    State(state): State<SharedState>,
    viewer: Viewer,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Vec<PlanCard>>> {
    let filter = PlanFilter {
        government_id: query.government,
        category_ids: query.category_ids(),
        ..Default::default()
    };
    let governments = visible_governments(&state, &viewer).await?;
    let scope = viewer.visible_plans();
    let (_, plans) = state
        .plans
        .list(&scope, &filter, query.limit(), query.offset())
        .await?;
    Ok(Json(cards(&state.links, &governments, &scope, &plans)))
}

/// GET /govplan/updates/
pub async fn list_updates(
    State(state): State<SharedState>,
    viewer: Viewer,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Vec<UpdateListItem>>> {
    let filter = UpdateFilter {
        government_id: query.government,
        category_ids: query.category_ids(),
        ..Default::default()
    };
    let (_, updates) = state
        .updates
        .list(
            &viewer.visible_plans(),
            viewer.sees_hidden_updates(),
            &filter,
            query.limit(),
            query.offset(),
        )
        .await?;

    let items = updates
        .into_iter()
        .map(|item: UpdateWithPlan| UpdateListItem {
            plan_url: state
                .links
                .absolute(&state.links.plan_path(&item.government_slug, &item.plan_slug)),
            update: UpdateView::new(
                &state.links,
                &item.government_slug,
                &item.plan_slug,
                item.update,
            ),
            plan_title: item.plan_title,
        })
        .collect();
    Ok(Json(items))
}

/// GET /govplan/sections/
pub async fn list_sections(
    State(state): State<SharedState>,
    viewer: Viewer,
    Query(query): Query<SectionsQuery>,
) -> ApiResult<Json<Vec<SectionView>>> {
    let governments = visible_governments(&state, &viewer).await?;
    let sections = state
        .sections
        .list(query.government, !viewer.sees_hidden_governments())
        .await?;
    let views = sections
        .iter()
        .filter_map(|section| {
            governments
                .get(&section.government_id)
                .map(|g| SectionView::new(&state.links, g, section))
        })
        .collect();
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, TokenType};
    use pretty_assertions::assert_eq;

    fn claims() -> Claims {
        Claims {
            sub: 1,
            email: "redaktion@example.org".to_string(),
            is_staff: true,
            can_manage_plans: false,
            groups: vec![],
            exp: 0,
            iat: 0,
            token_type: TokenType::Access,
        }
    }

    fn staff() -> Viewer {
        Viewer(Some(claims()))
    }

    #[test]
    fn test_detail_scope() {
        assert_eq!(detail_scope(&Viewer::anonymous()), PlanScope::Public);
        assert_eq!(detail_scope(&staff()), PlanScope::All);
    }

    #[test]
    fn test_search_cards_skip_hidden_plans_for_managers() {
        let government = Government {
            id: 1,
            name: "Ampel".to_string(),
            slug: "ampel".to_string(),
            public: true,
            jurisdiction_id: None,
            description: String::new(),
            start_date: None,
            end_date: None,
            active: true,
            planning_document: String::new(),
        };
        let governments = HashMap::from([(1, government)]);
        let mut hidden = crate::models::plan::tests::plan();
        hidden.id = 8;
        hidden.public = false;
        let plans = vec![crate::models::plan::tests::plan(), hidden];
        let links = SiteLinks::new(&crate::config::SiteConfig::default());

        let manager = Viewer(Some(Claims {
            can_manage_plans: true,
            ..claims()
        }));
        assert_eq!(manager.visible_plans(), PlanScope::All);
        let found = cards(&links, &governments, &SEARCH_SCOPE, &plans);
        assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_listing_query() {
        let query = ListingQuery {
            category: Some("3, x,5".to_string()),
            count: Some(0),
            offset: Some(-2),
            ..Default::default()
        };
        assert_eq!(query.category_ids(), vec![3, 5]);
        assert_eq!(query.limit(), None);
        assert_eq!(query.offset(), 0);

        let query = ListingQuery {
            count: Some(4),
            ..Default::default()
        };
        assert_eq!(query.limit(), Some(4));
    }
}
