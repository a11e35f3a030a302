//! Admin API for editors
//!
//! Every route here sits behind [`require_staff`](crate::auth::require_staff).
//! Governments and sections need the manage-plans permission; plans and
//! updates are limited to the editor's allowed plans.

use crate::auth::{Claims, PlanScope, Viewer};
use crate::db::{PlanFilter, PropertyFilter, UpdateFilter, UpdateWithPlan};
use crate::error::{ApiResult, AppError};
use crate::models::{
    AcceptProposal, Government, GovernmentInput, GovernmentPlan, GovernmentPlanSection,
    GovernmentPlanUpdate, MessageResponse, Page, PlanInput, PlanListQuery, Proposals,
    SectionInput, SuccessResponse, UpdateInput, UpdateListQuery,
};
use crate::routes::api::{page_links, page_size};
use crate::sanitize::clean_rich_text;
use crate::search::PlanSearch;
use crate::state::SharedState;
use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

fn validate<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn require_manage_plans(claims: &Claims) -> Result<(), AppError> {
    if claims.can_manage_plans {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Managing governments and sections requires the manage-plans permission".to_string(),
        ))
    }
}

/// Limited editors may only assign plans to their own groups
fn check_group(scope: &PlanScope, group_id: Option<i32>) -> Result<(), AppError> {
    match scope {
        PlanScope::Groups(groups) if !group_id.is_some_and(|g| groups.contains(&g)) => Err(
            AppError::Forbidden("Plans must belong to one of your groups".to_string()),
        ),
        _ => Ok(()),
    }
}

async fn allowed_plan(
    state: &SharedState,
    scope: &PlanScope,
    id: i32,
) -> Result<GovernmentPlan, AppError> {
    state
        .plans
        .get(id, scope)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", id)))
}

// ============================================
// Governments
// ============================================

pub async fn list_governments(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<Government>>> {
    Ok(Json(state.governments.list(false).await?))
}

pub async fn get_government(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Government>> {
    let government = state
        .governments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Government {} not found", id)))?;
    Ok(Json(government))
}

pub async fn create_government(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<GovernmentInput>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Government>>)> {
    require_manage_plans(&claims)?;
    validate(&input)?;
    let government = state.governments.create(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Government created", government)),
    ))
}

pub async fn update_government(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(input): Json<GovernmentInput>,
) -> ApiResult<Json<SuccessResponse<Government>>> {
    require_manage_plans(&claims)?;
    validate(&input)?;
    let government = state.governments.update(id, &input).await?;
    Ok(Json(SuccessResponse::with_data("Government updated", government)))
}

pub async fn delete_government(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    require_manage_plans(&claims)?;
    state.governments.delete(id).await?;
    Ok(Json(MessageResponse::new("Government deleted")))
}

// ============================================
// Sections
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct SectionListQuery {
    pub government: Option<i32>,
}

pub async fn list_sections(
    State(state): State<SharedState>,
    Query(query): Query<SectionListQuery>,
) -> ApiResult<Json<Vec<GovernmentPlanSection>>> {
    Ok(Json(state.sections.list(query.government, false).await?))
}

pub async fn get_section(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<GovernmentPlanSection>> {
    let section = state
        .sections
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Section {} not found", id)))?;
    Ok(Json(section))
}

pub async fn create_section(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<SectionInput>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<GovernmentPlanSection>>)> {
    require_manage_plans(&claims)?;
    validate(&input)?;
    let section = state.sections.create(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Section created", section)),
    ))
}

pub async fn update_section(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(input): Json<SectionInput>,
) -> ApiResult<Json<SuccessResponse<GovernmentPlanSection>>> {
    require_manage_plans(&claims)?;
    validate(&input)?;
    let section = state.sections.update(id, &input).await?;
    Ok(Json(SuccessResponse::with_data("Section updated", section)))
}

pub async fn delete_section(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    require_manage_plans(&claims)?;
    state.sections.delete(id).await?;
    Ok(Json(MessageResponse::new("Section deleted")))
}

// ============================================
// Plans
// ============================================

pub async fn list_plans(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PlanListQuery>,
) -> ApiResult<Json<Page<GovernmentPlan>>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    let filter = PlanFilter {
        government_id: query.government,
        status: query.status,
        rating: query.rating,
        public: query.public,
        property: query.properties.as_deref().and_then(PropertyFilter::parse),
        search: query
            .q
            .as_deref()
            .and_then(|q| PlanSearch::new(q, &state.search_language)),
        ..Default::default()
    };
    let limit = page_size(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let (count, results) = state.plans.list(&scope, &filter, Some(limit), offset).await?;
    let (next, previous) = page_links(&state.links, &uri, count, limit, offset);
    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

pub async fn get_plan(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<GovernmentPlan>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    Ok(Json(allowed_plan(&state, &scope, id).await?))
}

pub async fn create_plan(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(mut input): Json<PlanInput>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<GovernmentPlan>>)> {
    validate(&input)?;
    check_group(&Viewer(Some(claims)).allowed_plans(), input.group_id)?;
    input.description = clean_rich_text(&input.description);

    let plan = state.plans.create(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Plan created", plan)),
    ))
}

pub async fn update_plan(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(mut input): Json<PlanInput>,
) -> ApiResult<Json<SuccessResponse<GovernmentPlan>>> {
    validate(&input)?;
    let scope = Viewer(Some(claims)).allowed_plans();
    allowed_plan(&state, &scope, id).await?;
    check_group(&scope, input.group_id)?;
    input.description = clean_rich_text(&input.description);

    let plan = state.plans.update(id, &input).await?;
    Ok(Json(SuccessResponse::with_data("Plan updated", plan)))
}

pub async fn delete_plan(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    allowed_plan(&state, &scope, id).await?;
    state.plans.delete(id).await?;
    Ok(Json(MessageResponse::new("Plan deleted")))
}

// ============================================
// Proposals
// ============================================

pub async fn list_proposals(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Proposals>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    let plan = allowed_plan(&state, &scope, id).await?;
    Ok(Json(Proposals::from_column(plan.proposals.as_ref())))
}

pub async fn accept_proposal(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((id, proposer_id)): Path<(i32, i32)>,
    Json(accept): Json<AcceptProposal>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<GovernmentPlanUpdate>>)> {
    let scope = Viewer(Some(claims)).allowed_plans();
    allowed_plan(&state, &scope, id).await?;

    let update = state
        .updates
        .accept_proposal(id, proposer_id, accept.public)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Proposal accepted", update)),
    ))
}

pub async fn reject_proposal(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((id, proposer_id)): Path<(i32, i32)>,
) -> ApiResult<Json<MessageResponse>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    allowed_plan(&state, &scope, id).await?;
    state.updates.reject_proposal(id, proposer_id).await?;
    Ok(Json(MessageResponse::new("Proposal rejected")))
}

// ============================================
// Updates
// ============================================

pub async fn list_updates(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<UpdateListQuery>,
) -> ApiResult<Json<Page<UpdateWithPlan>>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    let filter = UpdateFilter {
        status: query.status,
        public: query.public,
        q: query.q,
        ..Default::default()
    };
    let limit = page_size(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let (count, results) = state
        .updates
        .list(&scope, true, &filter, Some(limit), offset)
        .await?;
    let (next, previous) = page_links(&state.links, &uri, count, limit, offset);
    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

pub async fn get_update(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<GovernmentPlanUpdate>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    let update = state
        .updates
        .get(id, &scope)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))?;
    Ok(Json(update))
}

pub async fn create_update(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(mut input): Json<UpdateInput>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<GovernmentPlanUpdate>>)> {
    validate(&input)?;
    let user_id = claims.sub;
    let scope = Viewer(Some(claims)).allowed_plans();
    allowed_plan(&state, &scope, input.plan_id).await?;
    input.content = clean_rich_text(&input.content);
    input.user_id = input.user_id.or(Some(user_id));

    let update = state.updates.create(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Update created", update)),
    ))
}

pub async fn update_update(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(mut input): Json<UpdateInput>,
) -> ApiResult<Json<SuccessResponse<GovernmentPlanUpdate>>> {
    validate(&input)?;
    let scope = Viewer(Some(claims)).allowed_plans();
    state
        .updates
        .get(id, &scope)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))?;
    allowed_plan(&state, &scope, input.plan_id).await?;
    input.content = clean_rich_text(&input.content);

    let update = state.updates.update(id, &input).await?;
    Ok(Json(SuccessResponse::with_data("Update saved", update)))
}

pub async fn delete_update(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MessageResponse>> {
    let scope = Viewer(Some(claims)).allowed_plans();
    state
        .updates
        .get(id, &scope)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))?;
    state.updates.delete(id).await?;
    Ok(Json(MessageResponse::new("Update deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_group() {
        assert!(check_group(&PlanScope::All, None).is_ok());
        assert!(check_group(&PlanScope::Groups(vec![2]), Some(2)).is_ok());
        assert!(matches!(
            check_group(&PlanScope::Groups(vec![2]), Some(3)),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_group(&PlanScope::Groups(vec![2]), None).is_err());
    }
}
