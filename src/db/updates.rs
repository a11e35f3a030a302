//! Plan updates and the status/rating recomputation they drive
//!
//! Every write to an update runs in one transaction with
//! [`update_from_updates`] for the affected plan, so a plan's status and
//! rating never lag behind its public updates.

use crate::auth::PlanScope;
use crate::db::plans::fetch_plan;
use crate::db::queries::{limit_clause, SqlBuilder, UPDATE_COLUMNS, UPDATE_FROM};
use crate::error::AppError;
use crate::models::{
    GovernmentPlanUpdate, PlanRating, PlanStatus, ProposalEntry, Proposals, UpdateInput,
};
use crate::sanitize::clean_rich_text;
use chrono::Utc;
use deadpool_postgres::Pool;
use serde::Serialize;
use tokio_postgres::{GenericClient, Row};
use tracing::{debug, info};

impl From<&Row> for GovernmentPlanUpdate {
    fn from(row: &Row) -> Self {
        let status: String = row.get("status");
        let rating: Option<i32> = row.get("rating");
        Self {
            id: row.get("id"),
            plan_id: row.get("plan_id"),
            user_id: row.get("user_id"),
            timestamp: row.get("timestamp"),
            title: row.get("title"),
            content: row.get("content"),
            url: row.get("url"),
            status: PlanStatus::from_column(&status),
            rating: rating.and_then(|r| PlanRating::try_from(r).ok()),
            public: row.get("public"),
            foirequest_id: row.get("foirequest_id"),
        }
    }
}

/// An update with what is needed to link to its plan
#[derive(Debug, Clone, Serialize)]
pub struct UpdateWithPlan {
    #[serde(flatten)]
    pub update: GovernmentPlanUpdate,
    pub plan_title: String,
    pub plan_slug: String,
    pub government_slug: String,
}

impl From<&Row> for UpdateWithPlan {
    fn from(row: &Row) -> Self {
        Self {
            update: GovernmentPlanUpdate::from(row),
            plan_title: row.get("plan_title"),
            plan_slug: row.get("plan_slug"),
            government_slug: row.get("government_slug"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    pub plan_id: Option<i32>,
    pub government_id: Option<i32>,
    pub status: Option<PlanStatus>,
    pub public: Option<bool>,
    /// Substring of the update title or the plan title
    pub q: Option<String>,
    /// Updates of plans in any of these categories
    pub category_ids: Vec<i32>,
}

impl UpdateFilter {
    fn build(&self, scope: &PlanScope, include_hidden: bool) -> SqlBuilder {
        let mut builder = SqlBuilder::new();
        builder.scope(scope);
        if !include_hidden {
            builder.filter("u.public");
        }
        if let Some(plan_id) = self.plan_id {
            let p = builder.bind(plan_id);
            builder.filter(format!("u.plan_id = {}", p));
        }
        if let Some(government_id) = self.government_id {
            let p = builder.bind(government_id);
            builder.filter(format!("p.government_id = {}", p));
        }
        if let Some(status) = self.status {
            let p = builder.bind(status.as_str().to_string());
            builder.filter(format!("u.status = {}", p));
        }
        if let Some(public) = self.public {
            let p = builder.bind(public);
            builder.filter(format!("u.public = {}", p));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let p = builder.bind(like_pattern(q));
            builder.filter(format!("(u.title ILIKE {p} OR p.title ILIKE {p})", p = p));
        }
        if !self.category_ids.is_empty() {
            let p = builder.bind(self.category_ids.clone());
            builder.filter(format!(
                "EXISTS (SELECT 1 FROM government_plan_categories pc \
                 WHERE pc.plan_id = p.id AND pc.category_id = ANY({}))",
                p
            ));
        }
        builder
    }
}

fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct UpdateService {
    pool: Pool,
}

impl UpdateService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Newest first. Non-public updates only when `include_hidden`.
    pub async fn list(
        &self,
        scope: &PlanScope,
        include_hidden: bool,
        filter: &UpdateFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<(i64, Vec<UpdateWithPlan>), AppError> {
        let client = self.pool.get().await?;
        let builder = filter.build(scope, include_hidden);
        let where_clause = builder.where_clause();
        let params = builder.params();

        let count_sql = format!("SELECT COUNT(*) {}{}", UPDATE_FROM, where_clause);
        let count: i64 = client.query_one(&count_sql, &params).await?.get(0);

        let sql = format!(
            "SELECT {}, p.title AS plan_title, p.slug AS plan_slug, g.slug AS government_slug
             {}{} ORDER BY u.timestamp DESC, u.id DESC{}",
            UPDATE_COLUMNS,
            UPDATE_FROM,
            where_clause,
            limit_clause(limit, offset)
        );
        let rows = client.query(&sql, &params).await?;
        Ok((count, rows.iter().map(UpdateWithPlan::from).collect()))
    }

    /// Updates of several plans, newest first
    pub async fn for_plans(
        &self,
        plan_ids: &[i32],
        include_hidden: bool,
    ) -> Result<Vec<GovernmentPlanUpdate>, AppError> {
        if plan_ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM government_plan_updates u
             WHERE u.plan_id = ANY($1) AND ($2 OR u.public)
             ORDER BY u.timestamp DESC, u.id DESC",
            UPDATE_COLUMNS
        );
        let rows = client.query(&sql, &[&plan_ids, &include_hidden]).await?;
        Ok(rows.iter().map(GovernmentPlanUpdate::from).collect())
    }

    /// One update whose plan is in scope
    pub async fn get(
        &self,
        id: i32,
        scope: &PlanScope,
    ) -> Result<Option<GovernmentPlanUpdate>, AppError> {
        let client = self.pool.get().await?;
        let mut builder = SqlBuilder::new();
        builder.scope(scope);
        let p = builder.bind(id);
        builder.filter(format!("u.id = {}", p));

        let sql = format!("SELECT {} {}{}", UPDATE_COLUMNS, UPDATE_FROM, builder.where_clause());
        let row = client.query_opt(&sql, &builder.params()).await?;
        Ok(row.as_ref().map(GovernmentPlanUpdate::from))
    }

    pub async fn create(&self, input: &UpdateInput) -> Result<GovernmentPlanUpdate, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let update = insert_update(&*tx, input).await?;
        update_from_updates(&*tx, update.plan_id).await?;
        tx.commit().await?;

        info!(id = update.id, plan_id = update.plan_id, "Plan update created");
        Ok(update)
    }

    pub async fn update(
        &self,
        id: i32,
        input: &UpdateInput,
    ) -> Result<GovernmentPlanUpdate, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let previous_plan: i32 = tx
            .query_opt(
                "SELECT plan_id FROM government_plan_updates WHERE id = $1 FOR UPDATE",
                &[&id],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))?
            .get(0);

        let sql = format!(
            "UPDATE government_plan_updates AS u SET plan_id = $2, user_id = $3,
                 timestamp = COALESCE($4, u.timestamp), title = $5, content = $6, url = $7,
                 status = $8, rating = $9, public = $10, foirequest_id = $11
             WHERE u.id = $1
             RETURNING {}",
            UPDATE_COLUMNS
        );
        let row = tx
            .query_one(
                &sql,
                &[
                    &id,
                    &input.plan_id,
                    &input.user_id,
                    &input.timestamp,
                    &input.title,
                    &input.content,
                    &input.url,
                    &status_column(input.status),
                    &input.rating.map(i32::from),
                    &input.public,
                    &input.foirequest_id,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Update"))?;
        let update = GovernmentPlanUpdate::from(&row);

        update_from_updates(&*tx, update.plan_id).await?;
        if previous_plan != update.plan_id {
            update_from_updates(&*tx, previous_plan).await?;
        }
        tx.commit().await?;
        Ok(update)
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let plan_id: i32 = tx
            .query_opt(
                "DELETE FROM government_plan_updates WHERE id = $1 RETURNING plan_id",
                &[&id],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Update {} not found", id)))?
            .get(0);
        update_from_updates(&*tx, plan_id).await?;
        tx.commit().await?;

        info!(id, plan_id, "Plan update deleted");
        Ok(())
    }

    /// Turn a user's pending proposal into an update and drop the proposal
    pub async fn accept_proposal(
        &self,
        plan_id: i32,
        proposer_id: i32,
        public: bool,
    ) -> Result<GovernmentPlanUpdate, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let mut proposals = locked_proposals(&*tx, plan_id).await?;
        let stored = match proposals.take(proposer_id) {
            Some(ProposalEntry::Stored(stored)) => stored,
            Some(ProposalEntry::Unreadable(_)) => {
                return Err(AppError::Validation(format!(
                    "Proposal from user {} on plan {} cannot be read; reject it instead",
                    proposer_id, plan_id
                )))
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "No proposal from user {} on plan {}",
                    proposer_id, plan_id
                )))
            }
        };

        let input = UpdateInput {
            plan_id,
            user_id: Some(proposer_id),
            timestamp: Some(Utc::now()),
            title: stored.data.title,
            content: clean_rich_text(&stored.data.content),
            url: stored.data.url,
            status: stored.data.status,
            rating: stored.data.rating,
            public,
            foirequest_id: None,
        };
        let update = insert_update(&*tx, &input).await?;
        store_proposals(&*tx, plan_id, &proposals).await?;
        update_from_updates(&*tx, plan_id).await?;
        tx.commit().await?;

        info!(plan_id, proposer_id, update_id = update.id, "Proposal accepted");
        Ok(update)
    }

    pub async fn reject_proposal(&self, plan_id: i32, proposer_id: i32) -> Result<(), AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let mut proposals = locked_proposals(&*tx, plan_id).await?;
        if proposals.take(proposer_id).is_none() {
            return Err(AppError::NotFound(format!(
                "No proposal from user {} on plan {}",
                proposer_id, plan_id
            )));
        }
        store_proposals(&*tx, plan_id, &proposals).await?;
        tx.commit().await?;

        info!(plan_id, proposer_id, "Proposal rejected");
        Ok(())
    }
}

fn status_column(status: Option<PlanStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("")
}

async fn insert_update<C: GenericClient>(
    client: &C,
    input: &UpdateInput,
) -> Result<GovernmentPlanUpdate, AppError> {
    let sql = format!(
        "INSERT INTO government_plan_updates AS u (plan_id, user_id, timestamp, title, content,
             url, status, rating, public, foirequest_id)
         VALUES ($1, $2, COALESCE($3, CURRENT_TIMESTAMP), $4, $5, $6, $7, $8, $9, $10)
         RETURNING {}",
        UPDATE_COLUMNS
    );
    let row = client
        .query_one(
            &sql,
            &[
                &input.plan_id,
                &input.user_id,
                &input.timestamp,
                &input.title,
                &input.content,
                &input.url,
                &status_column(input.status),
                &input.rating.map(i32::from),
                &input.public,
                &input.foirequest_id,
            ],
        )
        .await
        .map_err(|e| AppError::from_write(e, "Update"))?;
    Ok(GovernmentPlanUpdate::from(&row))
}

async fn locked_proposals<C: GenericClient>(client: &C, plan_id: i32) -> Result<Proposals, AppError> {
    let row = client
        .query_opt(
            "SELECT proposals FROM government_plans WHERE id = $1 FOR UPDATE",
            &[&plan_id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))?;
    let raw: Option<serde_json::Value> = row.get(0);
    Ok(Proposals::from_column(raw.as_ref()))
}

async fn store_proposals<C: GenericClient>(
    client: &C,
    plan_id: i32,
    proposals: &Proposals,
) -> Result<(), AppError> {
    client
        .execute(
            "UPDATE government_plans SET proposals = $2 WHERE id = $1",
            &[&plan_id, &proposals.to_column()],
        )
        .await?;
    Ok(())
}

/// Copy the latest public status and rating onto the plan.
///
/// Writes only when at least one public update carries either value;
/// returns whether it did.
pub async fn update_from_updates<C: GenericClient>(
    client: &C,
    plan_id: i32,
) -> Result<bool, AppError> {
    let mut plan = fetch_plan(client, plan_id).await?;
    let sql = format!(
        "SELECT {} FROM government_plan_updates u WHERE u.plan_id = $1",
        UPDATE_COLUMNS
    );
    let updates: Vec<GovernmentPlanUpdate> = client
        .query(&sql, &[&plan_id])
        .await?
        .iter()
        .map(GovernmentPlanUpdate::from)
        .collect();

    if !plan.apply_updates(&updates) {
        return Ok(false);
    }
    client
        .execute(
            "UPDATE government_plans SET status = $2, rating = $3 WHERE id = $1",
            &[&plan_id, &plan.status.as_str(), &plan.rating.map(i32::from)],
        )
        .await?;
    debug!(plan_id, status = %plan.status, "Plan status recomputed from updates");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_anonymous_listing_only_public_updates() {
        let builder = UpdateFilter::default().build(&PlanScope::Public, false);
        assert_eq!(builder.where_clause(), " WHERE p.public AND g.public AND u.public");
    }

    #[test]
    fn test_admin_listing_filters() {
        let filter = UpdateFilter {
            status: Some(PlanStatus::Implemented),
            public: Some(false),
            q: Some(" Gesetz ".to_string()),
            ..Default::default()
        };
        let builder = filter.build(&PlanScope::All, true);
        assert_eq!(
            builder.where_clause(),
            " WHERE u.status = $1 AND u.public = $2 AND (u.title ILIKE $3 OR p.title ILIKE $3)"
        );
        assert_eq!(builder.param_count(), 3);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%_sicher"), "%100\\%\\_sicher%");
    }

    #[test]
    fn test_status_column() {
        assert_eq!(status_column(None), "");
        assert_eq!(status_column(Some(PlanStatus::Started)), "started");
    }
}
