//! Plan queries, writes and proposals

use crate::auth::PlanScope;
use crate::db::lookups::set_categories;
use crate::db::queries::{
    limit_clause, SqlBuilder, GOVERNMENT_COLUMNS, PLAN_COLUMNS, PLAN_FROM, PLAN_ORDER,
    SECTION_COLUMNS,
};
use crate::db::unique_slug;
use crate::error::AppError;
use crate::models::{
    Government, GovernmentPlan, GovernmentPlanSection, PlanInput, PlanRating, PlanStatus,
    StoredProposal,
};
use crate::search::PlanSearch;
use deadpool_postgres::Pool;
use tokio_postgres::{GenericClient, Row};
use tracing::{debug, info};

impl From<&Row> for GovernmentPlan {
    fn from(row: &Row) -> Self {
        let status: String = row.get("status");
        let rating: Option<i32> = row.get("rating");
        Self {
            id: row.get("id"),
            government_id: row.get("government_id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
            quote: row.get("quote"),
            public: row.get("public"),
            due_date: row.get("due_date"),
            measure: row.get("measure"),
            status: PlanStatus::from_column(&status).unwrap_or(PlanStatus::NotStarted),
            rating: rating.and_then(|r| PlanRating::try_from(r).ok()),
            reference: row.get("reference"),
            category_ids: row.get("category_ids"),
            responsible_publicbody_id: row.get("responsible_publicbody_id"),
            group_id: row.get("group_id"),
            proposals: row.get("proposals"),
            properties: row.get("properties"),
        }
    }
}

/// `properties` filter of the REST API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyFilter {
    /// The key is present
    Has(String),
    /// The value under the key contains this string
    Contains(String, String),
}

impl PropertyFilter {
    /// `key` or `key:value`; blank input means no filter
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once(':') {
            Some((key, value)) => Some(Self::Contains(key.to_string(), value.to_string())),
            None => Some(Self::Has(raw.to_string())),
        }
    }
}

/// Filters for plan listings; every field is optional
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub government_id: Option<i32>,
    pub status: Option<PlanStatus>,
    pub rating: Option<PlanRating>,
    pub public: Option<bool>,
    pub property: Option<PropertyFilter>,
    /// Plans in any of these categories
    pub category_ids: Vec<i32>,
    /// Ranks results and orders by relevance
    pub search: Option<PlanSearch>,
}

impl PlanFilter {
    /// WHERE conditions and parameters, plus the rank expression when searching
    fn build(&self, scope: &PlanScope) -> (SqlBuilder, Option<String>) {
        let mut builder = SqlBuilder::new();
        builder.scope(scope);

        if let Some(government_id) = self.government_id {
            let p = builder.bind(government_id);
            builder.filter(format!("p.government_id = {}", p));
        }
        if let Some(status) = self.status {
            let p = builder.bind(status.as_str().to_string());
            builder.filter(format!("p.status = {}", p));
        }
        if let Some(rating) = self.rating {
            let p = builder.bind(i32::from(rating));
            builder.filter(format!("p.rating = {}", p));
        }
        if let Some(public) = self.public {
            let p = builder.bind(public);
            builder.filter(format!("p.public = {}", p));
        }
        match &self.property {
            Some(PropertyFilter::Has(key)) => {
                let k = builder.bind(key.clone());
                builder.filter(format!("p.properties ? {}", k));
            }
            Some(PropertyFilter::Contains(key, value)) => {
                let k = builder.bind(key.clone());
                let v = builder.bind(value.clone());
                builder.filter(format!("strpos(p.properties ->> {}, {}) > 0", k, v));
            }
            None => {}
        }
        if !self.category_ids.is_empty() {
            let p = builder.bind(self.category_ids.clone());
            builder.filter(format!(
                "EXISTS (SELECT 1 FROM government_plan_categories pc \
                 WHERE pc.plan_id = p.id AND pc.category_id = ANY({}))",
                p
            ));
        }

        let rank = self.search.as_ref().map(|search| search.apply(&mut builder));
        (builder, rank)
    }

    /// Relevance when searching, else reference and title
    fn order_clause(rank: Option<&str>) -> &'static str {
        match rank {
            Some(_) => "rank DESC, p.id",
            None => PLAN_ORDER,
        }
    }
}

pub struct PlanService {
    pool: Pool,
}

impl PlanService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Total matching plans and one page of them
    pub async fn list(
        &self,
        scope: &PlanScope,
        filter: &PlanFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<(i64, Vec<GovernmentPlan>), AppError> {
        let client = self.pool.get().await?;
        let (builder, rank) = filter.build(scope);
        let where_clause = builder.where_clause();
        let params = builder.params();

        let count_sql = format!("SELECT COUNT(*) {}{}", PLAN_FROM, where_clause);
        let count: i64 = client.query_one(&count_sql, &params).await?.get(0);

        let rank_column = rank
            .as_deref()
            .map(|r| format!(", {} AS rank", r))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {}{} {}{} ORDER BY {}{}",
            PLAN_COLUMNS,
            rank_column,
            PLAN_FROM,
            where_clause,
            PlanFilter::order_clause(rank.as_deref()),
            limit_clause(limit, offset)
        );
        debug!(sql = %sql, params = builder.param_count(), "Listing plans");
        let rows = client.query(&sql, &params).await?;
        Ok((count, rows.iter().map(GovernmentPlan::from).collect()))
    }

    /// One plan if the scope allows it
    pub async fn get(&self, id: i32, scope: &PlanScope) -> Result<Option<GovernmentPlan>, AppError> {
        let client = self.pool.get().await?;
        let mut builder = SqlBuilder::new();
        builder.scope(scope);
        let p = builder.bind(id);
        builder.filter(format!("p.id = {}", p));

        let sql = format!("SELECT {} {}{}", PLAN_COLUMNS, PLAN_FROM, builder.where_clause());
        let row = client.query_opt(&sql, &builder.params()).await?;
        Ok(row.as_ref().map(GovernmentPlan::from))
    }

    /// Plan page lookup: the government and the plan by their slugs
    pub async fn get_by_slugs(
        &self,
        government_slug: &str,
        plan_slug: &str,
        scope: &PlanScope,
    ) -> Result<Option<(Government, GovernmentPlan)>, AppError> {
        let client = self.pool.get().await?;
        let mut builder = SqlBuilder::new();
        builder.scope(scope);
        let g = builder.bind(government_slug.to_string());
        let p = builder.bind(plan_slug.to_string());
        builder.filter(format!("g.slug = {} AND p.slug = {}", g, p));

        let sql = format!("SELECT {} {}{}", PLAN_COLUMNS, PLAN_FROM, builder.where_clause());
        let Some(plan_row) = client.query_opt(&sql, &builder.params()).await? else {
            return Ok(None);
        };
        let plan = GovernmentPlan::from(&plan_row);

        let government_sql =
            format!("SELECT {} FROM governments g WHERE g.id = $1", GOVERNMENT_COLUMNS);
        let government_row = client
            .query_one(&government_sql, &[&plan.government_id])
            .await?;
        Ok(Some((Government::from(&government_row), plan)))
    }

    /// First section of the plan's government sharing one of its categories
    pub async fn section(
        &self,
        plan: &GovernmentPlan,
    ) -> Result<Option<GovernmentPlanSection>, AppError> {
        if plan.category_ids.is_empty() {
            return Ok(None);
        }
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM government_plan_sections s
             WHERE s.government_id = $1
               AND EXISTS (
                   SELECT 1 FROM government_plan_section_categories sc
                   WHERE sc.section_id = s.id AND sc.category_id = ANY($2)
               )
             ORDER BY s.sort_order, s.title
             LIMIT 1",
            SECTION_COLUMNS
        );
        let row = client
            .query_opt(&sql, &[&plan.government_id, &plan.category_ids])
            .await?;
        Ok(row.as_ref().map(GovernmentPlanSection::from))
    }

    pub async fn create(&self, input: &PlanInput) -> Result<GovernmentPlan, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let slug = if input.slug.is_empty() {
            unique_slug(&*tx, "government_plans", &input.title).await?
        } else {
            input.slug.clone()
        };
        let row = tx
            .query_one(
                "INSERT INTO government_plans (government_id, title, slug, description, quote,
                     public, due_date, measure, status, rating, reference,
                     responsible_publicbody_id, group_id, properties)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                 RETURNING id",
                &[
                    &input.government_id,
                    &input.title,
                    &slug,
                    &input.description,
                    &input.quote,
                    &input.public,
                    &input.due_date,
                    &input.measure,
                    &input.status.as_str(),
                    &input.rating.map(i32::from),
                    &input.reference,
                    &input.responsible_publicbody_id,
                    &input.group_id,
                    &input.properties,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Plan"))?;
        let id: i32 = row.get(0);

        set_categories(&*tx, "government_plan_categories", "plan_id", id, &input.category_ids)
            .await
            .map_err(|e| AppError::from_write(e, "Plan"))?;
        let plan = fetch_plan(&*tx, id).await?;
        tx.commit().await?;

        info!(id, slug = %plan.slug, "Plan created");
        Ok(plan)
    }

    pub async fn update(&self, id: i32, input: &PlanInput) -> Result<GovernmentPlan, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let updated = tx
            .execute(
                "UPDATE government_plans SET government_id = $2, title = $3,
                     slug = COALESCE(NULLIF($4, ''), slug), description = $5, quote = $6,
                     public = $7, due_date = $8, measure = $9, status = $10, rating = $11,
                     reference = $12, responsible_publicbody_id = $13, group_id = $14,
                     properties = $15
                 WHERE id = $1",
                &[
                    &id,
                    &input.government_id,
                    &input.title,
                    &input.slug,
                    &input.description,
                    &input.quote,
                    &input.public,
                    &input.due_date,
                    &input.measure,
                    &input.status.as_str(),
                    &input.rating.map(i32::from),
                    &input.reference,
                    &input.responsible_publicbody_id,
                    &input.group_id,
                    &input.properties,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Plan"))?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("Plan {} not found", id)));
        }

        set_categories(&*tx, "government_plan_categories", "plan_id", id, &input.category_ids)
            .await
            .map_err(|e| AppError::from_write(e, "Plan"))?;
        let plan = fetch_plan(&*tx, id).await?;
        tx.commit().await?;

        info!(id, "Plan updated");
        Ok(plan)
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM government_plans WHERE id = $1", &[&id])
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("Plan {} not found", id)));
        }
        info!(id, "Plan deleted");
        Ok(())
    }

    /// Park a user's proposal on the plan in one statement, so a concurrent
    /// accept or another proposal is never overwritten
    pub async fn add_proposal(
        &self,
        plan_id: i32,
        user_id: i32,
        proposal: &StoredProposal,
    ) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let value = serde_json::to_value(proposal)
            .map_err(|e| AppError::Internal(format!("Cannot store proposal: {}", e)))?;
        let updated = client
            .execute(ADD_PROPOSAL, &[&plan_id, &user_id.to_string(), &value])
            .await?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("Plan {} not found", plan_id)));
        }
        Ok(())
    }
}

const ADD_PROPOSAL: &str = "UPDATE government_plans \
    SET proposals = COALESCE(proposals, '{}'::jsonb) || jsonb_build_object($2::text, $3::jsonb) \
    WHERE id = $1";

/// Plan by id without any visibility restriction
pub async fn fetch_plan<C: GenericClient>(client: &C, id: i32) -> Result<GovernmentPlan, AppError> {
    let sql = format!("SELECT {} {} WHERE p.id = $1", PLAN_COLUMNS, PLAN_FROM);
    let row = client
        .query_opt(&sql, &[&id])
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", id)))?;
    Ok(GovernmentPlan::from(&row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_property_filter_parse() {
        assert_eq!(PropertyFilter::parse(""), None);
        assert_eq!(
            PropertyFilter::parse("haushalt"),
            Some(PropertyFilter::Has("haushalt".to_string()))
        );
        assert_eq!(
            PropertyFilter::parse("ressort:BMF"),
            Some(PropertyFilter::Contains("ressort".to_string(), "BMF".to_string()))
        );
    }

    #[test]
    fn test_public_scope_with_filters() {
        let filter = PlanFilter {
            government_id: Some(3),
            status: Some(PlanStatus::Started),
            property: PropertyFilter::parse("ressort:BMF"),
            ..Default::default()
        };
        let (builder, rank) = filter.build(&PlanScope::Public);

        assert_eq!(rank, None);
        assert_eq!(
            builder.where_clause(),
            " WHERE p.public AND g.public AND p.government_id = $1 AND p.status = $2 \
             AND strpos(p.properties ->> $3, $4) > 0"
        );
        assert_eq!(builder.param_count(), 4);
        assert_eq!(PlanFilter::order_clause(None), PLAN_ORDER);
    }

    #[test]
    fn test_search_orders_by_rank() {
        let filter = PlanFilter {
            search: PlanSearch::new("Wind", "german"),
            ..Default::default()
        };
        let (builder, rank) = filter.build(&PlanScope::All);

        let rank = rank.unwrap();
        assert!(builder.where_clause().contains(&format!("{} >= 0.1", rank)));
        assert_eq!(PlanFilter::order_clause(Some(&rank)), "rank DESC, p.id");
    }

    #[test]
    fn test_category_filter() {
        let filter = PlanFilter {
            category_ids: vec![4, 5],
            ..Default::default()
        };
        let (builder, _) = filter.build(&PlanScope::Groups(vec![1]));
        let sql = builder.where_clause();

        assert!(sql.starts_with(" WHERE p.group_id = ANY($1)"));
        assert!(sql.contains("pc.category_id = ANY($2)"));
    }

    #[test]
    fn test_add_proposal_merges_in_place() {
        // a read-modify-write would lose entries added or removed meanwhile
        assert!(!ADD_PROPOSAL.contains("SELECT"));
        assert!(ADD_PROPOSAL.contains("COALESCE(proposals, '{}'::jsonb) ||"));
        assert!(ADD_PROPOSAL.contains("jsonb_build_object($2::text, $3::jsonb)"));
        assert!(ADD_PROPOSAL.ends_with("WHERE id = $1"));
    }
}
