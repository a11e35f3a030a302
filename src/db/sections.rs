use crate::auth::PlanScope;
use crate::db::lookups::set_categories;
use crate::db::queries::{SqlBuilder, GOVERNMENT_COLUMNS, PLAN_COLUMNS, PLAN_FROM, SECTION_COLUMNS};
use crate::db::unique_slug;
use crate::error::AppError;
use crate::models::{Government, GovernmentPlan, GovernmentPlanSection, SectionInput};
use deadpool_postgres::Pool;
use tokio_postgres::{GenericClient, Row};
use tracing::info;

impl From<&Row> for GovernmentPlanSection {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            government_id: row.get("government_id"),
            title: row.get("title"),
            slug: row.get("slug"),
            category_ids: row.get("category_ids"),
            description: row.get("description"),
            icon: row.get("icon"),
            order: row.get("sort_order"),
            featured: row.get("featured"),
        }
    }
}

pub struct SectionService {
    pool: Pool,
}

impl SectionService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Sections in display order, optionally of one government
    pub async fn list(
        &self,
        government_id: Option<i32>,
        public_governments_only: bool,
    ) -> Result<Vec<GovernmentPlanSection>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM government_plan_sections s
             JOIN governments g ON g.id = s.government_id
             WHERE ($1::int4 IS NULL OR s.government_id = $1)
               AND ($2 = false OR g.public)
             ORDER BY s.sort_order, s.title",
            SECTION_COLUMNS
        );
        let rows = client
            .query(&sql, &[&government_id, &public_governments_only])
            .await?;
        Ok(rows.iter().map(GovernmentPlanSection::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<GovernmentPlanSection>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM government_plan_sections s WHERE s.id = $1",
            SECTION_COLUMNS
        );
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(GovernmentPlanSection::from))
    }

    /// Section page lookup by government and section slug
    pub async fn get_by_slugs(
        &self,
        government_slug: &str,
        section_slug: &str,
    ) -> Result<Option<(Government, GovernmentPlanSection)>, AppError> {
        let client = self.pool.get().await?;
        let government_sql = format!(
            "SELECT {} FROM governments g WHERE g.slug = $1",
            GOVERNMENT_COLUMNS
        );
        let Some(government_row) = client.query_opt(&government_sql, &[&government_slug]).await?
        else {
            return Ok(None);
        };
        let government = Government::from(&government_row);

        let sql = format!(
            "SELECT {} FROM government_plan_sections s
             WHERE s.government_id = $1 AND s.slug = $2",
            SECTION_COLUMNS
        );
        let row = client.query_opt(&sql, &[&government.id, &section_slug]).await?;
        Ok(row.map(|r| (government, GovernmentPlanSection::from(&r))))
    }

    /// Plans of the section's government in any of its categories, by title
    pub async fn plans(
        &self,
        section: &GovernmentPlanSection,
        scope: &PlanScope,
    ) -> Result<Vec<GovernmentPlan>, AppError> {
        if section.category_ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let mut builder = SqlBuilder::new();
        builder.scope(scope);
        let g = builder.bind(section.government_id);
        builder.filter(format!("p.government_id = {}", g));
        let c = builder.bind(section.category_ids.clone());
        builder.filter(format!(
            "EXISTS (SELECT 1 FROM government_plan_categories pc \
             WHERE pc.plan_id = p.id AND pc.category_id = ANY({}))",
            c
        ));

        let sql = format!(
            "SELECT {} {}{} ORDER BY p.title, p.id",
            PLAN_COLUMNS,
            PLAN_FROM,
            builder.where_clause()
        );
        let rows = client.query(&sql, &builder.params()).await?;
        Ok(rows.iter().map(GovernmentPlan::from).collect())
    }

    pub async fn create(&self, input: &SectionInput) -> Result<GovernmentPlanSection, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let slug = if input.slug.is_empty() {
            unique_slug(&*tx, "government_plan_sections", &input.title).await?
        } else {
            input.slug.clone()
        };
        let row = tx
            .query_one(
                "INSERT INTO government_plan_sections
                     (government_id, title, slug, description, icon, sort_order, featured)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id",
                &[
                    &input.government_id,
                    &input.title,
                    &slug,
                    &input.description,
                    &input.icon,
                    &input.order,
                    &input.featured,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Section"))?;
        let id: i32 = row.get(0);

        set_categories(
            &*tx,
            "government_plan_section_categories",
            "section_id",
            id,
            &input.category_ids,
        )
        .await
        .map_err(|e| AppError::from_write(e, "Section"))?;
        let section = fetch_section(&*tx, id).await?;
        tx.commit().await?;

        info!(id, slug = %section.slug, "Section created");
        Ok(section)
    }

    pub async fn update(
        &self,
        id: i32,
        input: &SectionInput,
    ) -> Result<GovernmentPlanSection, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let updated = tx
            .execute(
                "UPDATE government_plan_sections SET government_id = $2, title = $3,
                     slug = COALESCE(NULLIF($4, ''), slug), description = $5, icon = $6,
                     sort_order = $7, featured = $8
                 WHERE id = $1",
                &[
                    &id,
                    &input.government_id,
                    &input.title,
                    &input.slug,
                    &input.description,
                    &input.icon,
                    &input.order,
                    &input.featured,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Section"))?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("Section {} not found", id)));
        }

        set_categories(
            &*tx,
            "government_plan_section_categories",
            "section_id",
            id,
            &input.category_ids,
        )
        .await
        .map_err(|e| AppError::from_write(e, "Section"))?;
        let section = fetch_section(&*tx, id).await?;
        tx.commit().await?;
        Ok(section)
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM government_plan_sections WHERE id = $1", &[&id])
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("Section {} not found", id)));
        }
        info!(id, "Section deleted");
        Ok(())
    }
}

async fn fetch_section<C: GenericClient>(
    client: &C,
    id: i32,
) -> Result<GovernmentPlanSection, AppError> {
    let sql = format!(
        "SELECT {} FROM government_plan_sections s WHERE s.id = $1",
        SECTION_COLUMNS
    );
    let row = client
        .query_opt(&sql, &[&id])
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Section {} not found", id)))?;
    Ok(GovernmentPlanSection::from(&row))
}
