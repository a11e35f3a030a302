use crate::db::queries::GOVERNMENT_COLUMNS;
use crate::db::unique_slug;
use crate::error::AppError;
use crate::models::{Government, GovernmentInput};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::info;

impl From<&Row> for Government {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            public: row.get("public"),
            jurisdiction_id: row.get("jurisdiction_id"),
            description: row.get("description"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            active: row.get("active"),
            planning_document: row.get("planning_document"),
        }
    }
}

pub struct GovernmentService {
    pool: Pool,
}

impl GovernmentService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// All governments, or only public ones
    pub async fn list(&self, public_only: bool) -> Result<Vec<Government>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM governments g WHERE ($1 = false OR g.public) ORDER BY g.start_date DESC NULLS LAST, g.name",
            GOVERNMENT_COLUMNS
        );
        let rows = client.query(&sql, &[&public_only]).await?;
        Ok(rows.iter().map(Government::from).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Government>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM governments g WHERE g.id = $1", GOVERNMENT_COLUMNS);
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(Government::from))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Government>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM governments g WHERE g.slug = $1", GOVERNMENT_COLUMNS);
        let row = client.query_opt(&sql, &[&slug]).await?;
        Ok(row.as_ref().map(Government::from))
    }

    pub async fn create(&self, input: &GovernmentInput) -> Result<Government, AppError> {
        let client = self.pool.get().await?;
        let slug = if input.slug.is_empty() {
            unique_slug(&**client, "governments", &input.name).await?
        } else {
            input.slug.clone()
        };

        let sql = format!(
            "INSERT INTO governments AS g (name, slug, public, jurisdiction_id, description,
                 start_date, end_date, active, planning_document)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            GOVERNMENT_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &input.name,
                    &slug,
                    &input.public,
                    &input.jurisdiction_id,
                    &input.description,
                    &input.start_date,
                    &input.end_date,
                    &input.active,
                    &input.planning_document,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Government"))?;

        let government = Government::from(&row);
        info!(id = government.id, slug = %government.slug, "Government created");
        Ok(government)
    }

    pub async fn update(&self, id: i32, input: &GovernmentInput) -> Result<Government, AppError> {
        let client = self.pool.get().await?;
        // blank slug keeps the current one
        let sql = format!(
            "UPDATE governments AS g SET name = $2, slug = COALESCE(NULLIF($3, ''), g.slug), public = $4, jurisdiction_id = $5,
                 description = $6, start_date = $7, end_date = $8, active = $9,
                 planning_document = $10
             WHERE g.id = $1
             RETURNING {}",
            GOVERNMENT_COLUMNS
        );
        let row = client
            .query_opt(
                &sql,
                &[
                    &id,
                    &input.name,
                    &input.slug,
                    &input.public,
                    &input.jurisdiction_id,
                    &input.description,
                    &input.start_date,
                    &input.end_date,
                    &input.active,
                    &input.planning_document,
                ],
            )
            .await
            .map_err(|e| AppError::from_write(e, "Government"))?
            .ok_or_else(|| AppError::NotFound(format!("Government {} not found", id)))?;

        Ok(Government::from(&row))
    }

    /// Deletes the government together with its plans, updates and sections
    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM governments WHERE id = $1", &[&id])
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound(format!("Government {} not found", id)));
        }
        info!(id, "Government deleted");
        Ok(())
    }
}
