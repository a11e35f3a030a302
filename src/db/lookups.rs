//! Categories, public bodies and editor groups

use crate::db::unique_slug;
use crate::error::AppError;
use crate::models::{Category, PublicBody};
use deadpool_postgres::Pool;
use tokio_postgres::{GenericClient, Row};
use tracing::info;

impl From<&Row> for Category {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
        }
    }
}

impl From<&Row> for PublicBody {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            jurisdiction_id: row.get("jurisdiction_id"),
        }
    }
}

pub struct LookupService {
    pool: Pool,
}

impl LookupService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn public_body(&self, id: i32) -> Result<Option<PublicBody>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, slug, jurisdiction_id FROM public_bodies WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(PublicBody::from))
    }

    pub async fn categories(&self, ids: &[i32]) -> Result<Vec<Category>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, name, slug FROM categories WHERE id = ANY($1) ORDER BY name",
                &[&ids],
            )
            .await?;
        Ok(rows.iter().map(Category::from).collect())
    }
}

/// Id of the public body with exactly this name
pub async fn public_body_id_by_name<C: GenericClient>(
    client: &C,
    name: &str,
) -> Result<Option<i32>, tokio_postgres::Error> {
    let row = client
        .query_opt(
            "SELECT id FROM public_bodies WHERE name = $1 ORDER BY id LIMIT 1",
            &[&name],
        )
        .await?;
    Ok(row.map(|r| r.get(0)))
}

pub async fn find_or_create_category<C: GenericClient>(
    client: &C,
    name: &str,
) -> Result<i32, tokio_postgres::Error> {
    if let Some(row) = client
        .query_opt("SELECT id FROM categories WHERE name = $1", &[&name])
        .await?
    {
        return Ok(row.get(0));
    }
    let slug = unique_slug(client, "categories", name).await?;
    let row = client
        .query_one(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id",
            &[&name, &slug],
        )
        .await?;
    info!(name, "Category created");
    Ok(row.get(0))
}

pub async fn find_or_create_group<C: GenericClient>(
    client: &C,
    name: &str,
) -> Result<i32, tokio_postgres::Error> {
    let row = client
        .query_one(
            "INSERT INTO user_groups (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
            &[&name],
        )
        .await?;
    Ok(row.get(0))
}

/// Replace the category set of a plan or section
pub async fn set_categories<C: GenericClient>(
    client: &C,
    link_table: &str,
    owner_column: &str,
    owner_id: i32,
    category_ids: &[i32],
) -> Result<(), tokio_postgres::Error> {
    client
        .execute(
            &format!("DELETE FROM {} WHERE {} = $1", link_table, owner_column),
            &[&owner_id],
        )
        .await?;
    if category_ids.is_empty() {
        return Ok(());
    }
    client
        .execute(
            &format!(
                "INSERT INTO {} ({}, category_id)
                 SELECT $1, c FROM unnest($2::int4[]) AS c
                 ON CONFLICT DO NOTHING",
                link_table, owner_column
            ),
            &[&owner_id, &category_ids],
        )
        .await?;
    Ok(())
}
