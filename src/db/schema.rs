//! Idempotent schema creation
//!
//! Lookup tables (`jurisdictions`, `public_bodies`, `categories`, users and
//! groups) stand in for the host platform's tables and carry only the columns
//! the tracker reads.

use crate::error::AppError;
use crate::search::search_vector_sql;
use deadpool_postgres::Pool;
use tracing::info;

const TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS jurisdictions (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS public_bodies (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL,
    jurisdiction_id INTEGER REFERENCES jurisdictions(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) UNIQUE NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS user_groups (
    id SERIAL PRIMARY KEY,
    name VARCHAR(150) UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    email VARCHAR(255) UNIQUE NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    name VARCHAR(255),
    is_staff BOOLEAN NOT NULL DEFAULT false,
    can_manage_plans BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS user_group_members (
    group_id INTEGER NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    PRIMARY KEY (group_id, user_id)
);

CREATE TABLE IF NOT EXISTS governments (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL,
    public BOOLEAN NOT NULL DEFAULT false,
    jurisdiction_id INTEGER REFERENCES jurisdictions(id) ON DELETE SET NULL,
    description TEXT NOT NULL DEFAULT '',
    start_date DATE,
    end_date DATE,
    active BOOLEAN NOT NULL DEFAULT true,
    planning_document VARCHAR(1024) NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS government_plans (
    id SERIAL PRIMARY KEY,
    government_id INTEGER NOT NULL REFERENCES governments(id) ON DELETE CASCADE,
    title VARCHAR(255) NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    quote TEXT NOT NULL DEFAULT '',
    public BOOLEAN NOT NULL DEFAULT false,
    due_date DATE,
    measure VARCHAR(255) NOT NULL DEFAULT '',
    status VARCHAR(25) NOT NULL DEFAULT 'not_started',
    rating INTEGER CHECK (rating BETWEEN 1 AND 5),
    reference VARCHAR(255) NOT NULL DEFAULT '',
    responsible_publicbody_id INTEGER REFERENCES public_bodies(id) ON DELETE SET NULL,
    group_id INTEGER REFERENCES user_groups(id) ON DELETE SET NULL,
    proposals JSONB,
    properties JSONB NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS government_plan_categories (
    plan_id INTEGER NOT NULL REFERENCES government_plans(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (plan_id, category_id)
);

CREATE TABLE IF NOT EXISTS government_plan_updates (
    id SERIAL PRIMARY KEY,
    plan_id INTEGER NOT NULL REFERENCES government_plans(id) ON DELETE CASCADE,
    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    timestamp TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    title VARCHAR(1024) NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    url VARCHAR(1024) NOT NULL DEFAULT '',
    status VARCHAR(25) NOT NULL DEFAULT '',
    rating INTEGER CHECK (rating BETWEEN 1 AND 5),
    public BOOLEAN NOT NULL DEFAULT false,
    foirequest_id INTEGER
);

CREATE TABLE IF NOT EXISTS government_plan_sections (
    id SERIAL PRIMARY KEY,
    government_id INTEGER NOT NULL REFERENCES governments(id) ON DELETE CASCADE,
    title VARCHAR(255) NOT NULL,
    slug VARCHAR(255) UNIQUE NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    icon VARCHAR(50) NOT NULL DEFAULT '',
    sort_order INTEGER NOT NULL DEFAULT 0 CHECK (sort_order >= 0),
    featured TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS government_plan_section_categories (
    section_id INTEGER NOT NULL REFERENCES government_plan_sections(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    PRIMARY KEY (section_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_government_plans_government ON government_plans(government_id);
CREATE INDEX IF NOT EXISTS idx_government_plans_title ON government_plans(government_id, title);
CREATE INDEX IF NOT EXISTS idx_government_plan_updates_plan ON government_plan_updates(plan_id, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_government_plan_sections_government ON government_plan_sections(government_id, sort_order);
"#;

/// Full schema script for a text search configuration
pub fn schema_sql(search_language: &str) -> String {
    let vector = search_vector_sql(search_language).replace("p.", "");
    format!(
        "{}\nCREATE INDEX IF NOT EXISTS idx_government_plans_search ON government_plans USING GIN (({}));\n",
        TABLES, vector
    )
}

/// Create all tables and indexes that do not exist yet
pub async fn migrate(pool: &Pool, search_language: &str) -> Result<(), AppError> {
    let client = pool.get().await?;
    client.batch_execute(&schema_sql(search_language)).await?;
    info!("Database tables initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_index_matches_query_vector() {
        let sql = schema_sql("german");
        assert!(sql.contains(
            "USING GIN ((setweight(to_tsvector('german', coalesce(title, '')), 'A')"
        ));
        assert!(!sql.contains("p.title"));
    }

    #[test]
    fn test_every_table_is_idempotent() {
        let sql = schema_sql("german");
        assert_eq!(
            sql.matches("CREATE TABLE ").count(),
            sql.matches("CREATE TABLE IF NOT EXISTS").count()
        );
    }
}
