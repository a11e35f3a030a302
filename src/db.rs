//! Database connection management
//!
//! Pool construction and the row services for every table the tracker owns.

pub mod governments;
pub mod lookups;
pub mod plans;
pub mod queries;
pub mod schema;
pub mod sections;
pub mod updates;
pub mod users;

pub use governments::GovernmentService;
pub use lookups::LookupService;
pub use plans::{PlanFilter, PlanService, PropertyFilter};
pub use sections::SectionService;
pub use updates::{UpdateFilter, UpdateService, UpdateWithPlan};
pub use users::UserService;

use crate::config::DatabaseConfig;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{GenericClient, NoTls};
use tracing::{debug, info};

/// Create the connection pool and check it can reach the server
pub async fn connect(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let pool = create_pool(config)?;

    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    drop(client);

    info!(
        host = %config.host,
        database = %config.database,
        tls = config.require_tls,
        "Database connection pool established"
    );
    Ok(pool)
}

fn create_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.max_pool_size));

    if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| AppError::Internal(format!("Failed to create TLS pool: {}", e)))
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Internal(format!("Failed to create pool: {}", e)))
    }
}

/// Slug derived from `text`, suffixed `-2`, `-3`, ... until unused in `table`
pub async fn unique_slug<C: GenericClient>(
    client: &C,
    table: &str,
    text: &str,
) -> Result<String, tokio_postgres::Error> {
    let base = base_slug(text);
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE slug = $1)", table);

    let mut candidate = base.clone();
    let mut suffix = 1;
    loop {
        let taken: bool = client.query_one(&sql, &[&candidate]).await?.get(0);
        if !taken {
            break;
        }
        suffix += 1;
        candidate = format!("{}-{}", base, suffix);
    }
    debug!(table, slug = %candidate, "Generated slug");
    Ok(candidate)
}

fn base_slug(text: &str) -> String {
    let slug: String = slug::slugify(text).chars().take(240).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_slug() {
        assert_eq!(base_slug("Bürgergeld einführen"), "burgergeld-einfuhren");
        assert_eq!(base_slug("???"), "item");
        assert!(base_slug(&"lang ".repeat(100)).len() <= 240);
    }
}
