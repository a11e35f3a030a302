use crate::db::lookups::find_or_create_group;
use crate::error::AppError;
use crate::models::User;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::info;

const USER_COLUMNS: &str = r#"
    us.id, us.email, us.password_hash, us.name, us.is_staff, us.can_manage_plans,
    ARRAY(
        SELECT m.group_id FROM user_group_members m
        WHERE m.user_id = us.id ORDER BY m.group_id
    ) AS group_ids
"#;

impl From<&Row> for User {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            name: row.get("name"),
            is_staff: row.get("is_staff"),
            can_manage_plans: row.get("can_manage_plans"),
            group_ids: row.get("group_ids"),
        }
    }
}

/// Account record to insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub is_staff: bool,
    pub can_manage_plans: bool,
    /// Group names, created when missing
    pub groups: Vec<String>,
}

pub struct UserService {
    pool: Pool,
}

impl UserService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM users us WHERE lower(us.email) = lower($1)",
            USER_COLUMNS
        );
        let row = client.query_opt(&sql, &[&email]).await?;
        Ok(row.as_ref().map(User::from))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM users us WHERE us.id = $1", USER_COLUMNS);
        let row = client.query_opt(&sql, &[&id]).await?;
        Ok(row.as_ref().map(User::from))
    }

    pub async fn create(&self, user: &NewUser) -> Result<User, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let id: i32 = tx
            .query_one(
                "INSERT INTO users (email, password_hash, name, is_staff, can_manage_plans)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id",
                &[
                    &user.email,
                    &user.password_hash,
                    &user.name,
                    &user.is_staff,
                    &user.can_manage_plans,
                ],
            )
            .await
            .map_err(|e| match e.code() {
                Some(code) if *code == tokio_postgres::error::SqlState::UNIQUE_VIOLATION => {
                    AppError::Conflict("Email already registered".to_string())
                }
                _ => AppError::Database(e),
            })?
            .get(0);

        for name in &user.groups {
            let group_id = find_or_create_group(&*tx, name).await?;
            tx.execute(
                "INSERT INTO user_group_members (group_id, user_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
                &[&group_id, &id],
            )
            .await?;
        }

        let sql = format!("SELECT {} FROM users us WHERE us.id = $1", USER_COLUMNS);
        let row = tx.query_one(&sql, &[&id]).await?;
        tx.commit().await?;

        info!(id, email = %user.email, "User created");
        Ok(User::from(&row))
    }
}
