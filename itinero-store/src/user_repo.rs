use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use itinero_core::account::{ProfileUpdate, User};
use itinero_core::error::RepositoryError;
use itinero_core::repository::UserRepository;

use crate::map_sqlx_err;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    full_name: String,
    phone: Option<String>,
    password_hash: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, full_name, phone, password_hash, created_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, full_name, phone, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_err(e) {
            RepositoryError::Duplicate(_) => RepositoryError::Duplicate("username"),
            other => other,
        })?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(row.map(User::from))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET email = $1, full_name = $2, phone = $3 \
             WHERE id = $4 RETURNING {USER_COLUMNS}"
        ))
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(&update.phone)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }
}
