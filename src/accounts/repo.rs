use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::accounts::repo_types::{NewUser, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for the account directory.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user and return its store-assigned id.
    async fn insert(&self, user: NewUser) -> StoreResult<i64>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    /// Move `last_seen` forward to `at`; never moves it backwards.
    async fn touch_last_seen(&self, id: i64, at: OffsetDateTime) -> StoreResult<()>;
    /// Returns the number of rows matched. Unknown ids are ignored.
    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> StoreResult<u64>;
    /// Returns the number of rows removed. Unknown ids are ignored.
    async fn delete_many(&self, ids: &[i64]) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn backend(e: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, email, password_hash, last_seen, is_blocked)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.last_seen)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::DuplicateEmail
            }
            e => backend(e, "insert user"),
        })?;
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, last_seen, is_blocked
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by email"))?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, last_seen, is_blocked
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| backend(e, "find user by id"))?;
        Ok(user)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, last_seen, is_blocked
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| backend(e, "list users"))?;
        Ok(rows)
    }

    async fn touch_last_seen(&self, id: i64, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_seen = GREATEST(COALESCE(last_seen, $2), $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.db)
        .await
        .map_err(|e| backend(e, "update last_seen"))?;
        Ok(())
    }

    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> StoreResult<u64> {
        let result = sqlx::query(r#"UPDATE users SET is_blocked = $1 WHERE id = ANY($2)"#)
            .bind(blocked)
            .bind(ids)
            .execute(&self.db)
            .await
            .map_err(|e| backend(e, "update is_blocked"))?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, ids: &[i64]) -> StoreResult<u64> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = ANY($1)"#)
            .bind(ids)
            .execute(&self.db)
            .await
            .map_err(|e| backend(e, "delete users"))?;
        Ok(result.rows_affected())
    }
}

