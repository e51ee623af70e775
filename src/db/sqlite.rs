use crate::db::bounded;
use crate::db::models::Credential;
use crate::error::StoreFailure;
use sqlx::{Pool, Sqlite};
use std::time::Duration;

pub type SqlitePool = Pool<Sqlite>;

/// Queries against the `users` table, borrowed for one operation.
#[derive(Clone, Copy)]
pub struct UsersStorage<'a> {
    pool: &'a SqlitePool,
    query_timeout: Duration,
}

impl<'a> UsersStorage<'a> {
    pub fn new(pool: &'a SqlitePool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn count(&self) -> Result<i64, StoreFailure> {
        bounded(
            self.query_timeout,
            sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(self.pool),
        )
        .await
    }

    /// Exact, case-sensitive lookup.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreFailure> {
        bounded(
            self.query_timeout,
            sqlx::query_as::<_, Credential>(
                "SELECT id, username, pass_hash FROM users WHERE username = ?",
            )
            .bind(username)
            .fetch_optional(self.pool),
        )
        .await
    }

    /// Insert a new account. A taken username surfaces as a unique violation.
    pub async fn insert(
        &self,
        username: &str,
        pass_hash: &str,
    ) -> Result<Credential, StoreFailure> {
        let result = bounded(
            self.query_timeout,
            sqlx::query("INSERT INTO users (username, pass_hash) VALUES (?, ?)")
                .bind(username)
                .bind(pass_hash)
                .execute(self.pool),
        )
        .await?;

        Ok(Credential {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            pass_hash: pass_hash.to_string(),
        })
    }

    /// Insert only while the table is empty, in one statement.
    /// Returns whether a row was written.
    pub async fn insert_if_empty(
        &self,
        username: &str,
        pass_hash: &str,
    ) -> Result<bool, StoreFailure> {
        let result = bounded(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO users (username, pass_hash)
                SELECT ?, ?
                WHERE NOT EXISTS (SELECT 1 FROM users)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(username)
            .bind(pass_hash)
            .execute(self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
