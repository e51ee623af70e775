//! SQL DDL for the tables this service manages, plus the bootstrapper that
//! creates them and repairs an incompatible `users` table.
//! SQLite-first design; can be adapted for other RDBMS.

use crate::db::bounded;
use crate::db::connection::ConnectionHandle;
use crate::db::models::ColumnInfo;
use crate::error::{RollcallError, StoreFailure};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const USERS_TABLE: &str = "users";
pub const STUDENTS_TABLE: &str = "students";

/// Columns the credential code reads; a `users` table without them is legacy.
pub const REQUIRED_USER_COLUMNS: [&str; 2] = ["username", "pass_hash"];

/// Student records. The shape has never changed, so no migration exists for it.
pub const CREATE_STUDENTS: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(100) NOT NULL,
    course VARCHAR(100) NOT NULL,
    semester INTEGER NOT NULL
)
"#;

/// Canonical credential table:
/// - `username` UNIQUE is the arbiter of at-most-one account per name
/// - `pass_hash` holds the 64 hex chars of a SHA-256 digest, never the password
pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username VARCHAR(50) UNIQUE,
    pass_hash CHAR(64) NOT NULL CHECK (length(pass_hash) = 64)
)
"#;

/// Backfills the uniqueness guarantee on a kept `users` table that predates it.
pub const CREATE_USERNAME_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_uq ON users(username)";

/// Shape of a table as it actually exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaState {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    /// Column lists of the table's UNIQUE indexes (constraints included).
    pub unique_keys: Vec<Vec<String>>,
}

impl SchemaState {
    /// SQLite reports no columns for a table that does not exist.
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// True when some unique index covers exactly `column`.
    pub fn is_unique(&self, column: &str) -> bool {
        self.unique_keys
            .iter()
            .any(|key| matches!(key.as_slice(), [only] if only.eq_ignore_ascii_case(column)))
    }

    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|col| !self.has_column(col))
            .copied()
            .collect()
    }

    pub fn is_compatible_users(&self) -> bool {
        self.exists() && self.missing_columns(&REQUIRED_USER_COLUMNS).is_empty()
    }
}

/// What `ensure_users_table` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsersTableOutcome {
    Created,
    AlreadyCanonical,
    /// Columns were fine but `username` lacked a unique index; one was added.
    UniqueIndexAdded,
    /// A legacy table was dropped; its rows are gone.
    Recreated { dropped_rows: i64 },
}

/// Makes sure `students` and `users` exist with the expected shape.
#[derive(Debug, Clone)]
pub struct SchemaBootstrapper {
    query_timeout: Duration,
}

impl SchemaBootstrapper {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// Ensure both tables, then confirm the `users` shape.
    pub async fn bootstrap(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<UsersTableOutcome, RollcallError> {
        self.ensure_students_table(handle).await?;
        let outcome = self.ensure_users_table(handle).await?;

        let state = self.introspect(handle, USERS_TABLE).await?;
        if !state.is_compatible_users() {
            return Err(RollcallError::Schema(format!(
                "users table still incompatible after bootstrap; missing columns: {}",
                state.missing_columns(&REQUIRED_USER_COLUMNS).join(", ")
            )));
        }
        if !state.is_unique("username") {
            return Err(RollcallError::Schema(
                "users.username has no unique index after bootstrap".to_string(),
            ));
        }
        Ok(outcome)
    }

    pub async fn ensure_students_table(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<(), RollcallError> {
        bounded(self.query_timeout, sqlx::query(CREATE_STUDENTS).execute(handle.pool()))
            .await
            .map_err(|e| RollcallError::Schema(format!("create students: {e}")))?;
        debug!("students table ensured");
        Ok(())
    }

    pub async fn ensure_users_table(
        &self,
        handle: &ConnectionHandle,
    ) -> Result<UsersTableOutcome, RollcallError> {
        let state = self.introspect(handle, USERS_TABLE).await?;

        if state.is_compatible_users() {
            if state.column("pass_hash").is_some_and(|c| !c.not_null) {
                warn!("users.pass_hash accepts NULL; rows without a hash can never log in");
            }
            if state.is_unique("username") {
                debug!("users table already in canonical shape");
                return Ok(UsersTableOutcome::AlreadyCanonical);
            }
            self.add_username_index(handle).await?;
            return Ok(UsersTableOutcome::UniqueIndexAdded);
        }

        if !state.exists() {
            bounded(self.query_timeout, sqlx::query(CREATE_USERS).execute(handle.pool()))
                .await
                .map_err(|e| RollcallError::Schema(format!("create users: {e}")))?;
            info!("users table created");
            return Ok(UsersTableOutcome::Created);
        }

        let dropped_rows = self.recreate_users(handle, &state).await?;
        Ok(UsersTableOutcome::Recreated { dropped_rows })
    }

    /// Read the live column layout of `table`.
    pub async fn introspect(
        &self,
        handle: &ConnectionHandle,
        table: &str,
    ) -> Result<SchemaState, RollcallError> {
        let introspect_err =
            |e: StoreFailure| RollcallError::Schema(format!("introspect {table}: {e}"));

        let rows: Vec<(String, i64)> = bounded(
            self.query_timeout,
            sqlx::query_as(r#"SELECT name, "notnull" FROM pragma_table_info(?)"#)
                .bind(table)
                .fetch_all(handle.pool()),
        )
        .await
        .map_err(introspect_err)?;

        let unique_indexes: Vec<String> = bounded(
            self.query_timeout,
            sqlx::query_scalar(r#"SELECT name FROM pragma_index_list(?) WHERE "unique" = 1"#)
                .bind(table)
                .fetch_all(handle.pool()),
        )
        .await
        .map_err(introspect_err)?;

        let mut unique_keys = Vec::with_capacity(unique_indexes.len());
        for index in unique_indexes {
            // Expression columns come back as NULL; such an index cannot key on a plain column.
            let key: Vec<Option<String>> = bounded(
                self.query_timeout,
                sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                    .bind(&index)
                    .fetch_all(handle.pool()),
            )
            .await
            .map_err(introspect_err)?;
            if let Some(key) = key.into_iter().collect::<Option<Vec<String>>>() {
                unique_keys.push(key);
            }
        }

        Ok(SchemaState {
            table: table.to_string(),
            columns: rows.into_iter().map(ColumnInfo::from).collect(),
            unique_keys,
        })
    }

    /// Existing rows are kept. Duplicate usernames already present make this fail.
    async fn add_username_index(&self, handle: &ConnectionHandle) -> Result<(), RollcallError> {
        warn!("users.username has no unique index; adding users_username_uq");
        bounded(
            self.query_timeout,
            sqlx::query(CREATE_USERNAME_INDEX).execute(handle.pool()),
        )
        .await
        .map_err(|e| RollcallError::Schema(format!("add unique index on users.username: {e}")))?;
        info!("unique index on users.username created");
        Ok(())
    }

    /// Drop a legacy `users` table and create the canonical one in a single
    /// transaction. Irreversible: every existing row is discarded.
    async fn recreate_users(
        &self,
        handle: &ConnectionHandle,
        legacy: &SchemaState,
    ) -> Result<i64, RollcallError> {
        let schema_err = |step: &str, e: &dyn std::fmt::Display| {
            RollcallError::Schema(format!("recreate users ({step}): {e}"))
        };
        let limit = self.query_timeout;

        let mut tx = bounded(limit, handle.pool().begin())
            .await
            .map_err(|e| schema_err("begin", &e))?;

        let dropped_rows: i64 = bounded(
            limit,
            sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&mut *tx),
        )
        .await
        .map_err(|e| schema_err("count", &e))?;

        let found: Vec<&str> = legacy.columns.iter().map(|c| c.name.as_str()).collect();
        warn!(
            table = USERS_TABLE,
            columns = ?found,
            missing = ?legacy.missing_columns(&REQUIRED_USER_COLUMNS),
            dropped_rows,
            "users table has an incompatible shape; DROPPING it and recreating. These rows are lost permanently"
        );

        bounded(limit, sqlx::query("DROP TABLE IF EXISTS users").execute(&mut *tx))
            .await
            .map_err(|e| schema_err("drop", &e))?;
        bounded(limit, sqlx::query(CREATE_USERS).execute(&mut *tx))
            .await
            .map_err(|e| schema_err("create", &e))?;
        bounded(limit, tx.commit())
            .await
            .map_err(|e| schema_err("commit", &e))?;

        info!(dropped_rows, "users table recreated with canonical shape");
        Ok(dropped_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            not_null: false,
        }
    }

    fn users(columns: &[&str], unique_keys: &[&[&str]]) -> SchemaState {
        SchemaState {
            table: USERS_TABLE.to_string(),
            columns: columns.iter().map(|c| column(c)).collect(),
            unique_keys: unique_keys
                .iter()
                .map(|key| key.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn missing_table_is_not_compatible() {
        let state = users(&[], &[]);
        assert!(!state.exists());
        assert!(!state.is_compatible_users());
    }

    #[test]
    fn legacy_password_column_is_incompatible() {
        let state = users(&["id", "username", "password"], &[]);
        assert!(state.exists());
        assert_eq!(state.missing_columns(&REQUIRED_USER_COLUMNS), vec!["pass_hash"]);
        assert!(!state.is_compatible_users());
    }

    #[test]
    fn column_match_ignores_case() {
        let state = users(&["ID", "Username", "PASS_HASH"], &[&["USERNAME"]]);
        assert!(state.is_compatible_users());
        assert!(state.is_unique("username"));
    }

    #[test]
    fn composite_unique_key_does_not_make_username_unique() {
        let state = users(&["id", "username", "pass_hash"], &[&["username", "id"]]);
        assert!(state.is_compatible_users());
        assert!(!state.is_unique("username"));
    }
}
