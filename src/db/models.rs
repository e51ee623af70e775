use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub pass_hash: String,
}

/// One column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub not_null: bool,
}

impl From<(String, i64)> for ColumnInfo {
    fn from((name, not_null): (String, i64)) -> Self {
        Self {
            name,
            not_null: not_null != 0,
        }
    }
}
