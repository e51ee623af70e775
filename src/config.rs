//! Static configuration read once at startup.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `config.toml` in the working directory (optional)
//! - `ROLLCALL_*` environment variables, nested with `__`
//!   (e.g. `ROLLCALL_DATABASE__NAME=studentdb`)

use crate::error::RollcallError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "ROLLCALL_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the database files.
    pub data_dir: PathBuf,
    /// Target database name; the file is `<data_dir>/<name>.db`.
    pub name: String,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Extra attempts when opening the target database.
    pub connect_retries: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            name: "studentdb".to_string(),
            connect_timeout_secs: 5,
            query_timeout_secs: 10,
            connect_retries: 2,
        }
    }
}

impl DatabaseConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.name))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Well-known account seeded into an empty `users` table.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin123".to_string(),
        }
    }
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load from `config.toml` and the environment.
    pub fn load() -> Result<Self, RollcallError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, RollcallError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        let cfg: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| RollcallError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RollcallError> {
        let name = self.database.name.as_str();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RollcallError::Config(format!(
                "database.name must match [A-Za-z0-9_]+, got {name:?}"
            )));
        }
        if self.database.connect_timeout_secs == 0 || self.database.query_timeout_secs == 0 {
            return Err(RollcallError::Config(
                "database timeouts must be at least one second".to_string(),
            ));
        }
        if self.admin.username.is_empty() || self.admin.password.is_empty() {
            return Err(RollcallError::Config(
                "admin.username and admin.password must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.database.database_path(), PathBuf::from("data/studentdb.db"));
        assert_eq!(cfg.admin.username, "admin");
    }

    #[test]
    fn rejects_database_name_with_path_separators() {
        let mut cfg = Config::default();
        cfg.database.name = "../etc/passwd".to_string();
        assert!(matches!(cfg.validate(), Err(RollcallError::Config(_))));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut cfg = Config::default();
        cfg.database.query_timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(RollcallError::Config(_))));
    }

    #[test]
    fn admin_password_is_redacted_in_debug_output() {
        let rendered = format!("{:?}", AdminConfig::default());
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("admin123"));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[database]\nname = \"campus\"\nquery_timeout_secs = 3\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.database.name, "campus");
        assert_eq!(cfg.database.query_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.database.connect_timeout_secs, 5);
    }
}
