//! Shared fixtures for integration tests.

use rollcall::config::{AdminConfig, DatabaseConfig};
use rollcall::db::ConnectionManager;
use rollcall::service::{CredentialService, Sha256Hasher};
use std::sync::Arc;
use tempfile::TempDir;

/// A database directory that is removed on drop.
pub struct TestDb {
    pub settings: DatabaseConfig,
    _temp_dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let settings = DatabaseConfig {
            data_dir: temp_dir.path().join("data"),
            name: "studentdb".to_string(),
            connect_timeout_secs: 5,
            query_timeout_secs: 5,
            connect_retries: 0,
        };
        Self {
            settings,
            _temp_dir: temp_dir,
        }
    }

    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(self.settings.clone()))
    }

    #[allow(dead_code)]
    pub fn service(&self, connections: Arc<ConnectionManager>) -> CredentialService {
        CredentialService::new(connections, Arc::new(Sha256Hasher), AdminConfig::default())
    }

    /// A manager and a service that has completed its startup sequence.
    #[allow(dead_code)]
    pub async fn ready_service(&self) -> (Arc<ConnectionManager>, Arc<CredentialService>) {
        let connections = self.manager();
        let service = Arc::new(self.service(connections.clone()));
        service.start().await.expect("Failed to start credential service");
        (connections, service)
    }
}
