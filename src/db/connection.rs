use crate::config::DatabaseConfig;
use crate::db::bounded;
use crate::error::{RollcallError, StoreFailure};
use backon::{ExponentialBuilder, Retryable};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Connection with no target database selected; only used to create the target.
const CONTROL_URL: &str = "sqlite::memory:";
const ATTACH_ALIAS: &str = "rollcall_target";

/// A live session scoped to the target database.
///
/// Owned by [`ConnectionManager`]; other components borrow it for one operation.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pool: SqlitePool,
    sequence: u64,
}

impl ConnectionHandle {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of the connect sequence that produced this handle.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Check the session instead of assuming it survived since the last use.
    ///
    /// A check that only waited out the pool's acquire timeout means the single
    /// connection is checked out by someone else; that handle is busy, not dead.
    pub async fn is_live(&self, limit: Duration) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        match bounded(limit, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(_) => true,
            Err(StoreFailure::Sql(sqlx::Error::PoolTimedOut)) => {
                debug!(sequence = self.sequence, "liveness check found the connection busy");
                true
            }
            Err(e) => {
                debug!(sequence = self.sequence, error = %e, "liveness check failed");
                false
            }
        }
    }
}

#[derive(Default)]
struct Slot {
    current: Option<ConnectionHandle>,
    /// Outcome of the most recent connect sequence, shared with callers that queued behind it.
    last_outcome: Option<Result<ConnectionHandle, String>>,
}

/// Provides a currently-valid [`ConnectionHandle`], creating the database when
/// absent and reconnecting when the cached handle has died.
pub struct ConnectionManager {
    settings: DatabaseConfig,
    slot: Mutex<Slot>,
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(settings: DatabaseConfig) -> Self {
        Self {
            settings,
            slot: Mutex::new(Slot::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &DatabaseConfig {
        &self.settings
    }

    /// How many connect sequences have run so far.
    pub fn connect_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get_handle(&self) -> Result<ConnectionHandle, RollcallError> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if self.generation.load(Ordering::Acquire) != observed
            && let Some(outcome) = slot.last_outcome.clone()
        {
            return outcome.map_err(RollcallError::Connectivity);
        }

        if let Some(handle) = slot.current.as_ref() {
            if handle.is_live(self.settings.query_timeout()).await {
                return Ok(handle.clone());
            }
            warn!(
                sequence = handle.sequence(),
                "cached connection failed liveness check; reconnecting"
            );
        }
        if let Some(stale) = slot.current.take() {
            // Closing waits for checked-out connections; keep that off the lock.
            tokio::spawn(async move { stale.pool.close().await });
        }

        let sequence = self.generation.load(Ordering::Acquire) + 1;
        let outcome = self.connect_sequence(sequence).await;

        slot.current = outcome.as_ref().ok().cloned();
        slot.last_outcome = Some(outcome.clone());
        self.generation.store(sequence, Ordering::Release);

        outcome.map_err(RollcallError::Connectivity)
    }

    /// Check the store end to end.
    pub async fn health_check(&self) -> Result<(), RollcallError> {
        let handle = self.get_handle().await?;
        bounded(
            self.settings.query_timeout(),
            sqlx::query("SELECT 1").execute(handle.pool()),
        )
        .await
        .map_err(|e| RollcallError::Connectivity(e.to_string()))?;
        Ok(())
    }

    /// Close the current handle at process teardown.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.current.take() {
            handle.pool.close().await;
            info!(sequence = handle.sequence(), "DB connection closed");
        }
        slot.last_outcome = None;
    }

    async fn connect_sequence(&self, sequence: u64) -> Result<ConnectionHandle, String> {
        let path = self.settings.database_path();
        debug!(sequence, database = %path.display(), "starting connect sequence");

        match self.ensure_database(&path).await {
            Ok(()) => info!(database = %path.display(), "database ensured"),
            Err(e) => warn!(
                database = %path.display(),
                error = %e,
                "could not create database (may already exist); continuing"
            ),
        }

        match self.open_target(&path).await {
            Ok(pool) => {
                info!(sequence, database = %path.display(), "DB connected");
                Ok(ConnectionHandle { pool, sequence })
            }
            Err(e) => {
                error!(sequence, database = %path.display(), error = %e, "DB connection failed");
                Err(format!("cannot open database {}: {e}", path.display()))
            }
        }
    }

    /// Advisory: create the target database through a control connection.
    async fn ensure_database(&self, path: &Path) -> Result<(), RollcallError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let limit = self.settings.connect_timeout();
        let control_opts = SqliteConnectOptions::from_str(CONTROL_URL)?.create_if_missing(true);
        let mut control = bounded(limit, control_opts.connect()).await?;

        let attach = format!("ATTACH DATABASE ? AS {ATTACH_ALIAS}");
        // WAL is persisted in the file header, so this forces the file onto disk.
        let persist = format!("PRAGMA {ATTACH_ALIAS}.journal_mode = WAL");
        let detach = format!("DETACH DATABASE {ATTACH_ALIAS}");
        let target = path.to_string_lossy().into_owned();
        bounded(limit, sqlx::query(&attach).bind(target).execute(&mut control)).await?;
        bounded(limit, sqlx::query(&persist).execute(&mut control)).await?;
        bounded(limit, sqlx::query(&detach).execute(&mut control)).await?;

        if let Err(e) = control.close().await {
            debug!(error = %e, "control connection close failed");
        }
        Ok(())
    }

    async fn open_target(&self, path: &Path) -> Result<SqlitePool, StoreFailure> {
        let limit = self.settings.connect_timeout();
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1))
            .with_max_times(self.settings.connect_retries);

        (|| async {
            // SQLite permits one writer; a single connection avoids "database is locked".
            let pool_opts = SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(limit);
            bounded(limit, pool_opts.connect_with(opts.clone())).await
        })
        .retry(retry_policy)
        .notify(|err: &StoreFailure, delay: Duration| {
            warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "open database failed; retrying");
        })
        .await
    }
}
