use crate::config::AdminConfig;
use crate::db::connection::{ConnectionHandle, ConnectionManager};
use crate::db::models::Credential;
use crate::db::schema::{SchemaBootstrapper, UsersTableOutcome};
use crate::db::sqlite::UsersStorage;
use crate::error::RollcallError;
use crate::service::hasher::CredentialHasher;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, info, warn};

/// Longest username the `users` table accepts.
pub const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceState {
    Uninitialized = 0,
    Bootstrapped = 1,
    Ready = 2,
}

impl ServiceState {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => ServiceState::Ready,
            1 => ServiceState::Bootstrapped,
            _ => ServiceState::Uninitialized,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Bootstrapped => "bootstrapped",
            ServiceState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// Result of the default-admin check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    /// Accounts already existed (or another process seeded first).
    Skipped { existing: i64 },
}

/// Login, signup and default-admin seeding over the `users` table.
pub struct CredentialService {
    connections: Arc<ConnectionManager>,
    schema: SchemaBootstrapper,
    hasher: Arc<dyn CredentialHasher>,
    admin: AdminConfig,
    state: AtomicU8,
}

impl CredentialService {
    pub fn new(
        connections: Arc<ConnectionManager>,
        hasher: Arc<dyn CredentialHasher>,
        admin: AdminConfig,
    ) -> Self {
        let schema = SchemaBootstrapper::new(connections.settings().query_timeout());
        Self {
            connections,
            schema,
            hasher,
            admin,
            state: AtomicU8::new(ServiceState::Uninitialized as u8),
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Startup sequence: schema bootstrap, then the default-admin check.
    pub async fn start(&self) -> Result<SeedOutcome, RollcallError> {
        self.bootstrap().await?;
        self.ensure_default_admin().await
    }

    /// Ensure tables exist with the expected shape. Moves
    /// `Uninitialized -> Bootstrapped`; a failure leaves the state untouched.
    pub async fn bootstrap(&self) -> Result<UsersTableOutcome, RollcallError> {
        let handle = self.connections.get_handle().await?;
        let outcome = self.schema.bootstrap(&handle).await?;
        if let UsersTableOutcome::Recreated { dropped_rows } = outcome {
            warn!(dropped_rows, "credential records were discarded during schema repair");
        }
        let _ = self.state.compare_exchange(
            ServiceState::Uninitialized as u8,
            ServiceState::Bootstrapped as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(outcome)
    }

    /// Seed the configured admin when the `users` table is empty.
    ///
    /// Runs on every start, so an operator who deletes every account gets the
    /// default admin back on the next start. The count is a fast path only; the
    /// insert itself is conditional and guarded by `UNIQUE(username)`.
    pub async fn ensure_default_admin(&self) -> Result<SeedOutcome, RollcallError> {
        let state = self.state();
        if state == ServiceState::Uninitialized {
            return Err(RollcallError::NotReady(state));
        }

        let handle = self.connections.get_handle().await?;
        let users = self.storage(&handle);

        let existing = users.count().await?;
        let outcome = if existing > 0 {
            info!(existing, "users table already has entries");
            SeedOutcome::Skipped { existing }
        } else {
            let pass_hash = self.hasher.hash(&self.admin.password);
            if users.insert_if_empty(&self.admin.username, &pass_hash).await? {
                warn!(
                    username = %self.admin.username,
                    "default admin created with the well-known password; change it"
                );
                SeedOutcome::Created
            } else {
                let existing = users.count().await?;
                info!(existing, "default admin seeded concurrently elsewhere");
                SeedOutcome::Skipped { existing }
            }
        };

        self.state.store(ServiceState::Ready as u8, Ordering::Release);
        Ok(outcome)
    }

    /// Verify a username/password pair; returns the stored username.
    ///
    /// Unknown users and wrong passwords both yield `InvalidCredentials`.
    /// Surrounding whitespace in the username is ignored; the password is used as given.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, RollcallError> {
        self.ensure_ready()?;
        let username = required_username(username)?;
        if password.is_empty() {
            return Err(RollcallError::InvalidInput("password is required"));
        }

        let handle = self.connections.get_handle().await?;
        let record = self.storage(&handle).find_by_username(username).await?;

        // Hash even for unknown users so both failures cost the same.
        let verified = match &record {
            Some(record) => self.hasher.verify(password, &record.pass_hash),
            None => {
                let _ = self.hasher.hash(password);
                false
            }
        };

        match record {
            Some(record) if verified => {
                info!(username = %record.username, "login successful");
                Ok(record.username)
            }
            _ => {
                debug!(username, "invalid credentials");
                Err(RollcallError::InvalidCredentials)
            }
        }
    }

    /// Create an account under the trimmed username. No retry on a taken username.
    pub async fn signup(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, RollcallError> {
        self.ensure_ready()?;
        let username = required_username(username)?;
        if password.is_empty() {
            return Err(RollcallError::InvalidInput("password is required"));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(RollcallError::InvalidInput(
                "username must be at most 50 characters",
            ));
        }

        let handle = self.connections.get_handle().await?;
        let pass_hash = self.hasher.hash(password);
        match self.storage(&handle).insert(username, &pass_hash).await {
            Ok(record) => {
                info!(id = record.id, username = %record.username, "user created");
                Ok(record)
            }
            Err(e) if e.is_unique_violation() => {
                Err(RollcallError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_ready(&self) -> Result<(), RollcallError> {
        match self.state() {
            ServiceState::Ready => Ok(()),
            other => Err(RollcallError::NotReady(other)),
        }
    }

    fn storage<'a>(&self, handle: &'a ConnectionHandle) -> UsersStorage<'a> {
        UsersStorage::new(handle.pool(), self.connections.settings().query_timeout())
    }
}

/// Usernames are compared and stored without surrounding whitespace.
fn required_username(username: &str) -> Result<&str, RollcallError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(RollcallError::InvalidInput("username is required"));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_trimmed_and_must_not_be_blank() {
        assert_eq!(required_username("  alice\t").unwrap(), "alice");
        for blank in ["", "   ", "\t\n"] {
            assert!(matches!(
                required_username(blank),
                Err(RollcallError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn state_round_trips_through_its_discriminant() {
        for state in [
            ServiceState::Uninitialized,
            ServiceState::Bootstrapped,
            ServiceState::Ready,
        ] {
            assert_eq!(ServiceState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(ServiceState::Bootstrapped.to_string(), "bootstrapped");
    }
}
