pub mod auth_actor;
pub mod credential_service;
pub mod hasher;

pub use auth_actor::AuthHandle;
pub use credential_service::{CredentialService, SeedOutcome, ServiceState};
pub use hasher::{CredentialHasher, Sha256Hasher};
