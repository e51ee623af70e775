pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod types;

pub use config::Config;
pub use error::RollcallError;
pub use service::{CredentialService, Sha256Hasher};
