//! Engine faults
//!
//! Verification outcomes (a bad hash, a revoked key, a missing passport) are
//! reported as values in a [`VerificationReport`](crate::report::VerificationReport).
//! `EngineFault` is reserved for conditions that mean the engine itself
//! could not do its job.

use thiserror::Error;

use crate::config::ConfigError;

/// Programmer or environment error raised by the verifier
#[derive(Error, Debug)]
pub enum EngineFault {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Canonicalization or serialization of a value already accepted as JSON
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<passport_core::PassportError> for EngineFault {
    fn from(err: passport_core::PassportError) -> Self {
        EngineFault::Invariant(err.to_string())
    }
}

impl From<passport_discovery::DiscoveryError> for EngineFault {
    fn from(err: passport_discovery::DiscoveryError) -> Self {
        match err {
            passport_discovery::DiscoveryError::Io(msg) => EngineFault::Io(msg),
            other => EngineFault::Client(other.to_string()),
        }
    }
}
