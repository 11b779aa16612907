//! API request handlers

pub mod canonical;
pub mod keys;
pub mod verify;

use crate::orchestrator::Verifier;

/// Shared application state
pub struct AppState {
    pub verifier: Verifier,
}

pub use canonical::{canonicalize, CanonicalizeResponse};
pub use keys::key_status;
pub use verify::{
    verify_artifact, verify_batch, ArtifactBody, AuxiliaryBody, BatchVerifyRequest,
    BatchVerifyResponse, MAX_BATCH_SIZE,
};
