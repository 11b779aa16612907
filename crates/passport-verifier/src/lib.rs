//! Passport Verifier
//!
//! Verifies artifacts against their Provenance Passports and serves the
//! same pipeline over HTTP.
//!
//! ## Pipeline
//!
//! 1. **Discovery**: embedded manifest, then container part or pointer, then
//!    companion file
//! 2. **Structural validation**: schema shape plus strict format rules, all
//!    violations reported at once
//! 3. **Hash check**: artifact bytes against `artifact.sha256`, skipped when
//!    the container attests the content itself
//! 4. **Signature**: Ed25519 over the canonical passport
//! 5. **Revocation**: signer looked up in the revocation feed (fails open to
//!    `unknown` unless configured otherwise)
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with trust configuration
//! - `POST /v1/verify` - Verify one base64-encoded artifact
//! - `POST /v1/verify/batch` - Verify several artifacts
//! - `GET /v1/keys/{key_id}/status` - Revocation status of a signing key
//! - `POST /v1/canonicalize` - Canonical form and digest of a JSON document

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod revocation;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, VerifierConfig};
pub use error::EngineFault;
pub use orchestrator::{Verifier, VerifierBuilder};
pub use report::{BatchReport, Severity, Stage, Status, Summary, VerificationReport};
pub use revocation::{FeedCache, RevocationCheck, RevocationTruster};
