//! # Passport Core
//!
//! Protocol primitives for Provenance Passports: signed documents that
//! assert an artifact's hash, creation metadata, processing history and
//! policy attestations.
//!
//! ## Key Concepts
//!
//! - **Canonical form**: RFC 8785 (JCS) bytes of a JSON document. Anything
//!   signed is signed over this form.
//! - **Key identifier**: `ppk_` + the first 16 hex characters of the SHA-256
//!   of the lowercase hex public key.
//! - **Signature block**: Ed25519 over the canonical document minus its
//!   `signature` field.
//! - **Revocation feed**: an optionally signed list of revoked key ids.
//!
//! ## Guarantees
//!
//! 1. Canonicalization is independent of key insertion order
//! 2. A key id mismatch is an integrity failure, never silently tolerated
//! 3. Any mutation of a signed field invalidates the signature

pub mod canonical;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod passport;
pub mod revocation;
pub mod signing;
pub mod validation;

pub use canonical::{canonicalize, canonicalize_to_string, CanonicalizationError};
pub use crypto::{Fingerprint, KeyPair, PublicKey};
pub use digest::{key_id, sha256_hex};
pub use error::{PassportError, Result};
pub use passport::{
    Artifact, HashBinding, InputRef, Passport, PassportBuilder, PolicyCheck, PolicyResult,
    SignatureBlock, Step, StepCommand,
};
pub use revocation::{FeedSignature, KeyStatus, RevocationFeed, RevokedKey};
pub use signing::{sign_document, verify_document, SignatureFailure, SignatureVerification};
pub use validation::{
    FormatViolation, JsonSchemaOracle, SchemaOracle, SchemaResult, StructuralValidator,
    ValidationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}
