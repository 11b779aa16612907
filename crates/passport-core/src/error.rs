//! Error types for the Passport protocol core

use thiserror::Error;

use crate::canonical::CanonicalizationError;

/// Result type alias using PassportError
pub type Result<T> = std::result::Result<T, PassportError>;

/// Errors that can occur while building, signing or decoding passports
///
/// Verification outcomes are *not* errors: a passport that fails signature
/// or format checks is reported through
/// [`SignatureVerification`](crate::signing::SignatureVerification) and
/// [`FormatViolation`](crate::validation::FormatViolation) values.
#[derive(Error, Debug)]
pub enum PassportError {
    /// Document could not be canonicalized
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Hex field could not be decoded
    #[error("Invalid hex encoding in {field}: {reason}")]
    InvalidHex { field: String, reason: String },

    /// Key or signature material has the wrong decoded length
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Private key material could not be loaded
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Document is not a JSON object
    #[error("Document must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Cryptographic error
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Artifact or key file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON Schema could not be parsed or compiled
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl From<ed25519_dalek::SignatureError> for PassportError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        PassportError::CryptoError(err.to_string())
    }
}

impl From<serde_json::Error> for PassportError {
    fn from(err: serde_json::Error) -> Self {
        PassportError::SerializationError(err.to_string())
    }
}
