//! Ed25519 signing and verification of JSON documents
//!
//! The signed message is the canonical form of the document with its
//! `signature` field removed. Verification never throws for expected
//! conditions: a bad signature, malformed key material or a spoofed key id
//! all come back as a [`SignatureVerification`] carrying a
//! [`SignatureFailure`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::canonical::canonicalize;
use crate::crypto::{KeyPair, PublicKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use crate::digest::key_id;
use crate::error::{PassportError, Result};
use crate::passport::{SignatureBlock, SIGNATURE_ALGO};

/// Name of the field excluded from the signed payload
pub const SIGNATURE_FIELD: &str = "signature";

/// Why a signature did not verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// No `signature` field at all
    MissingSignature,
    /// `algo` is something other than `ed25519`
    UnsupportedAlgorithm(String),
    /// `public_key` or `signature` missing or empty
    MissingKeyMaterial,
    /// `public_key` or `signature` is not valid hex
    InvalidHex,
    /// `public_key` does not decode to 32 bytes
    PublicKeyLength(usize),
    /// `signature` does not decode to 64 bytes
    SignatureLength(usize),
    /// Declared `key_id` is not the one derived from `public_key`
    KeyIdMismatch { declared: String, computed: String },
    /// The Ed25519 check itself failed
    InvalidSignature,
}

impl SignatureFailure {
    /// Integrity violations indicate tampering or spoofing rather than a
    /// malformed document
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            SignatureFailure::KeyIdMismatch { .. } | SignatureFailure::InvalidSignature
        )
    }
}

impl std::fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureFailure::MissingSignature => write!(f, "Missing signature field"),
            SignatureFailure::UnsupportedAlgorithm(algo) => {
                write!(f, "Unsupported algorithm: {algo}")
            }
            SignatureFailure::MissingKeyMaterial => write!(f, "Missing public_key or signature"),
            SignatureFailure::InvalidHex => {
                write!(f, "Invalid hex encoding in public_key or signature")
            }
            SignatureFailure::PublicKeyLength(_) => {
                write!(f, "Public key must be 32 bytes (64 hex characters)")
            }
            SignatureFailure::SignatureLength(_) => {
                write!(f, "Signature must be 64 bytes (128 hex characters)")
            }
            SignatureFailure::KeyIdMismatch { .. } => write!(f, "Key ID does not match public key"),
            SignatureFailure::InvalidSignature => write!(f, "Signature verification failed"),
        }
    }
}

/// Outcome of verifying a signed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerification {
    /// Key id derived from the declared public key, when it could be decoded
    pub key_id: Option<String>,
    /// `None` when the signature is valid
    pub failure: Option<SignatureFailure>,
}

impl SignatureVerification {
    fn valid(key_id: String) -> Self {
        Self {
            key_id: Some(key_id),
            failure: None,
        }
    }

    fn invalid(key_id: Option<String>, failure: SignatureFailure) -> Self {
        Self {
            key_id,
            failure: Some(failure),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// Human-readable failure message
    pub fn error(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// Canonical bytes a signature over `document` covers
///
/// `document` must be a JSON object; its `signature` field, if any, is
/// dropped before canonicalization.
pub fn signing_payload(document: &Value) -> Result<Vec<u8>> {
    let object = as_object(document)?;
    let mut unsigned = object.clone();
    unsigned.remove(SIGNATURE_FIELD);
    Ok(canonicalize(&Value::Object(unsigned))?)
}

/// Sign a document and return its signature block
pub fn sign_document(document: &Value, key: &KeyPair) -> Result<SignatureBlock> {
    let message = signing_payload(document)?;
    let signature = key.sign(&message);
    debug!(key_id = %key.key_id(), message_len = message.len(), "Signed document");

    Ok(SignatureBlock {
        algo: SIGNATURE_ALGO.to_string(),
        public_key: key.public_key_hex(),
        signature: hex::encode(signature),
        key_id: Some(key.key_id().to_string()),
    })
}

/// Sign a document and return it with the `signature` field set
pub fn attach_signature(document: Value, key: &KeyPair) -> Result<Value> {
    let block = sign_document(&document, key)?;
    match document {
        Value::Object(mut object) => {
            object.insert(SIGNATURE_FIELD.to_string(), serde_json::to_value(block)?);
            Ok(Value::Object(object))
        }
        other => Err(PassportError::NotAnObject(kind_of(&other))),
    }
}

/// Verify the Ed25519 signature embedded in a document
///
/// Checks run in order and stop at the first failure: presence, algorithm,
/// key material presence, hex encoding, decoded lengths, declared key id,
/// and finally the signature itself. Only a document that is not a JSON
/// object at all is an `Err`.
pub fn verify_document(document: &Value) -> Result<SignatureVerification> {
    let object = as_object(document)?;

    let Some(Value::Object(block)) = object.get(SIGNATURE_FIELD) else {
        return Ok(SignatureVerification::invalid(
            None,
            SignatureFailure::MissingSignature,
        ));
    };

    let algo = block.get("algo").and_then(Value::as_str).unwrap_or("none");
    if algo != SIGNATURE_ALGO {
        return Ok(SignatureVerification::invalid(
            None,
            SignatureFailure::UnsupportedAlgorithm(algo.to_string()),
        ));
    }

    let public_key_hex = non_empty_str(block.get("public_key"));
    let signature_hex = non_empty_str(block.get("signature"));
    let (Some(public_key_hex), Some(signature_hex)) = (public_key_hex, signature_hex) else {
        return Ok(SignatureVerification::invalid(
            None,
            SignatureFailure::MissingKeyMaterial,
        ));
    };

    let (Ok(public_key_bytes), Ok(signature_bytes)) =
        (hex::decode(public_key_hex), hex::decode(signature_hex))
    else {
        return Ok(SignatureVerification::invalid(None, SignatureFailure::InvalidHex));
    };

    let Ok(public_key_bytes) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(public_key_bytes.as_slice())
    else {
        return Ok(SignatureVerification::invalid(
            None,
            SignatureFailure::PublicKeyLength(public_key_bytes.len()),
        ));
    };

    let computed = key_id(&public_key_bytes);

    let Ok(signature_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature_bytes.as_slice())
    else {
        return Ok(SignatureVerification::invalid(
            Some(computed),
            SignatureFailure::SignatureLength(signature_bytes.len()),
        ));
    };

    if let Some(declared) = block.get("key_id").and_then(Value::as_str) {
        if declared != computed {
            warn!(
                declared = %declared,
                computed = %computed,
                "SECURITY: Declared key_id does not match public key"
            );
            return Ok(SignatureVerification::invalid(
                Some(computed.clone()),
                SignatureFailure::KeyIdMismatch {
                    declared: declared.to_string(),
                    computed,
                },
            ));
        }
    }

    let message = signing_payload(document)?;
    let valid = PublicKey::from_bytes(&public_key_bytes)
        .map(|pk| pk.verify(&message, &signature_bytes))
        .unwrap_or(false);

    if valid {
        debug!(key_id = %computed, "Signature verified");
        Ok(SignatureVerification::valid(computed))
    } else {
        warn!(key_id = %computed, "SECURITY: Signature verification failed");
        Ok(SignatureVerification::invalid(
            Some(computed),
            SignatureFailure::InvalidSignature,
        ))
    }
}

fn as_object(document: &Value) -> Result<&Map<String, Value>> {
    document
        .as_object()
        .ok_or_else(|| PassportError::NotAnObject(kind_of(document)))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
