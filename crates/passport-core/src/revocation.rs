//! Revocation feed model and feed signatures
//!
//! A revocation feed lists key identifiers that are no longer trusted. A
//! feed may carry its own `signature`: a bare hex Ed25519 signature over the
//! canonical form of the feed without that field. Fields beyond the known
//! ones (`authority`, `feed_url`, ...) are covered by the signature too.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::crypto::{KeyPair, PublicKey, SIGNATURE_LENGTH};
use crate::error::{PassportError, Result};
use crate::passport::Extra;
use crate::signing::{signing_payload, SIGNATURE_FIELD};

/// Trust state of a signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Feed was consulted and does not list the key
    Active,
    /// Feed lists the key
    Revoked,
    /// Feed unavailable, unparseable or unauthenticated
    Unknown,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
            KeyStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One revoked key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedKey {
    pub key_id: String,
    pub revoked_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A published revocation feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevocationFeed {
    pub revoked_keys: Vec<RevokedKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    /// Hex Ed25519 signature by the feed authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl RevocationFeed {
    /// Parse a feed from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Look a key up in this feed
    pub fn status_of(&self, key_id: &str) -> KeyStatus {
        if self.revoked_keys.iter().any(|k| k.key_id == key_id) {
            KeyStatus::Revoked
        } else {
            KeyStatus::Active
        }
    }

    /// The revocation entry for a key, if listed
    pub fn entry_for(&self, key_id: &str) -> Option<&RevokedKey> {
        self.revoked_keys.iter().find(|k| k.key_id == key_id)
    }
}

/// Outcome of checking a feed's own signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSignature {
    Valid,
    /// Feed has no `signature` field
    Missing,
    /// `signature` is not 128 hex characters
    Malformed,
    /// Ed25519 check failed
    Invalid,
}

/// Sign a feed document, replacing any existing signature
pub fn sign_feed(feed: Value, authority: &KeyPair) -> Result<Value> {
    let message = signing_payload(&feed)?;
    let signature = hex::encode(authority.sign(&message));
    match feed {
        Value::Object(mut object) => {
            object.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
            Ok(Value::Object(object))
        }
        _ => Err(PassportError::NotAnObject("non-object")),
    }
}

/// Check a feed's signature against the authority key
pub fn verify_feed_signature(feed: &Value, authority: &PublicKey) -> Result<FeedSignature> {
    let Some(signature_hex) = feed.get(SIGNATURE_FIELD).and_then(Value::as_str) else {
        return Ok(FeedSignature::Missing);
    };

    let signature: [u8; SIGNATURE_LENGTH] = match hex::decode(signature_hex)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
    {
        Some(signature) => signature,
        None => return Ok(FeedSignature::Malformed),
    };

    let message = signing_payload(feed)?;
    if authority.verify(&message, &signature) {
        Ok(FeedSignature::Valid)
    } else {
        warn!(
            authority = %authority.key_id(),
            "SECURITY: Revocation feed signature does not verify"
        );
        Ok(FeedSignature::Invalid)
    }
}
