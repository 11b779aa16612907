//! Verifier configuration
//!
//! Policy toggles and operational knobs, read from `PASSPORT_*` environment
//! variables. A variable that is set but unparseable is an error rather
//! than being quietly replaced by its default.

use std::time::Duration;

use passport_core::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port the server binds when `PASSPORT_PORT` is unset
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid revocation authority key: {0}")]
    InvalidAuthorityKey(String),

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Treat an `unknown` key status as blocking
    pub require_revocation_check: bool,
    /// Map any warning to a non-zero severity
    pub strict_on_warning: bool,
    /// Map a missing passport to a non-zero severity
    pub fail_on_missing: bool,
    /// Revocation feed location; unset skips the check
    pub revocation_feed_url: Option<String>,
    /// Hex Ed25519 public key the feed must be signed with
    pub revocation_authority_key: Option<String>,
    /// Base URL container pointers are resolved against
    pub manifest_base_url: Option<String>,
    pub fetch_timeout_secs: u64,
    pub feed_ttl_secs: u64,
    /// Upper bound on concurrently verified artifacts in a batch
    pub max_concurrency: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            require_revocation_check: false,
            strict_on_warning: false,
            fail_on_missing: false,
            revocation_feed_url: None,
            revocation_authority_key: None,
            manifest_base_url: None,
            fetch_timeout_secs: 10,
            feed_ttl_secs: 300,
            max_concurrency: 8,
        }
    }
}

impl VerifierConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("PASSPORT_REQUIRE_REVOCATION_CHECK") {
            config.require_revocation_check = parse_bool("PASSPORT_REQUIRE_REVOCATION_CHECK", &v)?;
        }
        if let Some(v) = non_empty("PASSPORT_STRICT") {
            config.strict_on_warning = parse_bool("PASSPORT_STRICT", &v)?;
        }
        if let Some(v) = non_empty("PASSPORT_FAIL_ON_MISSING") {
            config.fail_on_missing = parse_bool("PASSPORT_FAIL_ON_MISSING", &v)?;
        }
        config.revocation_feed_url = non_empty("PASSPORT_REVOCATION_FEED_URL");
        config.revocation_authority_key = non_empty("PASSPORT_REVOCATION_AUTHORITY_KEY");
        config.manifest_base_url = non_empty("PASSPORT_MANIFEST_BASE_URL");
        if let Some(v) = non_empty("PASSPORT_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout_secs = parse_number("PASSPORT_FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = non_empty("PASSPORT_FEED_TTL_SECS") {
            config.feed_ttl_secs = parse_number("PASSPORT_FEED_TTL_SECS", &v)?;
        }
        if let Some(v) = non_empty("PASSPORT_MAX_CONCURRENCY") {
            config.max_concurrency = parse_number("PASSPORT_MAX_CONCURRENCY", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.authority_key()?;
        Ok(())
    }

    /// Parsed revocation authority key
    pub fn authority_key(&self) -> Result<Option<PublicKey>, ConfigError> {
        self.revocation_authority_key
            .as_deref()
            .map(|hex| {
                PublicKey::from_hex(hex.trim())
                    .map_err(|e| ConfigError::InvalidAuthorityKey(e.to_string()))
            })
            .transpose()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn feed_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_ttl_secs)
    }
}

/// Server port from the process environment
pub fn server_port_from_env() -> Result<u16, ConfigError> {
    server_port(|var| std::env::var(var).ok())
}

/// Server port through an arbitrary variable lookup
pub fn server_port(lookup: impl Fn(&str) -> Option<String>) -> Result<u16, ConfigError> {
    match lookup("PASSPORT_PORT").filter(|v| !v.trim().is_empty()) {
        Some(v) => parse_number("PASSPORT_PORT", &v),
        None => Ok(DEFAULT_PORT),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
