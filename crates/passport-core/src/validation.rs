//! Structural validation of passport documents
//!
//! Two layers run over every document and their findings are aggregated:
//!
//! 1. A [`SchemaOracle`] decides field presence and shape. The default
//!    [`JsonSchemaOracle`] compiles the bundled closed `0.1` schema, so
//!    unknown top-level, artifact and signature fields are rejected.
//! 2. Format checks owned by this crate: exact version and algorithm
//!    literals, exact-length hex fields and UTC timestamps.
//!
//! All violations are collected in one pass so callers can report every
//! problem at once.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::Value;

use crate::error::{PassportError, Result};
use crate::passport::{PASSPORT_VERSION, SIGNATURE_ALGO};

// ============================================================================
// Schema oracle
// ============================================================================

/// Result of a schema check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaResult {
    pub valid: bool,
    /// Messages in `<instance path>: <message>` form
    pub errors: Vec<String>,
}

impl SchemaResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// External structural schema validator
pub trait SchemaOracle: Send + Sync {
    /// Validate a document's field presence and shape
    fn validate(&self, document: &Value) -> SchemaResult;
}

/// The closed `0.1` passport schema (JSON Schema draft 2020-12)
pub const PASSPORT_SCHEMA: &str = include_str!("../schema/pp-0.1.schema.json");

/// [`SchemaOracle`] backed by a compiled JSON Schema
///
/// Every error is reported as `<instance path>: <message>`, with `root`
/// standing in for the empty path.
pub struct JsonSchemaOracle {
    validator: std::result::Result<jsonschema::Validator, String>,
}

impl JsonSchemaOracle {
    /// Compile `schema`
    pub fn compile(schema: &Value) -> Result<Self> {
        let validator = jsonschema::options()
            .build(schema)
            .map_err(|e| PassportError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            validator: Ok(validator),
        })
    }

    /// Oracle for the bundled passport schema
    ///
    /// A bundled schema that fails to compile rejects every document.
    pub fn passport() -> Self {
        let compiled = serde_json::from_str::<Value>(PASSPORT_SCHEMA)
            .map_err(|e| PassportError::InvalidSchema(e.to_string()))
            .and_then(|schema| Self::compile(&schema));
        match compiled {
            Ok(oracle) => oracle,
            Err(e) => {
                tracing::error!(error = %e, "Bundled passport schema failed to compile");
                Self {
                    validator: Err(e.to_string()),
                }
            }
        }
    }
}

impl Default for JsonSchemaOracle {
    fn default() -> Self {
        Self::passport()
    }
}

impl std::fmt::Debug for JsonSchemaOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaOracle")
            .field("compiled", &self.validator.is_ok())
            .finish()
    }
}

impl SchemaOracle for JsonSchemaOracle {
    fn validate(&self, document: &Value) -> SchemaResult {
        let validator = match &self.validator {
            Ok(validator) => validator,
            Err(reason) => return SchemaResult::from_errors(vec![format!("root: {reason}")]),
        };

        let errors = validator
            .iter_errors(document)
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "root".to_string() } else { path };
                format!("{path}: {error}")
            })
            .collect();
        SchemaResult::from_errors(errors)
    }
}

// ============================================================================
// Format checks
// ============================================================================

/// A format rule this crate enforces on top of the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatViolation {
    Version,
    Algorithm,
    ArtifactSha256,
    PublicKey,
    SignatureHex,
    TimestampInvalid,
    TimestampNotUtc,
    /// Reported by the schema oracle
    Schema(String),
}

impl FormatViolation {
    /// Dotted path of the offending field, `None` for schema messages
    pub fn field(&self) -> Option<&'static str> {
        match self {
            FormatViolation::Version => Some("version"),
            FormatViolation::Algorithm => Some("signature.algo"),
            FormatViolation::ArtifactSha256 => Some("artifact.sha256"),
            FormatViolation::PublicKey => Some("signature.public_key"),
            FormatViolation::SignatureHex => Some("signature.signature"),
            FormatViolation::TimestampInvalid | FormatViolation::TimestampNotUtc => {
                Some("artifact.created_at")
            }
            FormatViolation::Schema(_) => None,
        }
    }
}

impl std::fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatViolation::Version => write!(f, "version must be exactly \"{PASSPORT_VERSION}\""),
            FormatViolation::Algorithm => {
                write!(f, "signature.algo must be exactly \"{SIGNATURE_ALGO}\"")
            }
            FormatViolation::ArtifactSha256 => {
                write!(f, "artifact.sha256 must be exactly 64 hexadecimal characters")
            }
            FormatViolation::PublicKey => {
                write!(f, "signature.public_key must be exactly 64 hexadecimal characters")
            }
            FormatViolation::SignatureHex => {
                write!(f, "signature.signature must be exactly 128 hexadecimal characters")
            }
            FormatViolation::TimestampInvalid => {
                write!(f, "artifact.created_at must be a valid ISO8601 timestamp")
            }
            FormatViolation::TimestampNotUtc => {
                write!(f, "artifact.created_at must be in UTC (end with Z)")
            }
            FormatViolation::Schema(message) => f.write_str(message),
        }
    }
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn str_at<'a>(document: &'a Value, pointer: &str) -> Option<&'a str> {
    document.pointer(pointer).and_then(Value::as_str)
}

/// Run the format checks alone
pub fn check_formats(document: &Value) -> Vec<FormatViolation> {
    let mut violations = Vec::new();

    if let Some(sha) = str_at(document, "/artifact/sha256") {
        if !is_hex_of_len(sha, 64) {
            violations.push(FormatViolation::ArtifactSha256);
        }
    }

    if let Some(pk) = str_at(document, "/signature/public_key") {
        if !is_hex_of_len(pk, 64) {
            violations.push(FormatViolation::PublicKey);
        }
    }

    if let Some(sig) = str_at(document, "/signature/signature") {
        if !is_hex_of_len(sig, 128) {
            violations.push(FormatViolation::SignatureHex);
        }
    }

    if let Some(created_at) = str_at(document, "/artifact/created_at") {
        if DateTime::parse_from_rfc3339(created_at).is_err() {
            violations.push(FormatViolation::TimestampInvalid);
        } else if !created_at.ends_with('Z') {
            violations.push(FormatViolation::TimestampNotUtc);
        }
    }

    if document.get("version").and_then(Value::as_str) != Some(PASSPORT_VERSION) {
        violations.push(FormatViolation::Version);
    }

    if str_at(document, "/signature/algo") != Some(SIGNATURE_ALGO) {
        violations.push(FormatViolation::Algorithm);
    }

    violations
}

// ============================================================================
// Validator
// ============================================================================

/// Aggregated outcome of structural validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<FormatViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Every violation as a message, schema findings first
    pub fn errors(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Schema oracle plus format checks
#[derive(Clone)]
pub struct StructuralValidator {
    oracle: Arc<dyn SchemaOracle>,
}

impl std::fmt::Debug for StructuralValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralValidator").finish_non_exhaustive()
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new(Arc::new(JsonSchemaOracle::passport()))
    }
}

impl StructuralValidator {
    pub fn new(oracle: Arc<dyn SchemaOracle>) -> Self {
        Self { oracle }
    }

    /// Validate a document, collecting every violation
    pub fn validate(&self, document: &Value) -> ValidationReport {
        let schema = self.oracle.validate(document);
        let mut violations: Vec<FormatViolation> = schema
            .errors
            .into_iter()
            .map(FormatViolation::Schema)
            .collect();
        if !schema.valid && violations.is_empty() {
            violations.push(FormatViolation::Schema("root: schema validation failed".into()));
        }
        violations.extend(check_formats(document));
        ValidationReport { violations }
    }
}
