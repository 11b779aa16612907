//! Passport document model
//!
//! A passport is a signed JSON document asserting an artifact's hash,
//! creation metadata, processing history and policy attestations.
//!
//! Every struct keeps the fields it does not know about in an `extra` map so
//! parsing and re-serializing a document never drops content that a
//! signature covers. Signature verification itself always runs over the raw
//! JSON value, never over a re-serialized model.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::KeyPair;
use crate::digest::sha256_hex;
use crate::error::Result;
use crate::signing;

/// The only passport version this crate produces and accepts
pub const PASSPORT_VERSION: &str = "0.1";

/// The only signature algorithm this crate produces and accepts
pub const SIGNATURE_ALGO: &str = "ed25519";

/// Unknown fields preserved verbatim
pub type Extra = BTreeMap<String, Value>;

// ============================================================================
// Passport
// ============================================================================

/// A provenance passport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passport {
    /// Format version, exactly `"0.1"`
    pub version: String,

    /// The artifact this passport describes
    pub artifact: Artifact,

    /// Prior artifacts or external references consumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputRef>>,

    /// Processing history in execution order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    /// Human or automated sign-off record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<Value>,

    /// Policy attestations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_checks: Option<Vec<PolicyCheck>>,

    /// Ed25519 signature over everything else
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Passport {
    /// Parse a passport from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Convert a JSON value into a passport
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Convert the passport into a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Pretty-printed JSON, as written to companion files
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of recorded processing steps
    pub fn steps_count(&self) -> usize {
        self.steps.as_ref().map_or(0, Vec::len)
    }

    /// Number of policy checks whose result is `pass`
    pub fn policies_passed(&self) -> usize {
        self.policy_checks.as_ref().map_or(0, |checks| {
            checks
                .iter()
                .filter(|c| c.result == Some(PolicyResult::Pass))
                .count()
        })
    }

    /// Declared key identifier, if the passport is signed and declares one
    pub fn key_id(&self) -> Option<&str> {
        self.signature.as_ref().and_then(|s| s.key_id.as_deref())
    }
}

// ============================================================================
// Artifact
// ============================================================================

/// How the declared artifact hash relates to verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashBinding {
    /// Direct comparison against the artifact bytes
    #[serde(rename = "bytes")]
    Bytes,
    /// Content hash attested inside the container's own integrity chain
    #[serde(rename = "c2pa-claim")]
    C2paClaim,
}

impl HashBinding {
    /// Wire name of the binding
    pub fn as_str(&self) -> &'static str {
        match self {
            HashBinding::Bytes => "bytes",
            HashBinding::C2paClaim => "c2pa-claim",
        }
    }
}

/// The artifact a passport describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// SHA-256 of the artifact bytes, hex
    pub sha256: String,

    /// MIME type
    pub mime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SS[.mmm]Z`
    pub created_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_binding: Option<HashBinding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Artifact {
    /// Describe artifact bytes with a direct byte hash binding
    ///
    /// The MIME type is guessed from `name`'s extension and `created_at`
    /// is set to now.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let name = name.into();
        let size = bytes.len() as u64;
        Self {
            sha256: sha256_hex(bytes),
            mime: mime_for_path(&name).to_string(),
            name: Some(name),
            size: Some(size),
            created_at: format_timestamp(Utc::now()),
            hash_binding: Some(HashBinding::Bytes),
            byte_size: Some(size),
            extra: Extra::new(),
        }
    }

    /// Read an artifact from disk and describe it
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_bytes(name, &bytes))
    }

    /// Effective binding, `bytes` when none is declared
    pub fn binding(&self) -> HashBinding {
        self.hash_binding.unwrap_or(HashBinding::Bytes)
    }
}

/// Format a timestamp the way producers write `created_at`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Guess a MIME type from a file name's extension
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "ts" => "application/typescript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/x-yaml",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Inputs, steps, policy checks
// ============================================================================

/// A prior artifact or external reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRef {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl InputRef {
    /// Reference an input by content hash
    pub fn source(name: impl Into<String>, bytes: &[u8]) -> Self {
        let mut extra = Extra::new();
        extra.insert("size".into(), Value::from(bytes.len() as u64));
        Self {
            kind: Some("source".into()),
            sha256: Some(sha256_hex(bytes)),
            url: None,
            name: Some(name.into()),
            role: Some("input".into()),
            extra,
        }
    }

    /// Reference an external resource by URL
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: Some("url".into()),
            sha256: None,
            url: Some(url.into()),
            name: None,
            role: None,
            extra: Extra::new(),
        }
    }
}

/// A recorded command, either a shell line or an argv list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepCommand {
    Line(String),
    Argv(Vec<String>),
}

/// One processing step
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<StepCommand>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,

    /// Free-form actor record, e.g. `{"type": "software", "id": "pp-cli"}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Value>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Step {
    /// A step that ran a shell command line
    pub fn command(action: impl Into<String>, command: impl Into<String>) -> Self {
        let command = command.into();
        let tool = command.split_whitespace().next().map(str::to_string);
        Self {
            action: Some(action.into()),
            tool,
            command: Some(StepCommand::Line(command)),
            ..Self::default()
        }
    }

    /// Record the step's time span
    pub fn with_span(mut self, started: DateTime<Utc>, ended: DateTime<Utc>) -> Self {
        self.started_at = Some(format_timestamp(started));
        self.ended_at = Some(format_timestamp(ended));
        self
    }

    /// Record who ran the step
    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyResult {
    Pass,
    Fail,
    Warning,
}

/// One policy attestation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub policy: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PolicyResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl PolicyCheck {
    pub fn new(policy: impl Into<String>, result: PolicyResult) -> Self {
        Self {
            policy: policy.into(),
            result: Some(result),
            details: None,
            extra: Extra::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// Signature
// ============================================================================

/// The `signature` block of a passport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Exactly `"ed25519"`
    pub algo: String,

    /// 32-byte public key, hex
    pub public_key: String,

    /// 64-byte signature, hex
    pub signature: String,

    /// Derived key identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for unsigned passports
///
/// ```
/// use passport_core::{KeyPair, PassportBuilder, PolicyCheck, PolicyResult, Step};
///
/// let key = KeyPair::generate();
/// let passport = PassportBuilder::for_bytes("report.txt", b"hello")
///     .step(Step::command("render", "pandoc report.md -o report.txt"))
///     .policy_check(PolicyCheck::new("no-secrets", PolicyResult::Pass))
///     .sign(&key)
///     .unwrap();
///
/// assert_eq!(passport.artifact.mime, "text/plain");
/// assert!(passport.signature.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct PassportBuilder {
    artifact: Artifact,
    inputs: Vec<InputRef>,
    steps: Vec<Step>,
    review: Option<Value>,
    policy_checks: Vec<PolicyCheck>,
}

impl PassportBuilder {
    /// Start from an artifact description
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            inputs: Vec::new(),
            steps: Vec::new(),
            review: None,
            policy_checks: Vec::new(),
        }
    }

    /// Start from artifact bytes
    pub fn for_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(Artifact::from_bytes(name, bytes))
    }

    /// Override the creation timestamp
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.artifact.created_at = format_timestamp(at);
        self
    }

    pub fn input(mut self, input: InputRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn review(mut self, review: Value) -> Self {
        self.review = Some(review);
        self
    }

    pub fn policy_check(mut self, check: PolicyCheck) -> Self {
        self.policy_checks.push(check);
        self
    }

    /// Build the unsigned passport
    ///
    /// Empty lists are omitted rather than written as `[]`.
    pub fn build(self) -> Passport {
        fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
            (!items.is_empty()).then_some(items)
        }

        Passport {
            version: PASSPORT_VERSION.to_string(),
            artifact: self.artifact,
            inputs: non_empty(self.inputs),
            steps: non_empty(self.steps),
            review: self.review,
            policy_checks: non_empty(self.policy_checks),
            signature: None,
            extra: Extra::new(),
        }
    }

    /// Build and sign in one step
    pub fn sign(self, key: &KeyPair) -> Result<Passport> {
        key.sign_passport(self.build())
    }
}

impl KeyPair {
    /// Sign a passport, replacing any existing signature
    pub fn sign_passport(&self, mut passport: Passport) -> Result<Passport> {
        passport.signature = None;
        let document = passport.to_value()?;
        passport.signature = Some(signing::sign_document(&document, self)?);
        Ok(passport)
    }
}
