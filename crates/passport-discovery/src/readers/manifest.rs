//! Embedded content-credential manifests
//!
//! The manifest store is the JSON report produced by `c2patool --detailed`.
//! A passport embedded by a producer lives in the assertion labelled
//! [`PASSPORT_ASSERTION`], optionally accompanied by a hash-binding
//! assertion.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, Result};
use crate::source::ArtifactInput;

/// Assertion label carrying the passport
pub const PASSPORT_ASSERTION: &str = "com.provenancepassport.receipt";

/// Assertion label carrying the declared hash binding
pub const HASH_BINDING_ASSERTION: &str = "com.provenancepassport.hash_binding";

/// Default time allowed for an external manifest tool run
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Passport assertion found in a manifest store
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestAssertion {
    pub passport: Value,
    pub hash_binding: Option<Value>,
    /// Failure codes the manifest tool reported for the active manifest
    pub validation_failures: Vec<String>,
}

impl ManifestAssertion {
    /// Whether the manifest itself declares the passport claim-bound
    pub fn declares_claim_binding(&self) -> bool {
        self.hash_binding.as_ref().and_then(Value::as_str) == Some("c2pa-claim")
    }

    /// Whether the tool reported the manifest intact
    pub fn is_intact(&self) -> bool {
        self.validation_failures.is_empty()
    }
}

/// Trait for embedded manifest readers
#[async_trait]
pub trait EmbeddedManifestReader: Send + Sync {
    /// Return the artifact's manifest store, or `None` when it carries none
    async fn inspect(&self, artifact: &ArtifactInput) -> Result<Option<Value>>;

    /// Get a description of this reader (for logging)
    fn description(&self) -> &str {
        "manifest reader"
    }
}

/// Look up the passport assertion in the active manifest of a store
///
/// Accepts `manifests` as either a list or a map keyed by manifest label,
/// and assertions either as a map keyed by assertion label or as a list of
/// `{label, data}` entries. Only the manifest named by `active_manifest` is
/// consulted; a store without one must hold exactly one manifest. Ingredient
/// manifests never contribute a passport.
pub fn find_passport_assertion(store: &Value) -> Option<ManifestAssertion> {
    let manifest = active_manifest(store)?;
    let passport = assertion(manifest, PASSPORT_ASSERTION)?;
    if !passport.is_object() {
        return None;
    }
    Some(ManifestAssertion {
        passport: passport.clone(),
        hash_binding: assertion(manifest, HASH_BINDING_ASSERTION).cloned(),
        validation_failures: validation_failures(store),
    })
}

fn active_manifest(store: &Value) -> Option<&Value> {
    let manifests = store.get("manifests")?;
    match store.get("active_manifest").and_then(Value::as_str) {
        Some(label) => match manifests {
            Value::Object(map) => map.get(label),
            Value::Array(items) => items
                .iter()
                .find(|m| m.get("label").and_then(Value::as_str) == Some(label)),
            _ => None,
        },
        None => match manifests {
            Value::Object(map) if map.len() == 1 => map.values().next(),
            Value::Array(items) if items.len() == 1 => items.first(),
            _ => None,
        },
    }
}

/// Failure codes from `validation_status` and
/// `validation_results.activeManifest.failure`
fn validation_failures(store: &Value) -> Vec<String> {
    let status = store
        .get("validation_status")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    let results = store
        .pointer("/validation_results/activeManifest/failure")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();

    status
        .chain(results)
        .map(|entry| {
            entry
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        })
        .collect()
}

fn assertion<'a>(manifest: &'a Value, label: &str) -> Option<&'a Value> {
    ["assertions", "assertion_store"]
        .iter()
        .filter_map(|key| manifest.get(*key))
        .find_map(|assertions| match assertions {
            Value::Object(map) => map.get(label),
            Value::Array(items) => items
                .iter()
                .find(|item| item.get("label").and_then(Value::as_str) == Some(label))
                .and_then(|item| item.get("data")),
            _ => None,
        })
}

/// Reader that shells out to `c2patool`
///
/// Only artifacts with an on-disk path can be inspected. A missing tool, a
/// non-zero exit or unparseable output all mean "no manifest".
#[derive(Debug, Clone)]
pub struct C2paToolReader {
    program: PathBuf,
    timeout: Duration,
}

impl C2paToolReader {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("c2patool"),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Use a specific executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for C2paToolReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddedManifestReader for C2paToolReader {
    async fn inspect(&self, artifact: &ArtifactInput) -> Result<Option<Value>> {
        let Some(path) = artifact.path.as_ref() else {
            debug!(artifact = %artifact.name, "No path on disk, skipping c2patool");
            return Ok(None);
        };

        let run = Command::new(&self.program)
            .arg("--detailed")
            .arg(path)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(program = %self.program.display(), error = %e, "c2patool unavailable");
                return Ok(None);
            }
            Err(_) => return Err(DiscoveryError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            debug!(
                artifact = %artifact.name,
                status = ?output.status.code(),
                "c2patool reported no manifest"
            );
            return Ok(None);
        }

        match serde_json::from_slice(&output.stdout) {
            Ok(store) => Ok(Some(store)),
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "Unparseable c2patool output");
                Ok(None)
            }
        }
    }

    fn description(&self) -> &str {
        "c2patool"
    }
}

/// In-memory manifest stores keyed by artifact name (for testing)
#[derive(Debug, Default)]
pub struct InMemoryManifestReader {
    stores: RwLock<HashMap<String, Value>>,
}

impl InMemoryManifestReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(self, artifact_name: impl Into<String>, store: Value) -> Self {
        self.stores.write().unwrap().insert(artifact_name.into(), store);
        self
    }

    /// Store whose active manifest holds the passport assertion
    pub fn with_passport(self, artifact_name: impl Into<String>, passport: Value) -> Self {
        self.with_store(artifact_name, passport_store(passport, None))
    }

    /// Store whose active manifest also declares the claim binding
    pub fn with_claim_bound_passport(self, artifact_name: impl Into<String>, passport: Value) -> Self {
        self.with_store(artifact_name, passport_store(passport, Some("c2pa-claim")))
    }
}

fn passport_store(passport: Value, binding: Option<&str>) -> Value {
    let mut assertions = serde_json::Map::new();
    assertions.insert(PASSPORT_ASSERTION.to_string(), passport);
    if let Some(binding) = binding {
        assertions.insert(HASH_BINDING_ASSERTION.to_string(), Value::from(binding));
    }
    serde_json::json!({
        "active_manifest": "urn:uuid:passport",
        "manifests": {
            "urn:uuid:passport": { "assertions": assertions }
        }
    })
}

#[async_trait]
impl EmbeddedManifestReader for InMemoryManifestReader {
    async fn inspect(&self, artifact: &ArtifactInput) -> Result<Option<Value>> {
        Ok(self.stores.read().unwrap().get(&artifact.name).cloned())
    }

    fn description(&self) -> &str {
        "in-memory manifests"
    }
}
