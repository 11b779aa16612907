//! Verification orchestrator
//!
//! Drives one artifact through the pipeline:
//!
//! ```text
//! Discovering ─┬─ not found ──────────────────────────────► warning
//!              └─ found ─► StructurallyValidating ─ invalid ► fail
//!                          └─► HashChecking ─ mismatch ────► fail
//!                              └─► SignatureVerifying ─ bad ► fail
//!                                  └─► RevocationChecking ─ revoked ► fail
//!                                      └─► pass
//! ```
//!
//! Every expected condition ends in a [`VerificationReport`]. Only engine
//! faults surface as `Err`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use passport_core::digest::hex_digest_eq;
use passport_core::signing::verify_document;
use passport_core::{HashBinding, KeyStatus, Passport, StructuralValidator};
use passport_discovery::readers::C2paToolReader;
use passport_discovery::{
    ArtifactInput, BindingHint, Candidate, Discovery, DiscoveryOutcome, HttpFetch, ReqwestFetcher,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::VerifierConfig;
use crate::error::EngineFault;
use crate::report::{BatchReport, Stage, Status, Summary, VerificationReport};
use crate::revocation::{FeedCache, RevocationTruster};

/// Verifies artifacts against their passports
pub struct Verifier {
    config: VerifierConfig,
    discovery: Discovery,
    validator: StructuralValidator,
    revocation: RevocationTruster,
}

impl Verifier {
    /// Verifier with production collaborators: `c2patool`, filesystem
    /// companions and a reqwest fetcher
    pub fn from_config(config: VerifierConfig) -> Result<Self, EngineFault> {
        VerifierBuilder::new(config).build()
    }

    pub fn builder(config: VerifierConfig) -> VerifierBuilder {
        VerifierBuilder::new(config)
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn revocation(&self) -> &RevocationTruster {
        &self.revocation
    }

    /// Verify one artifact
    pub async fn verify(&self, artifact: &ArtifactInput) -> Result<VerificationReport, EngineFault> {
        let mut report = VerificationReport::new(&artifact.name, artifact.sha256());
        debug!(artifact = %artifact.name, hash = %report.artifact_hash, "Discovering passport");

        let candidate = match self.discovery.discover(artifact).await {
            DiscoveryOutcome::Found(candidate) => candidate,
            DiscoveryOutcome::NotFound => {
                return Ok(finish(
                    report,
                    Status::Warning,
                    "No passport found",
                    vec!["No embedded manifest, container part or companion file".into()],
                ));
            }
            DiscoveryOutcome::PointerUnresolved { pointer, reason } => {
                return Ok(finish(
                    report,
                    Status::Warning,
                    "Passport pointer could not be resolved",
                    vec![format!("Pointer sha256: {}", pointer.sha256), reason],
                ));
            }
        };
        report.passport_found = true;
        report.passport_source = Some(candidate.source);

        report.stage = Stage::StructurallyValidating;
        let (document, passport) = match self.validate(&candidate) {
            Ok(parsed) => parsed,
            Err(details) => {
                let error = format!("Invalid passport format: {}", details.join("; "));
                return Ok(finish(report, Status::Fail, error, details));
            }
        };
        report.created_at = Some(passport.artifact.created_at.clone());
        report.steps_count = passport.steps_count();
        report.policies_passed = passport.policies_passed();
        report.key_id = passport.key_id().map(str::to_string);

        report.stage = Stage::HashChecking;
        if let Some(pinned) = &candidate.pinned_sha256 {
            if !hex_digest_eq(pinned, &passport.artifact.sha256) {
                warn!(
                    artifact = %artifact.name,
                    pointer = %pinned,
                    declared = %passport.artifact.sha256,
                    "SECURITY: Pointer target describes a different artifact"
                );
                let details = vec![
                    format!("Expected: {pinned}"),
                    format!("Got: {}", passport.artifact.sha256),
                ];
                return Ok(finish(
                    report,
                    Status::Fail,
                    "Passport does not match container pointer",
                    details,
                ));
            }
        }
        if requires_hash_check(candidate.binding, &passport) {
            report.hash_checked = true;
            if !hex_digest_eq(&passport.artifact.sha256, &report.artifact_hash) {
                warn!(
                    artifact = %artifact.name,
                    expected = %passport.artifact.sha256,
                    actual = %report.artifact_hash,
                    "SECURITY: Artifact hash does not match passport"
                );
                let details = vec![
                    format!("Expected: {}", passport.artifact.sha256),
                    format!("Got: {}", report.artifact_hash),
                ];
                return Ok(finish(
                    report,
                    Status::Fail,
                    "Content hash mismatch - file may have been modified",
                    details,
                ));
            }
        } else {
            debug!(artifact = %artifact.name, source = %candidate.source, "Hash binding attested by container");
        }

        report.stage = Stage::SignatureVerifying;
        let signature = verify_document(&document)?;
        report.signature_valid = Some(signature.is_valid());
        if let Some(key_id) = signature.key_id.clone() {
            report.key_id = Some(key_id);
        }
        if let Some(failure) = signature.failure {
            return Ok(finish(
                report,
                Status::Fail,
                "Passport signature verification failed",
                vec![failure.to_string()],
            ));
        }

        report.stage = Stage::RevocationChecking;
        let key_id = report.key_id.clone().unwrap_or_default();
        let check = self.revocation.key_status(&key_id).await;
        report.key_status = Some(check.status);
        match check.status {
            KeyStatus::Revoked => {
                let mut details = Vec::new();
                if let Some(entry) = &check.revoked {
                    details.push(format!("Revoked at: {}", entry.revoked_at));
                    if let Some(reason) = &entry.reason {
                        details.push(format!("Reason: {reason}"));
                    }
                }
                return Ok(finish(report, Status::Fail, "Signing key has been revoked", details));
            }
            KeyStatus::Unknown => {
                let reason = check.reason.unwrap_or_else(|| "unknown".into());
                if self.config.require_revocation_check {
                    return Ok(finish(
                        report,
                        Status::Fail,
                        "Revocation status could not be determined",
                        vec![reason],
                    ));
                }
                report.details.push(format!("Revocation status unknown: {reason}"));
            }
            KeyStatus::Active => {}
        }

        report.stage = Stage::Complete;
        report.status = Status::Pass;
        info!(
            artifact = %artifact.name,
            source = %candidate.source,
            key_id = %key_id,
            key_status = %check.status,
            "Passport verified"
        );
        Ok(report)
    }

    /// Verify a file on disk
    pub async fn verify_path(&self, path: impl AsRef<Path>) -> Result<VerificationReport, EngineFault> {
        let path = path.as_ref();
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                let report = VerificationReport::new(path.display().to_string(), "");
                return Ok(finish(
                    report,
                    Status::Fail,
                    "File not found",
                    vec![path.display().to_string()],
                ));
            }
        }
        let artifact = ArtifactInput::from_path(path).await?;
        self.verify(&artifact).await
    }

    /// Verify many artifacts with bounded concurrency, preserving order
    pub async fn verify_batch(&self, artifacts: Vec<ArtifactInput>) -> Result<BatchReport, EngineFault> {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, count = artifacts.len(), "Starting batch verification");

        let results: Vec<VerificationReport> = stream::iter(artifacts)
            .map(|artifact| async move { self.verify(&artifact).await })
            .buffered(self.config.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        Ok(self.batch_report(run_id, results))
    }

    /// Verify many files on disk
    pub async fn verify_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<BatchReport, EngineFault> {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, count = paths.len(), "Starting batch verification");

        let results: Vec<VerificationReport> = stream::iter(paths)
            .map(|path| self.verify_path(path))
            .buffered(self.config.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;

        Ok(self.batch_report(run_id, results))
    }

    fn batch_report(&self, run_id: String, results: Vec<VerificationReport>) -> BatchReport {
        let summary = Summary::from_reports(&results);
        info!(
            run_id = %run_id,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            warnings = summary.warnings,
            "Batch verification complete"
        );
        BatchReport {
            run_id,
            completed_at: Utc::now(),
            summary,
            results,
        }
    }

    /// Parse and structurally validate a candidate, or explain why not
    fn validate(&self, candidate: &Candidate) -> Result<(Value, Passport), Vec<String>> {
        let document: Value = serde_json::from_slice(&candidate.bytes)
            .map_err(|e| vec![format!("not valid JSON ({e})")])?;

        let validation = self.validator.validate(&document);
        if !validation.is_valid() {
            return Err(validation.errors());
        }

        let passport = Passport::from_value(document.clone()).map_err(|e| vec![e.to_string()])?;
        Ok((document, passport))
    }
}

/// Whether the artifact bytes must be compared to `artifact.sha256`
fn requires_hash_check(binding: BindingHint, passport: &Passport) -> bool {
    match binding {
        BindingHint::ContainerAttested => false,
        BindingHint::DirectBytes => true,
        BindingHint::AsDeclared => passport.artifact.binding() == HashBinding::Bytes,
    }
}

fn finish(
    mut report: VerificationReport,
    status: Status,
    error: impl Into<String>,
    details: Vec<String>,
) -> VerificationReport {
    let error = error.into();
    match status {
        Status::Fail => warn!(
            artifact = %report.artifact,
            stage = %report.stage,
            error = %error,
            "Verification failed"
        ),
        _ => info!(
            artifact = %report.artifact,
            stage = %report.stage,
            error = %error,
            "Verification ended with warning"
        ),
    }
    report.status = status;
    report.error = Some(error);
    report.details.extend(details);
    report
}

/// Builder for [`Verifier`]
pub struct VerifierBuilder {
    config: VerifierConfig,
    fetcher: Option<Arc<dyn HttpFetch>>,
    discovery: Option<Discovery>,
    validator: StructuralValidator,
    feed_cache: Option<FeedCache>,
}

impl VerifierBuilder {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            fetcher: None,
            discovery: None,
            validator: StructuralValidator::default(),
            feed_cache: None,
        }
    }

    /// Fetcher for revocation feeds and, unless discovery is supplied,
    /// pointer resolution
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_validator(mut self, validator: StructuralValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_feed_cache(mut self, cache: FeedCache) -> Self {
        self.feed_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Verifier, EngineFault> {
        let config = self.config;
        config.validate()?;

        let fetcher: Arc<dyn HttpFetch> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(config.fetch_timeout())?),
        };

        let discovery = match self.discovery {
            Some(discovery) => discovery,
            None => {
                let mut builder = Discovery::builder()
                    .with_manifest_reader(C2paToolReader::new())
                    .with_fetcher(fetcher.clone());
                if let Some(base) = &config.manifest_base_url {
                    builder = builder.with_manifest_base_url(base.clone());
                }
                builder.build()
            }
        };

        let mut revocation = RevocationTruster::new(
            fetcher,
            config.revocation_feed_url.clone(),
            config.feed_ttl(),
        );
        if let Some(authority) = config.authority_key()? {
            revocation = revocation.with_authority(authority);
        }
        if let Some(cache) = self.feed_cache {
            revocation = revocation.with_cache(cache);
        }

        info!(
            feed_url = ?config.revocation_feed_url,
            feed_authenticated = config.revocation_authority_key.is_some(),
            manifest_base_url = ?config.manifest_base_url,
            max_concurrency = config.max_concurrency,
            "Verifier configured"
        );

        Ok(Verifier {
            config,
            discovery,
            validator: self.validator,
            revocation,
        })
    }
}
