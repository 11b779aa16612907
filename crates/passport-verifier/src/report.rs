//! Verification reports and batch summaries

use chrono::{DateTime, Utc};
use passport_core::KeyStatus;
use passport_discovery::PassportSource;
use serde::{Deserialize, Serialize};

use crate::config::VerifierConfig;

/// Final verdict for one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Warning,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline state a verification finished in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovering,
    StructurallyValidating,
    HashChecking,
    SignatureVerifying,
    RevocationChecking,
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Discovering => "discovering",
            Stage::StructurallyValidating => "structurally_validating",
            Stage::HashChecking => "hash_checking",
            Stage::SignatureVerifying => "signature_verifying",
            Stage::RevocationChecking => "revocation_checking",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Outcome of verifying one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Artifact name as supplied
    pub artifact: String,
    pub status: Status,
    pub passport_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_source: Option<PassportSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_status: Option<KeyStatus>,
    /// SHA-256 of the artifact bytes as computed here
    pub artifact_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub steps_count: usize,
    #[serde(default)]
    pub policies_passed: usize,
    /// Whether the byte-level hash comparison ran
    #[serde(default)]
    pub hash_checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    pub stage: Stage,
}

impl VerificationReport {
    /// Report with nothing established yet
    pub fn new(artifact: impl Into<String>, artifact_hash: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            status: Status::Warning,
            passport_found: false,
            passport_source: None,
            signature_valid: None,
            key_id: None,
            key_status: None,
            artifact_hash: artifact_hash.into(),
            created_at: None,
            steps_count: 0,
            policies_passed: 0,
            hash_checked: false,
            error: None,
            details: Vec::new(),
            stage: Stage::Discovering,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Pass/fail/warning counts over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a VerificationReport>) -> Self {
        reports.into_iter().fold(Self::default(), |mut summary, report| {
            summary.total += 1;
            match report.status {
                Status::Pass => summary.passed += 1,
                Status::Fail => summary.failed += 1,
                Status::Warning => summary.warnings += 1,
            }
            summary
        })
    }
}

/// Results of a batch run, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    /// When the last artifact finished
    pub completed_at: DateTime<Utc>,
    pub summary: Summary,
    pub results: Vec<VerificationReport>,
}

impl BatchReport {
    pub fn severity(&self, config: &VerifierConfig) -> Severity {
        Severity::classify(&self.summary, config)
    }
}

/// Severity of a run, for mapping onto process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Failure,
    /// Warnings present and missing passports are fatal
    MissingWarning,
    /// Warnings present in strict mode
    StrictWarning,
}

impl Severity {
    /// Highest-precedence severity that applies:
    /// failure, then fail-on-missing, then strict, then success
    pub fn classify(summary: &Summary, config: &VerifierConfig) -> Self {
        if summary.failed > 0 {
            Severity::Failure
        } else if summary.warnings > 0 && config.fail_on_missing {
            Severity::MissingWarning
        } else if summary.warnings > 0 && config.strict_on_warning {
            Severity::StrictWarning
        } else {
            Severity::Success
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Severity::Success => 0,
            Severity::Failure => 1,
            Severity::MissingWarning => 2,
            Severity::StrictWarning => 4,
        }
    }
}
