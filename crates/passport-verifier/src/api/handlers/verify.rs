//! Verification Handlers
//!
//! Artifacts arrive base64-encoded, optionally with auxiliary files such as
//! a dropped `<name>.passport.json`.

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use passport_discovery::{ArtifactInput, AuxiliaryFile};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::report::{BatchReport, Severity, VerificationReport};

/// Most artifacts accepted in one batch request
pub const MAX_BATCH_SIZE: usize = 100;

/// An artifact to verify
#[derive(Debug, Deserialize)]
pub struct ArtifactBody {
    /// File name, used for companion matching
    pub name: String,

    /// Base64-encoded artifact bytes
    pub content: String,

    /// Files supplied alongside the artifact
    #[serde(default)]
    pub auxiliary: Vec<AuxiliaryBody>,
}

/// An auxiliary file
#[derive(Debug, Deserialize)]
pub struct AuxiliaryBody {
    pub name: String,

    /// Base64-encoded file bytes
    pub content: String,
}

impl ArtifactBody {
    fn into_input(self) -> Result<ArtifactInput, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Artifact name cannot be empty".into()));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(ApiError::BadRequest(
                "Artifact name must be a file name, not a path".into(),
            ));
        }

        let bytes = STANDARD.decode(&self.content)?;
        let mut input = ArtifactInput::from_bytes(name, bytes);
        for aux in self.auxiliary {
            let bytes = STANDARD.decode(&aux.content).map_err(|e| {
                ApiError::BadRequest(format!("Invalid base64 in '{}': {}", aux.name, e))
            })?;
            input = input.with_auxiliary(AuxiliaryFile::new(aux.name, bytes));
        }
        Ok(input)
    }
}

/// Verify one artifact
///
/// POST /v1/verify
pub async fn verify_artifact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArtifactBody>,
) -> Result<Json<VerificationReport>, ApiError> {
    let input = request.into_input()?;
    let report = state.verifier.verify(&input).await?;
    Ok(Json(report))
}

/// Request to verify several artifacts
#[derive(Debug, Deserialize)]
pub struct BatchVerifyRequest {
    pub artifacts: Vec<ArtifactBody>,
}

/// Batch results plus the severity the run maps to
#[derive(Debug, Serialize)]
pub struct BatchVerifyResponse {
    #[serde(flatten)]
    pub report: BatchReport,
    pub severity: Severity,
    pub exit_code: i32,
}

/// Verify a batch of artifacts
///
/// POST /v1/verify/batch
pub async fn verify_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchVerifyRequest>,
) -> Result<Json<BatchVerifyResponse>, ApiError> {
    let count = request.artifacts.len();
    if count == 0 {
        return Err(ApiError::BadRequest("No artifacts supplied".into()));
    }
    if count > MAX_BATCH_SIZE {
        return Err(ApiError::BatchTooLarge {
            count,
            max: MAX_BATCH_SIZE,
        });
    }

    let inputs = request
        .artifacts
        .into_iter()
        .map(ArtifactBody::into_input)
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.verifier.verify_batch(inputs).await?;
    let severity = report.severity(state.verifier.config());
    info!(
        run_id = %report.run_id,
        severity = ?severity,
        "Batch request complete"
    );

    Ok(Json(BatchVerifyResponse {
        report,
        exit_code: severity.exit_code(),
        severity,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_input_decodes_everything() {
        let body = ArtifactBody {
            name: "hello.txt".into(),
            content: STANDARD.encode(b"hello"),
            auxiliary: vec![AuxiliaryBody {
                name: "hello.txt.passport.json".into(),
                content: STANDARD.encode(b"{}"),
            }],
        };

        let input = body.into_input().unwrap();
        assert_eq!(input.bytes, b"hello");
        assert_eq!(input.auxiliary[0].bytes, b"{}");
        assert!(input.path.is_none());
    }

    #[test]
    fn test_into_input_rejects_bad_requests() {
        let bad_base64 = ArtifactBody {
            name: "a".into(),
            content: "!!!".into(),
            auxiliary: vec![],
        };
        assert!(matches!(bad_base64.into_input(), Err(ApiError::BadRequest(_))));

        let path_name = ArtifactBody {
            name: "../etc/passwd".into(),
            content: String::new(),
            auxiliary: vec![],
        };
        assert!(matches!(path_name.into_input(), Err(ApiError::BadRequest(_))));

        let empty_name = ArtifactBody {
            name: "  ".into(),
            content: String::new(),
            auxiliary: vec![],
        };
        assert!(matches!(empty_name.into_input(), Err(ApiError::BadRequest(_))));
    }
}
