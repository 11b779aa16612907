//! Key Status Handlers
//!
//! Exposes the revocation truster so viewers can check a signer directly.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use passport_core::digest::KEY_ID_PREFIX;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::revocation::RevocationCheck;

/// Look up a signing key's revocation status
///
/// GET /v1/keys/{key_id}/status
pub async fn key_status(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
) -> Result<Json<RevocationCheck>, ApiError> {
    if !is_key_id(&key_id) {
        return Err(ApiError::BadRequest(format!(
            "Key ID must be '{}' followed by 16 hex characters",
            KEY_ID_PREFIX
        )));
    }

    let check = state.verifier.revocation().key_status(&key_id).await;
    Ok(Json(check))
}

fn is_key_id(candidate: &str) -> bool {
    candidate
        .strip_prefix(KEY_ID_PREFIX)
        .is_some_and(|rest| rest.len() == 16 && rest.bytes().all(|b| b.is_ascii_hexdigit()))
}
