//! Canonicalization Handler
//!
//! Returns the canonical form a signer would sign, to debug interoperability
//! between implementations.

use axum::Json;
use serde::Serialize;
use serde_json::Value;

use passport_core::canonical::canonicalize_to_string;
use passport_core::sha256_hex;

use crate::api::error::ApiError;

/// Canonical text and its digest
#[derive(Debug, Serialize)]
pub struct CanonicalizeResponse {
    pub canonical: String,
    pub sha256: String,
}

/// Canonicalize an arbitrary JSON document
///
/// POST /v1/canonicalize
pub async fn canonicalize(Json(document): Json<Value>) -> Result<Json<CanonicalizeResponse>, ApiError> {
    let canonical = canonicalize_to_string(&document)?;
    let sha256 = sha256_hex(canonical.as_bytes());
    Ok(Json(CanonicalizeResponse { canonical, sha256 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_canonicalize() {
        let Json(response) = canonicalize(Json(json!({"b": 2, "a": 1, "c": [1e30, 2.5]})))
            .await
            .unwrap();
        assert_eq!(response.canonical, r#"{"a":1,"b":2,"c":[1e+30,2.5]}"#);
        assert_eq!(response.sha256, sha256_hex(response.canonical.as_bytes()));
    }
}
