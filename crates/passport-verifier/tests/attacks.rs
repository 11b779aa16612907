//! Attack Scenario Tests
//!
//! Each test is a concrete way someone might try to pass off an artifact or
//! passport that is not what it claims to be. Every one must end in `fail`.

use std::sync::Arc;

use passport_core::signing::attach_signature;
use passport_core::{KeyPair, PassportBuilder};
use passport_discovery::{ArtifactInput, AuxiliaryFile, Discovery, InMemoryFetcher};
use passport_verifier::{Stage, Status, VerificationReport, Verifier, VerifierConfig};
use serde_json::{json, Value};

const CONTENT: &[u8] = b"quarterly-report-final.pdf contents";

// =============================================================================
// Test Helpers
// =============================================================================

fn verifier() -> Verifier {
    Verifier::builder(VerifierConfig::default())
        .with_fetcher(Arc::new(InMemoryFetcher::new()))
        .with_discovery(Discovery::new())
        .build()
        .unwrap()
}

fn signed(key: &KeyPair) -> Value {
    PassportBuilder::for_bytes("report.pdf", CONTENT)
        .sign(key)
        .unwrap()
        .to_value()
        .unwrap()
}

async fn verify(content: &[u8], passport: &Value) -> VerificationReport {
    let artifact = ArtifactInput::from_bytes("report.pdf", content.to_vec()).with_auxiliary(
        AuxiliaryFile::new("report.pdf.passport.json", passport.to_string().into_bytes()),
    );
    verifier().verify(&artifact).await.unwrap()
}

// =============================================================================
// ATTACK: Content Substitution
// =============================================================================

/// Swap the artifact for different content and keep the original passport.
#[tokio::test]
async fn attack_content_substitution_prevented() {
    let passport = signed(&KeyPair::generate());
    let report = verify(b"malicious replacement", &passport).await;

    assert_eq!(report.status, Status::Fail);
    assert_eq!(report.stage, Stage::HashChecking);
}

/// Swap the content and rewrite `artifact.sha256` to match it.
#[tokio::test]
async fn attack_hash_rewrite_prevented() {
    let mut passport = signed(&KeyPair::generate());
    let replacement = b"malicious replacement";
    passport["artifact"]["sha256"] = json!(passport_core::sha256_hex(replacement));

    let report = verify(replacement, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert_eq!(report.signature_valid, Some(false));
}

/// Downgrade the binding to `c2pa-claim` in a companion file to skip the
/// byte comparison.
#[tokio::test]
async fn attack_binding_downgrade_prevented() {
    let key = KeyPair::generate();
    let mut body = signed(&key);
    body["artifact"]["hash_binding"] = json!("c2pa-claim");
    // even re-signed by the attacker the companion binding is compared directly
    let passport = attach_signature(body, &key).unwrap();

    let report = verify(b"malicious replacement", &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert!(report.hash_checked);
}

// =============================================================================
// ATTACK: Signature Manipulation
// =============================================================================

/// Remove the signature block entirely.
#[tokio::test]
async fn attack_signature_stripping_prevented() {
    let mut passport = signed(&KeyPair::generate());
    passport.as_object_mut().unwrap().remove("signature");

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert_eq!(report.stage, Stage::StructurallyValidating);
}

/// Claim a weaker or different algorithm.
#[tokio::test]
async fn attack_algorithm_substitution_prevented() {
    let mut passport = signed(&KeyPair::generate());
    passport["signature"]["algo"] = json!("none");

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert!(report
        .details
        .iter()
        .any(|d| d == "signature.algo must be exactly \"ed25519\""));
}

/// Replace the public key with the attacker's while keeping the victim's
/// signature and key id.
#[tokio::test]
async fn attack_key_substitution_prevented() {
    let victim = KeyPair::generate();
    let attacker = KeyPair::generate();
    let mut passport = signed(&victim);
    passport["signature"]["public_key"] = json!(attacker.public_key_hex());

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert_eq!(report.details, vec!["Key ID does not match public key".to_string()]);
}

/// Sign with the attacker's key but declare the victim's key id so the
/// report appears to name the victim.
#[tokio::test]
async fn attack_key_id_impersonation_prevented() {
    let victim = KeyPair::generate();
    let attacker = KeyPair::generate();
    let mut passport = signed(&attacker);
    passport["signature"]["key_id"] = json!(victim.key_id());

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert_ne!(report.key_id.as_deref(), Some(victim.key_id()));
}

/// Add a field after signing, e.g. a fake approval.
#[tokio::test]
async fn attack_field_injection_prevented() {
    let mut passport = signed(&KeyPair::generate());
    passport["review"] = json!({"reviewer": "ceo", "approved": true});

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert_eq!(report.signature_valid, Some(false));
}

/// Reorder and reformat the passport; this is not an attack and must pass.
#[tokio::test]
async fn reformatting_is_not_tampering() {
    let passport = signed(&KeyPair::generate());
    let pretty = serde_json::to_string_pretty(&passport).unwrap();
    let reparsed: Value = serde_json::from_str(&pretty).unwrap();

    let report = verify(CONTENT, &reparsed).await;
    assert_eq!(report.status, Status::Pass, "{:?}", report.error);
}

// =============================================================================
// ATTACK: Format Confusion
// =============================================================================

/// Offset timestamps are rejected rather than normalized.
#[tokio::test]
async fn attack_non_utc_timestamp_rejected() {
    let key = KeyPair::generate();
    let mut body = signed(&key);
    body["artifact"]["created_at"] = json!("2024-08-19T17:30:00+02:00");
    let passport = attach_signature(body, &key).unwrap();

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert!(report
        .details
        .iter()
        .any(|d| d == "artifact.created_at must be in UTC (end with Z)"));
}

/// Truncated or padded hex is rejected with the length-specific message.
#[tokio::test]
async fn attack_truncated_signature_rejected() {
    let mut passport = signed(&KeyPair::generate());
    let sig = passport["signature"]["signature"].as_str().unwrap().to_string();
    passport["signature"]["signature"] = json!(&sig[..127]);

    let report = verify(CONTENT, &passport).await;
    assert_eq!(report.status, Status::Fail);
    assert!(report
        .details
        .iter()
        .any(|d| d == "signature.signature must be exactly 128 hexadecimal characters"));
}
