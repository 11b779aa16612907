//! SHA-256 content hashing and key identifiers

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Prefix carried by every derived key identifier
pub const KEY_ID_PREFIX: &str = "ppk_";

/// Number of digest hex characters kept in a key identifier
const KEY_ID_HEX_LEN: usize = 16;

/// Compute the SHA-256 digest of `bytes`
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Compute the SHA-256 digest of `bytes` as lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// Stream a file through SHA-256 and return the lowercase hex digest
pub fn sha256_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Derive the stable key identifier for an Ed25519 public key
///
/// The key is hex encoded (lowercase), the hex string's UTF-8 bytes are
/// hashed, and the first 16 hex characters of that digest are prefixed
/// with `ppk_`.
pub fn key_id(public_key: &[u8]) -> String {
    key_id_from_hex(&hex::encode(public_key))
}

/// Derive a key identifier from a hex-encoded public key
///
/// Uppercase input is normalised first so both spellings of the same key
/// agree.
pub fn key_id_from_hex(public_key_hex: &str) -> String {
    let digest = sha256_hex(public_key_hex.to_ascii_lowercase().as_bytes());
    format!("{KEY_ID_PREFIX}{}", &digest[..KEY_ID_HEX_LEN])
}

/// Compare two hex digests ignoring ASCII case
///
/// Equal-length inputs are compared in constant time: every byte pair is
/// folded into the result and there is no early exit on the first
/// difference. Only the length comparison short-circuits.
pub fn hex_digest_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| {
            acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase())
        });
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hello() {
        assert_eq!(
            sha256_hex(b"Hello, Provenance World!\n"),
            "adbfe40a85bb355d73c35b895d2eb66a76281695d5dcf499e673faba8f213d4d"
        );
    }

    #[test]
    fn test_sha256_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(&data));
    }

    #[test]
    fn test_key_id_format() {
        let id = key_id(&[7u8; 32]);
        assert!(id.starts_with(KEY_ID_PREFIX));
        assert_eq!(id.len(), KEY_ID_PREFIX.len() + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_key_id_hashes_hex_text_not_raw_bytes() {
        let key = [0u8; 32];
        let expected = format!("ppk_{}", &sha256_hex("0".repeat(64).as_bytes())[..16]);
        assert_eq!(key_id(&key), expected);
        assert_ne!(key_id(&key), format!("ppk_{}", &sha256_hex(&key)[..16]));
    }

    #[test]
    fn test_key_id_case_insensitive_hex() {
        let lower = "ab".repeat(32);
        let upper = "AB".repeat(32);
        assert_eq!(key_id_from_hex(&lower), key_id_from_hex(&upper));
        assert_eq!(key_id_from_hex(&lower), key_id(&[0xab; 32]));
    }

    #[test]
    fn test_hex_digest_eq() {
        assert!(hex_digest_eq("ABCDEF", "abcdef"));
        assert!(!hex_digest_eq("abcdef", "abcde0"));
        assert!(!hex_digest_eq("abc", "abcd"));
        assert!(hex_digest_eq("", ""));
    }

    #[test]
    fn test_hex_digest_eq_checks_every_position() {
        let digest = sha256_hex(b"artifact");
        assert!(hex_digest_eq(&digest, &digest.to_ascii_uppercase()));
        for i in 0..digest.len() {
            let mut altered = digest.clone().into_bytes();
            altered[i] = if altered[i] == b'0' { b'1' } else { b'0' };
            let altered = String::from_utf8(altered).unwrap();
            assert!(!hex_digest_eq(&digest, &altered), "difference at {i} missed");
        }
    }
}
