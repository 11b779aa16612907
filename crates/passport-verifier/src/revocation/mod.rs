//! Revocation trust
//!
//! Answers "is this signing key revoked?" from a published feed. Any failure
//! to obtain a trustworthy feed (unreachable, unparseable, bad authority
//! signature) yields [`KeyStatus::Unknown`] rather than an error: the check
//! fails open, and callers that need a definite answer opt into treating
//! `unknown` as blocking.

pub mod cache;

use std::sync::Arc;
use std::time::Duration;

use passport_core::revocation::{verify_feed_signature, FeedSignature};
use passport_core::{KeyStatus, PublicKey, RevocationFeed, RevokedKey};
use passport_discovery::HttpFetch;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use cache::{CachedFeed, Clock, FeedCache, FeedOutcome, ManualClock, SystemClock};

/// Result of a revocation lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevocationCheck {
    pub key_id: String,
    pub status: KeyStatus,
    /// Feed entry when the key is revoked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<RevokedKey>,
    /// Why the status is unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RevocationCheck {
    fn unknown(key_id: &str, reason: impl Into<String>) -> Self {
        Self {
            key_id: key_id.to_string(),
            status: KeyStatus::Unknown,
            revoked: None,
            reason: Some(reason.into()),
        }
    }
}

/// Looks signing keys up in a revocation feed
pub struct RevocationTruster {
    fetcher: Arc<dyn HttpFetch>,
    feed_url: Option<String>,
    authority: Option<PublicKey>,
    cache: FeedCache,
}

impl RevocationTruster {
    pub fn new(fetcher: Arc<dyn HttpFetch>, feed_url: Option<String>, ttl: Duration) -> Self {
        Self {
            fetcher,
            feed_url,
            authority: None,
            cache: FeedCache::new(ttl),
        }
    }

    /// Require the feed to be signed by `authority`
    pub fn with_authority(mut self, authority: PublicKey) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Replace the cache, e.g. to inject a controllable clock
    pub fn with_cache(mut self, cache: FeedCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn feed_url(&self) -> Option<&str> {
        self.feed_url.as_deref()
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// Status of `key_id` according to the configured feed
    pub async fn key_status(&self, key_id: &str) -> RevocationCheck {
        let Some(url) = self.feed_url.as_deref() else {
            return RevocationCheck::unknown(key_id, "no revocation feed configured");
        };

        let entry = self.cache.get_or_fetch(url, || self.load_feed(url)).await;
        let feed = match &entry.outcome {
            Ok(feed) => feed,
            Err(reason) => return RevocationCheck::unknown(key_id, reason.clone()),
        };

        match feed.entry_for(key_id) {
            Some(revoked) => {
                warn!(
                    key_id = %key_id,
                    revoked_at = %revoked.revoked_at,
                    reason = ?revoked.reason,
                    "SECURITY: Signing key is revoked"
                );
                RevocationCheck {
                    key_id: key_id.to_string(),
                    status: KeyStatus::Revoked,
                    revoked: Some(revoked.clone()),
                    reason: None,
                }
            }
            None => RevocationCheck {
                key_id: key_id.to_string(),
                status: KeyStatus::Active,
                revoked: None,
                reason: None,
            },
        }
    }

    async fn load_feed(&self, url: &str) -> FeedOutcome {
        debug!(url = %url, "Fetching revocation feed");

        let response = self.fetcher.get(url).await.map_err(|e| {
            warn!(url = %url, error = %e, "Revocation feed unreachable");
            format!("revocation feed unreachable: {e}")
        })?;
        if !response.is_success() {
            warn!(url = %url, status = response.status, "Revocation feed unreachable");
            return Err(format!("revocation feed unreachable: HTTP {}", response.status));
        }

        let document: Value = serde_json::from_slice(&response.body).map_err(|e| {
            warn!(url = %url, error = %e, "Revocation feed is not JSON");
            format!("revocation feed is not valid JSON: {e}")
        })?;

        if let Some(authority) = &self.authority {
            let verdict = verify_feed_signature(&document, authority)
                .map_err(|e| format!("revocation feed could not be checked: {e}"))?;
            if verdict != FeedSignature::Valid {
                warn!(url = %url, verdict = ?verdict, "Revocation feed not signed by authority");
                return Err(match verdict {
                    FeedSignature::Missing => "revocation feed is unsigned".to_string(),
                    FeedSignature::Malformed => "revocation feed signature is malformed".to_string(),
                    _ => "revocation feed signature is invalid".to_string(),
                });
            }
        }

        let feed = RevocationFeed::from_value(document).map_err(|e| {
            warn!(url = %url, error = %e, "Revocation feed has invalid shape");
            format!("revocation feed is invalid: {e}")
        })?;

        info!(
            url = %url,
            revoked = feed.revoked_keys.len(),
            last_updated = ?feed.last_updated,
            "Revocation feed loaded"
        );
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passport_core::revocation::sign_feed;
    use passport_core::KeyPair;
    use passport_discovery::{FetchResponse, InMemoryFetcher};
    use serde_json::json;

    const URL: &str = "https://feed.test/revoked.json";

    fn feed_doc() -> Value {
        json!({
            "revoked_keys": [
                {"key_id": "ppk_1111222233334444", "revoked_at": "2024-09-01T00:00:00Z", "reason": "compromised"}
            ],
            "last_updated": "2024-09-01T00:00:00Z"
        })
    }

    fn truster(fetcher: InMemoryFetcher) -> RevocationTruster {
        RevocationTruster::new(Arc::new(fetcher), Some(URL.into()), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_revoked_and_active() {
        let t = truster(InMemoryFetcher::new().with_body(URL, feed_doc().to_string()));

        let revoked = t.key_status("ppk_1111222233334444").await;
        assert_eq!(revoked.status, KeyStatus::Revoked);
        assert_eq!(revoked.revoked.unwrap().reason.as_deref(), Some("compromised"));

        let active = t.key_status("ppk_aaaabbbbccccdddd").await;
        assert_eq!(active.status, KeyStatus::Active);
        assert!(active.reason.is_none());
    }

    #[tokio::test]
    async fn test_fail_open_cases() {
        let cases = [
            InMemoryFetcher::new().with_response(URL, FetchResponse::status(503)),
            InMemoryFetcher::new().with_body(URL, "not json"),
            InMemoryFetcher::new().with_body(URL, r#"{"revoked_keys": "nope"}"#),
            InMemoryFetcher::new().with_body(URL, r#"{"last_updated": "x"}"#),
        ];
        for fetcher in cases {
            let check = truster(fetcher).key_status("ppk_1111222233334444").await;
            assert_eq!(check.status, KeyStatus::Unknown);
            assert!(check.reason.is_some());
        }
    }

    #[tokio::test]
    async fn test_no_feed_configured() {
        let t = RevocationTruster::new(
            Arc::new(InMemoryFetcher::new()),
            None,
            Duration::from_secs(300),
        );
        let check = t.key_status("ppk_1111222233334444").await;
        assert_eq!(check.status, KeyStatus::Unknown);
    }

    #[tokio::test]
    async fn test_authority_signature_required() {
        let authority = KeyPair::generate();
        let signed = sign_feed(feed_doc(), &authority).unwrap();

        let t = truster(InMemoryFetcher::new().with_body(URL, signed.to_string()))
            .with_authority(authority.public_key());
        assert_eq!(t.key_status("ppk_1111222233334444").await.status, KeyStatus::Revoked);

        // unsigned feed is rejected once an authority is configured
        let t = truster(InMemoryFetcher::new().with_body(URL, feed_doc().to_string()))
            .with_authority(authority.public_key());
        let check = t.key_status("ppk_1111222233334444").await;
        assert_eq!(check.status, KeyStatus::Unknown);
        assert_eq!(check.reason.as_deref(), Some("revocation feed is unsigned"));

        // a feed signed by someone else is rejected
        let impostor = sign_feed(feed_doc(), &KeyPair::generate()).unwrap();
        let t = truster(InMemoryFetcher::new().with_body(URL, impostor.to_string()))
            .with_authority(authority.public_key());
        assert_eq!(t.key_status("ppk_1111222233334444").await.status, KeyStatus::Unknown);
    }

    #[tokio::test]
    async fn test_feed_fetched_once_per_ttl() {
        let fetcher = Arc::new(InMemoryFetcher::new().with_body(URL, feed_doc().to_string()));
        let clock = Arc::new(ManualClock::new());
        let t = RevocationTruster::new(fetcher.clone(), Some(URL.into()), Duration::from_secs(300))
            .with_cache(FeedCache::with_clock(Duration::from_secs(300), clock.clone()));

        t.key_status("ppk_a").await;
        t.key_status("ppk_b").await;
        assert_eq!(fetcher.calls(), 1);

        clock.advance(Duration::from_secs(301));
        t.key_status("ppk_a").await;
        assert_eq!(fetcher.calls(), 2);
    }
}
