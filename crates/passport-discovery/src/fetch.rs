//! HTTP fetch seam
//!
//! Pointer resolution and revocation feeds both go through [`HttpFetch`].
//! A fetch that completes with any status is `Ok`; callers decide that a
//! non-2xx status means "unreachable". Only transport failures and timeouts
//! are errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, Result};

/// Default request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on a response body
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP GET
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Fetch `url`, returning whatever status the server answered with
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}

/// [`HttpFetch`] over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body: usize,
}

impl ReqwestFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("passport-verifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_body: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Refuse bodies larger than `max_body` bytes
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        debug!(url = %url, "Fetching");
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                DiscoveryError::Timeout(self.timeout)
            } else {
                DiscoveryError::from(e)
            }
        };

        let too_large = || {
            warn!(url = %url, limit = self.max_body, "Response body too large");
            DiscoveryError::BodyTooLarge {
                limit: self.max_body,
            }
        };

        let mut response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            if body.len() + chunk.len() > self.max_body {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status, bytes = body.len(), "Fetched");
        Ok(FetchResponse { status, body })
    }
}

/// In-memory fetcher (for testing)
///
/// Unknown URLs answer 404. Every call is counted so tests can assert how
/// many requests actually went out.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    responses: RwLock<HashMap<String, std::result::Result<FetchResponse, DiscoveryError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a 200 and `body`
    pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.set_response(url, FetchResponse::ok(body));
        self
    }

    /// Answer `url` with a fixed response
    pub fn with_response(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.set_response(url, response);
        self
    }

    /// Fail `url` with a transport error
    pub fn with_error(self, url: impl Into<String>, error: DiscoveryError) -> Self {
        self.responses.write().unwrap().insert(url.into(), Err(error));
        self
    }

    /// Sleep before answering every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the response for `url`
    pub fn set_response(&self, url: impl Into<String>, response: FetchResponse) {
        self.responses.write().unwrap().insert(url.into(), Ok(response));
    }

    /// Number of `get` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for InMemoryFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let responses = self.responses.read().unwrap();
        match responses.get(url) {
            Some(result) => result.clone(),
            None => Ok(FetchResponse::status(404)),
        }
    }
}
