//! Revocation feed cache
//!
//! Entries are keyed by feed URL and expire after a TTL measured on an
//! injected [`Clock`]. Concurrent lookups of the same URL share one fetch:
//! the first caller fetches while the others wait on a per-URL lock and
//! then read what it stored. The per-URL lock is dropped from the map once
//! its last holder releases it. Entries are replaced whole (`Arc` swap) so a
//! reader never sees a half-written feed. A fetch cancelled mid-flight
//! leaves the cache untouched.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use passport_core::RevocationFeed;
use tracing::debug;

/// Failed fetches are remembered for at most this long
pub const FAILURE_TTL: Duration = Duration::from_secs(30);

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to (for testing)
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// A trusted feed, or the reason none could be obtained
pub type FeedOutcome = Result<RevocationFeed, String>;

/// One cache entry
#[derive(Debug)]
pub struct CachedFeed {
    pub fetched_at: Instant,
    pub outcome: FeedOutcome,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

/// A caller's hold on the per-URL fetch lock
///
/// Dropping the last hold removes the lock from the inflight map, also when
/// the fetch future is cancelled.
struct GateHold<'a> {
    inflight: &'a Mutex<HashMap<String, Gate>>,
    url: &'a str,
    gate: Gate,
}

impl Drop for GateHold<'_> {
    fn drop(&mut self) {
        let Ok(mut inflight) = self.inflight.lock() else {
            return;
        };
        // one reference in the map, one here
        let last = Arc::strong_count(&self.gate) == 2
            && inflight
                .get(self.url)
                .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate));
        if last {
            inflight.remove(self.url);
        }
    }
}

/// TTL cache of revocation feeds
pub struct FeedCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<CachedFeed>>>,
    inflight: Mutex<HashMap<String, Gate>>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `url`, if any
    pub fn get(&self, url: &str) -> Option<Arc<CachedFeed>> {
        let entry = self.entries.read().unwrap().get(url).cloned()?;
        self.is_fresh(&entry).then_some(entry)
    }

    /// Return the fresh entry for `url`, fetching it at most once across
    /// concurrent callers
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Arc<CachedFeed>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FeedOutcome>,
    {
        if let Some(entry) = self.get(url) {
            debug!(url = %url, "Using cached revocation feed");
            return entry;
        }

        let hold = GateHold {
            inflight: &self.inflight,
            url,
            gate: self
                .inflight
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .clone(),
        };
        let _guard = hold.gate.lock().await;

        // another caller may have filled it while we waited
        if let Some(entry) = self.get(url) {
            debug!(url = %url, "Revocation feed fetched by concurrent caller");
            return entry;
        }

        let outcome = fetch().await;
        let entry = Arc::new(CachedFeed {
            fetched_at: self.clock.now(),
            outcome,
        });
        self.entries
            .write()
            .unwrap()
            .insert(url.to_string(), entry.clone());
        entry
    }

    /// Drop the entry for `url`
    pub fn invalidate(&self, url: &str) {
        self.entries.write().unwrap().remove(url);
    }

    /// Number of URLs with a fetch lock currently held or awaited
    pub fn pending_fetches(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    fn is_fresh(&self, entry: &CachedFeed) -> bool {
        let ttl = match entry.outcome {
            Ok(_) => self.ttl,
            Err(_) => self.ttl.min(FAILURE_TTL),
        };
        self.clock.now().saturating_duration_since(entry.fetched_at) < ttl
    }
}
