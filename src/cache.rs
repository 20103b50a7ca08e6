//! Single-flight result cache.
//!
//! At most one computation runs per fingerprint. Callers arriving while it
//! runs await the same shared future. Successful results are kept until
//! their TTL expires or they are the least recently used entry when the
//! capacity bound is exceeded. Failures are handed to every waiter and never
//! stored.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{EngineError, Result};

type Flight<V> = Shared<BoxFuture<'static, Result<V>>>;
type Sender<V> = oneshot::Sender<Result<V>>;

/// A stored result.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key the value was computed for.
    pub fingerprint: String,
    /// The cached value.
    pub value: V,
    /// When the computation finished.
    pub computed_at: Instant,
    /// How long the value stays valid.
    pub ttl: Duration,
    last_used: u64,
}

impl<V> CacheEntry<V> {
    /// True once `ttl` has elapsed since `computed_at`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.computed_at) >= self.ttl
    }
}

/// Counters describing cache behaviour since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a stored entry.
    pub hits: u64,
    /// Lookups that found nothing usable (absent or expired).
    pub misses: u64,
    /// Lookups that joined a computation already in flight.
    pub coalesced: u64,
    /// Computations started.
    pub computations: u64,
    /// Computations that ended in an error.
    pub failures: u64,
    /// Entries dropped for capacity or expiry.
    pub evictions: u64,
    /// Results currently stored, expired ones included until evicted.
    pub entries: usize,
}

enum Slot<V> {
    Ready(CacheEntry<V>),
    InFlight { id: u64, flight: Flight<V> },
}

enum Lookup<V> {
    Hit(V),
    Join(Flight<V>),
    Start {
        id: u64,
        sender: Sender<V>,
        flight: Flight<V>,
    },
}

struct CacheState<V> {
    slots: HashMap<String, Slot<V>>,
    tick: u64,
    next_flight: u64,
    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    /// Drops expired entries, then least recently used ones, until at most
    /// `capacity` stored entries remain.
    fn evict(&mut self, capacity: usize, now: Instant) {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| !matches!(slot, Slot::Ready(e) if e.is_expired(now)));
        self.stats.evictions += (before - self.slots.len()) as u64;

        while self.ready_count() > capacity {
            let oldest = self
                .slots
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Ready(e) => Some((e.last_used, key.clone())),
                    Slot::InFlight { .. } => None,
                })
                .min();
            let Some((_, key)) = oldest else { break };
            debug!(fingerprint = %key, "Evicting least recently used cache entry");
            self.slots.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

/// Memoizes computations per fingerprint with single-flight semantics.
pub struct ResultCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache whose entries live for `ttl` and which stores at most
    /// `capacity` results.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                slots: HashMap::new(),
                tick: 0,
                next_flight: 0,
                stats: CacheStats::default(),
            })),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the cached value for `fingerprint`, or runs `compute` once.
    ///
    /// `compute` is only invoked on a miss, after the cache lock has been
    /// released. Its future runs on its own task, so it finishes and
    /// populates the cache even if every caller awaiting it is dropped. An
    /// error is returned to every caller waiting on that computation and the
    /// next lookup starts a fresh one. A panic, in `compute` or in its
    /// future, surfaces as [`EngineError::Internal`].
    pub async fn get_or_compute<F, Fut>(&self, fingerprint: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let lookup = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.tick += 1;
            let tick = state.tick;
            let now = Instant::now();

            match state.slots.get_mut(fingerprint) {
                Some(Slot::Ready(entry)) if !entry.is_expired(now) => {
                    entry.last_used = tick;
                    state.stats.hits += 1;
                    debug!(fingerprint, "Cache hit");
                    Lookup::Hit(entry.value.clone())
                }
                Some(Slot::InFlight { flight, .. }) => {
                    state.stats.coalesced += 1;
                    debug!(fingerprint, "Joining in-flight computation");
                    Lookup::Join(flight.clone())
                }
                _ => {
                    state.stats.misses += 1;
                    state.stats.computations += 1;
                    state.next_flight += 1;
                    let id = state.next_flight;
                    debug!(fingerprint, flight = id, "Cache miss, computing");

                    let (sender, receiver) = oneshot::channel();
                    let flight: Flight<V> = receiver
                        .map(|received| {
                            received.unwrap_or_else(|_| {
                                Err(EngineError::Internal(
                                    "computation dropped before completing".to_string(),
                                ))
                            })
                        })
                        .boxed()
                        .shared();
                    state.slots.insert(
                        fingerprint.to_string(),
                        Slot::InFlight {
                            id,
                            flight: flight.clone(),
                        },
                    );
                    Lookup::Start { id, sender, flight }
                }
            }
        };

        let (id, sender, flight) = match lookup {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Join(flight) => return flight.await,
            Lookup::Start { id, sender, flight } => (id, sender, flight),
        };

        let key = fingerprint.to_string();
        match std::panic::catch_unwind(AssertUnwindSafe(compute)) {
            Ok(computation) => self.spawn_flight(key, id, computation, sender),
            Err(_) => {
                let result = Err(EngineError::Internal(format!(
                    "computation for {key} panicked"
                )));
                finish(&self.state, key, id, &result, self.ttl, self.capacity);
                // Waiters hold `flight`; a missing receiver is not an error.
                let _ = sender.send(result);
            }
        }

        flight.await
    }

    fn spawn_flight<Fut>(&self, key: String, id: u64, computation: Fut, sender: Sender<V>)
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let capacity = self.capacity;

        tokio::spawn(async move {
            let result = match AssertUnwindSafe(computation).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Internal(format!(
                    "computation for {key} panicked"
                ))),
            };
            finish(&state, key, id, &result, ttl, capacity);
            let _ = sender.send(result);
        });
    }

    /// Drops the entry or in-flight computation for `fingerprint`.
    ///
    /// Callers already awaiting an in-flight computation still receive its
    /// result, but the result is not stored.
    pub fn invalidate(&self, fingerprint: &str) -> bool {
        self.state.lock().slots.remove(fingerprint).is_some()
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.ready_count(),
            ..state.stats
        }
    }

    #[cfg(test)]
    fn is_in_flight(&self, fingerprint: &str) -> bool {
        matches!(
            self.state.lock().slots.get(fingerprint),
            Some(Slot::InFlight { .. })
        )
    }
}

/// Records the outcome of flight `id`: stores a success, releases the slot on
/// failure. Only the flight that still owns the slot touches it.
fn finish<V: Clone>(
    state: &Mutex<CacheState<V>>,
    key: String,
    id: u64,
    result: &Result<V>,
    ttl: Duration,
    capacity: usize,
) {
    let mut guard = state.lock();
    let state = &mut *guard;
    let owns_slot =
        matches!(state.slots.get(&key), Some(Slot::InFlight { id: f, .. }) if *f == id);

    match result {
        Ok(value) if owns_slot => {
            let now = Instant::now();
            state.tick += 1;
            let entry = CacheEntry {
                fingerprint: key.clone(),
                value: value.clone(),
                computed_at: now,
                ttl,
                last_used: state.tick,
            };
            state.slots.insert(key, Slot::Ready(entry));
            state.evict(capacity, now);
        }
        Ok(_) => {
            debug!(fingerprint = %key, "Slot invalidated during computation, result not stored");
        }
        Err(err) => {
            state.stats.failures += 1;
            debug!(fingerprint = %key, error = %err, "Computation failed, releasing slot");
            if owns_slot {
                state.slots.remove(&key);
            }
        }
    }
}
