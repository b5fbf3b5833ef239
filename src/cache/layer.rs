//! Cache layer that orchestrates freshness, deduplication and refetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

use super::observer::QueryObserver;
use super::traits::{QueryKey, QuerySnapshot};

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct InFlight<V, E> {
  seq: u64,
  future: SharedFetch<V, E>,
}

struct QueryEntry<V, E> {
  data: Option<V>,
  error: Option<E>,
  fetched_at: Option<Instant>,
  /// Explicitly marked stale by a mutation
  invalidated: bool,
  /// Sequence of the result currently held
  applied_seq: u64,
  /// Results from fetches started before this sequence are discarded
  min_seq: u64,
  in_flight: Option<InFlight<V, E>>,
  subscribers: Vec<mpsc::UnboundedSender<QuerySnapshot<V, E>>>,
}

impl<V: Clone, E: Clone> QueryEntry<V, E> {
  fn new(min_seq: u64) -> Self {
    Self {
      data: None,
      error: None,
      fetched_at: None,
      invalidated: false,
      applied_seq: 0,
      min_seq,
      in_flight: None,
      subscribers: Vec::new(),
    }
  }

  fn is_stale(&self, stale_time: Duration) -> bool {
    self.invalidated
      || self
        .fetched_at
        .map(|t| t.elapsed() >= stale_time)
        .unwrap_or(true)
  }

  fn fresh_data(&self, stale_time: Duration) -> Option<&V> {
    if self.is_stale(stale_time) {
      None
    } else {
      self.data.as_ref()
    }
  }

  fn snapshot(&self, stale_time: Duration) -> QuerySnapshot<V, E> {
    QuerySnapshot {
      data: self.data.clone(),
      error: self.error.clone(),
      is_loading: self.in_flight.is_some(),
      is_stale: self.is_stale(stale_time),
    }
  }

  fn notify(&mut self, stale_time: Duration) {
    if self.subscribers.is_empty() {
      return;
    }
    let snapshot = self.snapshot(stale_time);
    // Drop subscribers whose receiver went away
    self
      .subscribers
      .retain(|tx| tx.send(snapshot.clone()).is_ok());
  }
}

struct CacheInner<V, E> {
  entries: HashMap<String, QueryEntry<V, E>>,
  next_seq: u64,
  /// Minimum sequence accepted by entries created after the last clear
  floor_seq: u64,
}

impl<V: Clone, E: Clone> CacheInner<V, E> {
  fn entry(&mut self, key: &str) -> &mut QueryEntry<V, E> {
    let floor = self.floor_seq;
    self
      .entries
      .entry(key.to_string())
      .or_insert_with(|| QueryEntry::new(floor))
  }
}

/// In-memory query cache keyed by resource identity.
///
/// Mutations never write into the cache. Callers invalidate the affected key
/// and refetch, so displayed state always converges on what the server holds.
pub struct QueryCache<V, E> {
  inner: Arc<Mutex<CacheInner<V, E>>>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<V, E> QueryCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  /// Create a cache with the default five minute freshness window.
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(CacheInner {
        entries: HashMap::new(),
        next_seq: 0,
        floor_seq: 0,
      })),
      stale_time: Duration::from_secs(5 * 60),
    }
  }

  /// Set the freshness window for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Get the value for `key`, fetching only if needed.
  ///
  /// 1. Fresh data is returned without calling `fetcher`
  /// 2. If a fetch is already in flight, its result is shared
  /// 3. Otherwise a new fetch starts
  pub async fn fetch<K, F, Fut>(&self, key: &K, fetcher: F) -> Result<V, E>
  where
    K: QueryKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let cache_key = key.cache_key();
    let shared = {
      let mut inner = self.lock();
      let joined = {
        let entry = inner.entry(&cache_key);
        if let Some(data) = entry.fresh_data(self.stale_time) {
          debug!("Cache hit for {}", key.description());
          return Ok(data.clone());
        }
        entry.in_flight.as_ref().map(|f| f.future.clone())
      };

      match joined {
        Some(future) => {
          debug!("Joining in-flight fetch for {}", key.description());
          future
        }
        None => {
          debug!("Cache miss for {}", key.description());
          self.begin(&mut inner, &cache_key, fetcher())
        }
      }
    };

    shared.await
  }

  /// Fetch `key` from the network regardless of freshness or in-flight work.
  pub async fn refetch<K, F, Fut>(&self, key: &K, fetcher: F) -> Result<V, E>
  where
    K: QueryKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let shared = {
      let mut inner = self.lock();
      self.begin(&mut inner, &key.cache_key(), fetcher())
    };
    shared.await
  }

  /// Start a refetch of `key` without waiting for it.
  ///
  /// Subscribers see the result when it lands.
  pub fn spawn_refetch<K, F, Fut>(&self, key: &K, fetcher: F)
  where
    K: QueryKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let mut inner = self.lock();
    self.begin(&mut inner, &key.cache_key(), fetcher());
  }

  /// Mark `key` stale. The next read goes to the network, and any fetch
  /// started before this call can no longer update the entry.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) {
    let mut inner = self.lock();
    let min_seq = inner.next_seq + 1;
    let entry = inner.entry(&key.cache_key());
    entry.invalidated = true;
    entry.min_seq = min_seq;
    entry.in_flight = None;
    entry.notify(self.stale_time);
    debug!("Invalidated {}", key.description());
  }

  /// Drop every cached value. Subscribers stay registered and are told the
  /// entry is now empty; responses still in flight are discarded.
  pub fn clear(&self) {
    let mut inner = self.lock();
    let floor = inner.next_seq + 1;
    inner.floor_seq = floor;
    for entry in inner.entries.values_mut() {
      let subscribers = std::mem::take(&mut entry.subscribers);
      *entry = QueryEntry::new(floor);
      entry.subscribers = subscribers;
      entry.notify(self.stale_time);
    }
    debug!("Cleared query cache");
  }

  /// Current state of `key`.
  #[cfg(test)]
  pub fn snapshot<K: QueryKey + ?Sized>(&self, key: &K) -> QuerySnapshot<V, E> {
    let inner = self.lock();
    inner
      .entries
      .get(&key.cache_key())
      .map(|entry| entry.snapshot(self.stale_time))
      .unwrap_or_else(QuerySnapshot::empty)
  }

  /// Register interest in `key`.
  ///
  /// The observer immediately holds the current snapshot and receives a new
  /// one on every change: fetch start, result, invalidation or clear.
  pub fn subscribe<K: QueryKey + ?Sized>(&self, key: &K) -> QueryObserver<V, E> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut inner = self.lock();
    let entry = inner.entry(&key.cache_key());
    let current = entry.snapshot(self.stale_time);
    entry.subscribers.push(tx);
    QueryObserver::new(current, rx)
  }

  /// Internal: start a fetch for `key` while holding the lock.
  ///
  /// The result is applied to the entry inside the shared future, before any
  /// waiter sees it. A spawned task drives the future so the result lands
  /// even when every caller has stopped waiting.
  fn begin<Fut>(
    &self,
    inner: &mut CacheInner<V, E>,
    cache_key: &str,
    future: Fut,
  ) -> SharedFetch<V, E>
  where
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    inner.next_seq += 1;
    let seq = inner.next_seq;

    let cache = Arc::downgrade(&self.inner);
    let stale_time = self.stale_time;
    let key = cache_key.to_string();
    let shared = async move {
      let result = future.await;
      if let Some(cache) = cache.upgrade() {
        settle(&cache, stale_time, &key, seq, result.clone());
      }
      result
    }
    .boxed()
    .shared();

    let entry = inner.entry(cache_key);
    entry.in_flight = Some(InFlight {
      seq,
      future: shared.clone(),
    });
    entry.notify(self.stale_time);

    tokio::spawn(shared.clone());

    shared
  }

  fn lock(&self) -> MutexGuard<'_, CacheInner<V, E>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Apply a finished fetch if it is still the newest for its key.
fn settle<V: Clone, E: Clone>(
  cache: &Mutex<CacheInner<V, E>>,
  stale_time: Duration,
  cache_key: &str,
  seq: u64,
  result: Result<V, E>,
) {
  let mut inner = cache.lock().unwrap_or_else(PoisonError::into_inner);
  let Some(entry) = inner.entries.get_mut(cache_key) else {
    return;
  };

  if entry.in_flight.as_ref().is_some_and(|f| f.seq == seq) {
    entry.in_flight = None;
  }

  if seq <= entry.applied_seq || seq < entry.min_seq {
    debug!("Discarding superseded response for {} (seq {})", cache_key, seq);
    entry.notify(stale_time);
    return;
  }

  entry.applied_seq = seq;
  match result {
    Ok(data) => {
      entry.data = Some(data);
      entry.error = None;
      entry.fetched_at = Some(Instant::now());
      entry.invalidated = false;
    }
    Err(error) => {
      entry.error = Some(error);
    }
  }
  entry.notify(stale_time);
}

impl<V, E> Default for QueryCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<V, E> Clone for QueryCache<V, E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      stale_time: self.stale_time,
    }
  }
}

impl<V, E> std::fmt::Debug for QueryCache<V, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}
