//! In-memory query cache with staleness tracking, request deduplication
//! and prefix invalidation.
//!
//! Revalidation discipline: an invalidated entry with at least one active
//! observer is refetched immediately (eager); an unobserved entry is only
//! marked stale and refetched on its next read (lazy).

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::key::QueryKey;
use crate::error::{ApiError, Result};

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchFuture = BoxFuture<'static, Result<AnyValue>>;
pub(crate) type SharedFetch = Shared<FetchFuture>;

/// Type-erased fetcher stored with an entry so it can be re-run on invalidation.
pub(crate) type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

pub(crate) fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
  })
}

pub(crate) fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>> {
  value
    .downcast::<T>()
    .map_err(|_| ApiError::decode(format!("cached value for {} has a different type", key)))
}

/// Timing knobs for the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
  /// A successful result older than this is stale
  pub stale_time: Duration,
  /// Unobserved entries are dropped by [`QueryCache::gc`] after this long
  pub gc_time: Duration,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(60),
      gc_time: Duration::from_secs(5 * 60),
    }
  }
}

/// Fetch status of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
  /// Never fetched, or cleared
  #[default]
  Idle,
  /// A request is in flight
  Loading,
  /// The last request succeeded
  Success,
  /// The last request failed; any earlier value is still available
  Error,
}

struct Entry {
  value: Option<AnyValue>,
  status: FetchStatus,
  error: Option<ApiError>,
  updated_at: Option<DateTime<Utc>>,
  invalidated: bool,
  in_flight: Option<SharedFetch>,
  /// Bumped whenever a request starts or is superseded; results from an
  /// older generation are dropped.
  generation: u64,
  fetcher: Option<Fetcher>,
  observers: usize,
  inactive_since: Option<Instant>,
  version: watch::Sender<u64>,
}

impl Entry {
  fn new() -> Self {
    let (version, _) = watch::channel(0u64);
    Self {
      value: None,
      status: FetchStatus::Idle,
      error: None,
      updated_at: None,
      invalidated: false,
      in_flight: None,
      generation: 0,
      fetcher: None,
      observers: 0,
      inactive_since: Some(Instant::now()),
      version,
    }
  }

  fn is_stale(&self, stale_time: Duration) -> bool {
    if self.invalidated {
      return true;
    }
    match self.updated_at {
      None => true,
      Some(at) => (Utc::now() - at)
        .to_std()
        .map(|age| age >= stale_time)
        .unwrap_or(false),
    }
  }

  fn fresh_value(&self, stale_time: Duration) -> Option<AnyValue> {
    if self.is_stale(stale_time) {
      None
    } else {
      self.value.clone()
    }
  }

  /// Status to fall back to when the in-flight request is dropped.
  fn settled_status(&self) -> FetchStatus {
    if self.error.is_some() {
      FetchStatus::Error
    } else if self.value.is_some() {
      FetchStatus::Success
    } else {
      FetchStatus::Idle
    }
  }

  /// Drop the in-flight request so its result is never stored.
  fn supersede(&mut self) {
    if self.in_flight.take().is_some() {
      self.generation += 1;
      self.status = self.settled_status();
    }
  }

  fn reset(&mut self) {
    self.supersede();
    self.value = None;
    self.error = None;
    self.updated_at = None;
    self.invalidated = false;
    self.status = FetchStatus::Idle;
    self.bump();
  }

  fn bump(&self) {
    self.version.send_modify(|v| *v += 1);
  }
}

/// Typed view of one entry at a point in time.
#[derive(Debug)]
pub struct EntryState<T> {
  pub data: Option<Arc<T>>,
  pub status: FetchStatus,
  pub error: Option<ApiError>,
  /// Time of the last successful fetch
  pub updated_at: Option<DateTime<Utc>>,
  pub is_invalidated: bool,
  pub is_fetching: bool,
}

impl<T> EntryState<T> {
  /// True once any fetch for this key has succeeded.
  pub fn has_loaded(&self) -> bool {
    self.updated_at.is_some()
  }

  /// Loaded before, but the latest refresh failed.
  pub fn refresh_failed(&self) -> bool {
    self.status == FetchStatus::Error && self.data.is_some()
  }
}

impl<T> Default for EntryState<T> {
  fn default() -> Self {
    Self {
      data: None,
      status: FetchStatus::Idle,
      error: None,
      updated_at: None,
      is_invalidated: false,
      is_fetching: false,
    }
  }
}

impl<T> Clone for EntryState<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      status: self.status,
      error: self.error.clone(),
      updated_at: self.updated_at,
      is_invalidated: self.is_invalidated,
      is_fetching: self.is_fetching,
    }
  }
}

/// Untyped bookkeeping for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
  pub status: FetchStatus,
  pub updated_at: Option<DateTime<Utc>>,
  pub is_invalidated: bool,
  pub observers: usize,
  /// Incremented on every change to the entry
  pub version: u64,
}

pub(crate) enum Lookup {
  /// A fresh value was already cached
  Fresh(AnyValue),
  /// A request is running (possibly started by this call)
  Pending(SharedFetch),
  /// Stale or missing, but nothing registered to fetch it
  Unavailable,
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
  options: CacheOptions,
}

/// Process-wide query cache.
///
/// Cloning is cheap and every clone shares the same entries. Construct one
/// at startup, pass it to whatever needs it, and [`clear`](Self::clear) it
/// at logout. The mutex is never held across an `.await`.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new(CacheOptions::default())
  }
}

impl QueryCache {
  pub fn new(options: CacheOptions) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        options,
      }),
    }
  }

  pub fn options(&self) -> CacheOptions {
    self.inner.options
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the cached value if fresh, otherwise fetch it.
  ///
  /// Concurrent calls for one key share a single request. The request runs
  /// on its own task, so dropping this future does not cancel it for
  /// other callers, and its result is still stored.
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let value = self.resolve(key, Some(erase(fetcher)), false).await?;
    downcast(key, value)
  }

  /// Return the last known state right away, starting a background fetch
  /// when the entry is missing or stale.
  pub fn get<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> EntryState<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    self.lookup(key, Some(erase(fetcher)), false);
    self.state(key)
  }

  pub(crate) async fn resolve(
    &self,
    key: &QueryKey,
    fetcher: Option<Fetcher>,
    force: bool,
  ) -> Result<AnyValue> {
    match self.lookup(key, fetcher, force) {
      Lookup::Fresh(value) => Ok(value),
      Lookup::Pending(pending) => pending.await,
      Lookup::Unavailable => Err(ApiError::Cancelled),
    }
  }

  /// Decide between serving the cache, joining a request, or starting one.
  ///
  /// `force` skips the freshness check and replaces any in-flight request.
  pub(crate) fn lookup(&self, key: &QueryKey, fetcher: Option<Fetcher>, force: bool) -> Lookup {
    let stale_time = self.inner.options.stale_time;
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
    if let Some(fetcher) = fetcher {
      entry.fetcher = Some(fetcher);
    }

    if !force {
      if let Some(value) = entry.fresh_value(stale_time) {
        trace!(key = %key, "cache hit");
        return Lookup::Fresh(value);
      }
      if let Some(pending) = &entry.in_flight {
        trace!(key = %key, "joining in-flight request");
        return Lookup::Pending(pending.clone());
      }
    }

    let Some(fetcher) = entry.fetcher.clone() else {
      return Lookup::Unavailable;
    };
    entry.supersede();
    Lookup::Pending(self.start_fetch(key, entry, fetcher))
  }

  fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, fetcher: Fetcher) -> SharedFetch {
    entry.generation += 1;
    let generation = entry.generation;
    entry.status = FetchStatus::Loading;

    let cache = Arc::downgrade(&self.inner);
    let settle_key = key.clone();
    let request = async move {
      let result = fetcher().await;
      if let Some(inner) = Weak::upgrade(&cache) {
        QueryCache { inner }.settle(&settle_key, generation, &result);
      }
      result
    }
    .boxed()
    .shared();

    entry.in_flight = Some(request.clone());
    entry.bump();
    debug!(key = %key, generation, "fetch started");

    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(request.clone());
      }
      Err(_) => warn!(key = %key, "no async runtime; request only runs while awaited"),
    }
    request
  }

  /// Store a finished request's outcome unless it was superseded.
  fn settle(&self, key: &QueryKey, generation: u64, result: &Result<AnyValue>) {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      debug!(key = %key, "discarding result for removed entry");
      return;
    };
    if entry.generation != generation {
      debug!(key = %key, generation, "discarding superseded result");
      return;
    }

    entry.in_flight = None;
    match result {
      Ok(value) => {
        entry.value = Some(value.clone());
        entry.status = FetchStatus::Success;
        entry.error = None;
        entry.updated_at = Some(Utc::now());
        entry.invalidated = false;
        debug!(key = %key, "fetch succeeded");
      }
      Err(err) => {
        entry.status = FetchStatus::Error;
        entry.error = Some(err.clone());
        warn!(key = %key, error = %err, "fetch failed");
      }
    }
    entry.bump();
  }

  /// Mark every entry under `prefix` stale. Values stay readable.
  ///
  /// Returns the number of entries affected.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    self.invalidate_all(std::slice::from_ref(prefix))
  }

  /// Mark every entry under any of `prefixes` stale.
  pub fn invalidate_all(&self, prefixes: &[QueryKey]) -> usize {
    let mut revalidate = Vec::new();
    let mut count = 0;
    {
      let mut entries = self.entries();
      for (key, entry) in entries.iter_mut() {
        if !prefixes.iter().any(|prefix| key.starts_with(prefix)) {
          continue;
        }
        count += 1;
        entry.invalidated = true;
        entry.supersede();
        entry.bump();
        if entry.observers > 0 && entry.fetcher.is_some() {
          revalidate.push(key.clone());
        }
      }
    }

    debug!(
      prefixes = ?prefixes.iter().map(ToString::to_string).collect::<Vec<_>>(),
      count,
      eager = revalidate.len(),
      "invalidated"
    );
    for key in revalidate {
      self.lookup(&key, None, false);
    }
    count
  }

  /// Store a value directly, as if a fetch had just succeeded.
  pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
    entry.supersede();
    entry.value = Some(Arc::new(value));
    entry.status = FetchStatus::Success;
    entry.error = None;
    entry.updated_at = Some(Utc::now());
    entry.invalidated = false;
    entry.bump();
  }

  /// Last known value, fresh or not.
  pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let value = self.entries().get(key)?.value.clone()?;
    match downcast(key, value) {
      Ok(value) => Some(value),
      Err(err) => {
        warn!(error = %err, "peek with mismatched type");
        None
      }
    }
  }

  pub fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> EntryState<T> {
    let entries = self.entries();
    let Some(entry) = entries.get(key) else {
      return EntryState::default();
    };
    EntryState {
      data: entry
        .value
        .clone()
        .and_then(|value| downcast(key, value).ok()),
      status: entry.status,
      error: entry.error.clone(),
      updated_at: entry.updated_at,
      is_invalidated: entry.invalidated,
      is_fetching: entry.in_flight.is_some(),
    }
  }

  pub fn meta(&self, key: &QueryKey) -> Option<EntryMeta> {
    let entries = self.entries();
    let entry = entries.get(key)?;
    let version = *entry.version.borrow();
    Some(EntryMeta {
      status: entry.status,
      updated_at: entry.updated_at,
      is_invalidated: entry.invalidated,
      observers: entry.observers,
      version,
    })
  }

  pub fn is_stale(&self, key: &QueryKey) -> bool {
    self
      .entries()
      .get(key)
      .map_or(true, |entry| entry.is_stale(self.inner.options.stale_time))
  }

  /// Register an observer for `key`, creating the entry if needed.
  pub fn subscribe(&self, key: &QueryKey) -> Subscription {
    let mut entries = self.entries();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
    entry.observers += 1;
    entry.inactive_since = None;
    Subscription {
      cache: Arc::downgrade(&self.inner),
      key: key.clone(),
      receiver: entry.version.subscribe(),
    }
  }

  /// Drop entries under `prefix`. Observed entries are reset instead so
  /// their observers stay attached.
  pub fn remove(&self, prefix: &QueryKey) -> usize {
    self.evict(|key| key.starts_with(prefix))
  }

  /// Drop everything. Called at logout.
  pub fn clear(&self) -> usize {
    let count = self.evict(|_| true);
    debug!(count, "cache cleared");
    count
  }

  fn evict(&self, matches: impl Fn(&QueryKey) -> bool) -> usize {
    let mut entries = self.entries();
    let before = entries.len();
    let mut reset = 0;
    entries.retain(|key, entry| {
      if !matches(key) {
        return true;
      }
      if entry.observers > 0 {
        entry.reset();
        reset += 1;
        true
      } else {
        false
      }
    });
    before - entries.len() + reset
  }

  /// Remove unobserved, idle entries whose retention time has passed.
  pub fn gc(&self) -> usize {
    let gc_time = self.inner.options.gc_time;
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| {
      let expired = entry.observers == 0
        && entry.in_flight.is_none()
        && entry
          .inactive_since
          .is_some_and(|since| since.elapsed() >= gc_time);
      !expired
    });
    let removed = before - entries.len();
    if removed > 0 {
      debug!(removed, "garbage-collected cache entries");
    }
    removed
  }

  /// Run [`gc`](Self::gc) every `period` until the cache is dropped.
  pub fn spawn_gc(&self, period: Duration) -> JoinHandle<()> {
    let cache = Arc::downgrade(&self.inner);
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      interval.tick().await;
      loop {
        interval.tick().await;
        match Weak::upgrade(&cache) {
          Some(inner) => {
            QueryCache { inner }.gc();
          }
          None => break,
        }
      }
    })
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  pub fn keys(&self) -> Vec<QueryKey> {
    let mut keys: Vec<QueryKey> = self.entries().keys().cloned().collect();
    keys.sort();
    keys
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("entries", &self.len())
      .field("options", &self.inner.options)
      .finish()
  }
}

/// Observer registration for one key. Dropping it unsubscribes.
pub struct Subscription {
  cache: Weak<Inner>,
  key: QueryKey,
  receiver: watch::Receiver<u64>,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// True if the entry changed since the last call to `mark_seen`.
  pub fn has_changed(&self) -> bool {
    self.receiver.has_changed().unwrap_or(false)
  }

  pub fn mark_seen(&mut self) {
    self.receiver.borrow_and_update();
  }

  /// Wait for the next change. Returns `false` if the cache was dropped.
  pub async fn changed(&mut self) -> bool {
    self.receiver.changed().await.is_ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(inner) = self.cache.upgrade() else {
      return;
    };
    let cache = QueryCache { inner };
    let mut entries = cache.entries();
    if let Some(entry) = entries.get_mut(&self.key) {
      entry.observers = entry.observers.saturating_sub(1);
      if entry.observers == 0 {
        entry.inactive_since = Some(Instant::now());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_fetcher(
    calls: Arc<AtomicUsize>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<usize>> + Send + Sync + 'static {
    move || {
      let calls = calls.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        Ok(n)
      }
      .boxed()
    }
  }

  fn suppliers_list() -> QueryKey {
    QueryKey::new("suppliers").segment("list")
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    let (a, b) = tokio::join!(
      cache.fetch(&key, counting_fetcher(calls.clone(), Duration::from_millis(20))),
      cache.fetch(&key, counting_fetcher(calls.clone(), Duration::from_millis(20))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[tokio::test]
  async fn test_fresh_value_served_from_cache() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    let first = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let second = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*first, *second);
  }

  #[tokio::test]
  async fn test_zero_stale_time_always_refetches() {
    let cache = QueryCache::new(CacheOptions {
      stale_time: Duration::ZERO,
      ..CacheOptions::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let second = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(*second, 2);
  }

  #[tokio::test]
  async fn test_invalidate_scope_is_prefix() {
    let cache = QueryCache::default();
    let list = suppliers_list();
    let detail = QueryKey::new("suppliers").segment("detail").id(7);
    let invoices = QueryKey::new("invoices").segment("list");
    cache.set_data(&list, vec![1u32, 2, 3]);
    cache.set_data(&detail, 7u32);
    cache.set_data(&invoices, vec![9u32]);

    let count = cache.invalidate(&QueryKey::new("suppliers"));

    assert_eq!(count, 2);
    assert!(cache.meta(&list).unwrap().is_invalidated);
    assert!(cache.meta(&detail).unwrap().is_invalidated);
    assert!(!cache.meta(&invoices).unwrap().is_invalidated);
    // values are kept for display during revalidation
    assert_eq!(*cache.peek::<Vec<u32>>(&list).unwrap(), vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_invalidated_unobserved_entry_refetches_lazily() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache.invalidate(&QueryKey::new("suppliers"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let value = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(*value, 2);
    assert!(!cache.meta(&key).unwrap().is_invalidated);
  }

  #[tokio::test]
  async fn test_invalidated_observed_entry_refetches_eagerly() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();
    let mut subscription = cache.subscribe(&key);

    cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    subscription.mark_seen();

    cache.invalidate(&key);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(subscription.has_changed());
    assert_eq!(*cache.peek::<usize>(&key).unwrap(), 2);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_previous_value() {
    let cache = QueryCache::default();
    let key = suppliers_list();
    cache.set_data(&key, 42u32);
    cache.invalidate(&key);

    let result = cache
      .fetch(&key, || async { Err::<u32, _>(ApiError::transport("offline")) })
      .await;
    assert!(result.is_err());

    let state = cache.state::<u32>(&key);
    assert_eq!(state.status, FetchStatus::Error);
    assert_eq!(state.data.as_deref(), Some(&42));
    assert!(state.has_loaded());
    assert!(state.refresh_failed());
  }

  #[tokio::test]
  async fn test_failed_first_load_is_distinguishable() {
    let cache = QueryCache::default();
    let key = suppliers_list();

    let _ = cache
      .fetch(&key, || async { Err::<u32, _>(ApiError::transport("offline")) })
      .await;

    let state = cache.state::<u32>(&key);
    assert_eq!(state.status, FetchStatus::Error);
    assert!(!state.has_loaded());
    assert!(!state.refresh_failed());
    assert!(state.error.unwrap().is_transport());
  }

  #[tokio::test]
  async fn test_get_returns_immediately_and_fetches_in_background() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    let state = cache.get(&key, counting_fetcher(calls.clone(), Duration::from_millis(5)));
    assert!(state.data.is_none());
    assert_eq!(state.status, FetchStatus::Loading);
    assert!(state.is_fetching);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let state = cache.state::<usize>(&key);
    assert_eq!(state.data.as_deref(), Some(&1));
    assert_eq!(state.status, FetchStatus::Success);
  }

  #[tokio::test]
  async fn test_dropped_caller_does_not_cancel_request() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = suppliers_list();

    let task = {
      let cache = cache.clone();
      let key = key.clone();
      let calls = calls.clone();
      tokio::spawn(async move {
        cache
          .fetch(&key, counting_fetcher(calls, Duration::from_millis(20)))
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    task.abort();

    let value = cache
      .fetch(&key, counting_fetcher(calls.clone(), Duration::from_millis(20)))
      .await
      .unwrap();
    assert_eq!(*value, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_superseded_result_is_not_stored() {
    let cache = QueryCache::default();
    let key = suppliers_list();

    cache.get(&key, || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok::<_, ApiError>("old")
    });
    cache.clear();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(cache.peek::<&str>(&key).is_none());
  }

  #[tokio::test]
  async fn test_mismatched_type_is_decode_error() {
    let cache = QueryCache::default();
    let key = suppliers_list();
    cache.set_data(&key, 1u32);

    let result = cache
      .fetch(&key, || async { Ok::<_, ApiError>(String::from("x")) })
      .await;
    assert!(matches!(result, Err(ApiError::Decode { .. })));
  }

  #[tokio::test]
  async fn test_gc_keeps_observed_entries() {
    let cache = QueryCache::new(CacheOptions {
      gc_time: Duration::ZERO,
      ..CacheOptions::default()
    });
    let observed = suppliers_list();
    let unobserved = QueryKey::new("invoices").segment("list");
    cache.set_data(&observed, 1u32);
    cache.set_data(&unobserved, 2u32);
    let subscription = cache.subscribe(&observed);

    assert_eq!(cache.gc(), 1);
    assert!(cache.peek::<u32>(&observed).is_some());
    assert!(cache.peek::<u32>(&unobserved).is_none());

    drop(subscription);
    assert_eq!(cache.gc(), 1);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_clear_resets_observed_entries() {
    let cache = QueryCache::default();
    let observed = suppliers_list();
    let unobserved = QueryKey::new("invoices").segment("list");
    cache.set_data(&observed, 1u32);
    cache.set_data(&unobserved, 2u32);
    let _subscription = cache.subscribe(&observed);

    assert_eq!(cache.clear(), 2);
    assert_eq!(cache.keys(), vec![observed.clone()]);
    let state = cache.state::<u32>(&observed);
    assert!(state.data.is_none());
    assert_eq!(state.status, FetchStatus::Idle);
  }
}
