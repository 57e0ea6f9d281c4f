//! Read hook: one component's view of a cached query.
//!
//! Inspired by TanStack Query's `useQuery`. A [`QueryObserver`] binds a key
//! and a fetcher to the shared [`QueryCache`], keeps the entry alive while it
//! exists, and exposes loading, data and error state for rendering.
//!
//! # Example
//!
//! ```ignore
//! let mut suppliers = hooks.use_list(Resource::Suppliers, None);
//!
//! // In event loop tick
//! if suppliers.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match suppliers.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(page) => render_rows(&page.data),
//!     QueryState::Error { error, .. } => render_error(&error),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::cache::{downcast, erase, EntryState, FetchStatus, Fetcher, QueryCache, Subscription};
use super::key::QueryKey;
use crate::error::{ApiError, Result};

/// The state of a query, shaped for `match`-based rendering.
#[derive(Debug)]
pub enum QueryState<T> {
  /// Query has not been started, or is disabled
  Idle,
  /// First load in progress, nothing to show yet
  Loading,
  /// Data available (possibly being refreshed in the background)
  Success(Arc<T>),
  /// The last fetch failed. `stale` holds the previous data, if any.
  Error {
    error: ApiError,
    stale: Option<Arc<T>>,
  },
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  pub fn data(&self) -> Option<&Arc<T>> {
    match self {
      QueryState::Success(data) => Some(data),
      QueryState::Error { stale, .. } => stale.as_ref(),
      _ => None,
    }
  }
}

/// Snapshot returned by [`QueryObserver::result`].
#[derive(Debug)]
pub struct QueryResult<T> {
  /// Unwrapped payload, kept while a refresh runs or after it fails
  pub data: Option<Arc<T>>,
  /// True only while no data has ever been returned and a fetch is running
  pub is_loading: bool,
  /// True while any fetch for this key is running
  pub is_fetching: bool,
  pub error: Option<ApiError>,
}

impl<T> QueryResult<T> {
  fn from_state(state: EntryState<T>, enabled: bool) -> Self {
    if !enabled {
      return Self {
        data: None,
        is_loading: false,
        is_fetching: false,
        error: None,
      };
    }
    Self {
      is_loading: state.data.is_none() && state.is_fetching,
      is_fetching: state.is_fetching,
      data: state.data,
      error: state.error,
    }
  }
}

/// A mounted read hook.
///
/// Dropping the observer unsubscribes it and stops any refetch interval.
/// Requests it started keep running for other subscribers.
pub struct QueryObserver<T> {
  cache: QueryCache,
  key: QueryKey,
  fetcher: Fetcher,
  enabled: bool,
  subscription: Option<Subscription>,
  interval: Option<JoinHandle<()>>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  /// Create an observer for `key`. Call [`fetch`](Self::fetch) to start loading.
  pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self::with_enabled(cache, key, true, fetcher)
  }

  /// Like [`new`](Self::new), but a disabled observer never touches the
  /// cache, so no entry is created for `key`.
  pub fn with_enabled<F, Fut>(cache: QueryCache, key: QueryKey, enabled: bool, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let subscription = enabled.then(|| cache.subscribe(&key));
    Self {
      cache,
      key,
      fetcher: erase(fetcher),
      enabled,
      subscription,
      interval: None,
      _marker: PhantomData,
    }
  }

  /// Enable or disable the observer.
  ///
  /// A disabled observer issues no requests, reports no data and no error,
  /// and is not counted as an active subscriber. Used when a required
  /// parameter such as an id is missing.
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    if enabled {
      if self.subscription.is_none() {
        self.subscription = Some(self.cache.subscribe(&self.key));
      }
    } else {
      self.subscription = None;
      self.stop_interval();
    }
    self
  }

  /// Refetch on a fixed period until the observer is dropped.
  pub fn with_refetch_interval(mut self, period: Duration) -> Self {
    if !self.enabled {
      return self;
    }
    self.stop_interval();

    let cache = self.cache.clone();
    let key = self.key.clone();
    let fetcher = self.fetcher.clone();
    self.interval = Some(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      ticker.tick().await;
      loop {
        ticker.tick().await;
        debug!(key = %key, "interval refetch");
        cache.lookup(&key, Some(fetcher.clone()), true);
      }
    }));
    self
  }

  fn stop_interval(&mut self) {
    if let Some(handle) = self.interval.take() {
      handle.abort();
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Start fetching if the entry is missing or stale. Returns immediately.
  ///
  /// This is a no-op when a request for the key is already running or the
  /// observer is disabled.
  pub fn fetch(&self) {
    if self.enabled {
      self.cache.lookup(&self.key, Some(self.fetcher.clone()), false);
    }
  }

  /// Force a new request, ignoring staleness and replacing any pending one.
  pub fn refetch(&self) {
    if self.enabled {
      self.cache.lookup(&self.key, Some(self.fetcher.clone()), true);
    }
  }

  /// Wait for data, fetching if needed. `None` when disabled.
  pub async fn resolve(&self) -> Result<Option<Arc<T>>> {
    if !self.enabled {
      return Ok(None);
    }
    let value = self
      .cache
      .resolve(&self.key, Some(self.fetcher.clone()), false)
      .await?;
    downcast(&self.key, value).map(Some)
  }

  /// Force a request and wait for its result. `None` when disabled.
  pub async fn refetch_and_wait(&self) -> Result<Option<Arc<T>>> {
    if !self.enabled {
      return Ok(None);
    }
    let value = self
      .cache
      .resolve(&self.key, Some(self.fetcher.clone()), true)
      .await?;
    downcast(&self.key, value).map(Some)
  }

  fn entry(&self) -> EntryState<T> {
    if self.enabled {
      self.cache.state(&self.key)
    } else {
      EntryState::default()
    }
  }

  pub fn result(&self) -> QueryResult<T> {
    QueryResult::from_state(self.entry(), self.enabled)
  }

  pub fn state(&self) -> QueryState<T> {
    let entry = self.entry();
    match (entry.status, entry.data, entry.error) {
      (FetchStatus::Error, stale, Some(error)) => QueryState::Error { error, stale },
      (_, Some(data), _) => QueryState::Success(data),
      (FetchStatus::Loading, None, _) => QueryState::Loading,
      _ => QueryState::Idle,
    }
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.entry().data
  }

  pub fn error(&self) -> Option<ApiError> {
    self.entry().error
  }

  pub fn is_loading(&self) -> bool {
    self.result().is_loading
  }

  pub fn is_fetching(&self) -> bool {
    self.entry().is_fetching
  }

  pub fn is_stale(&self) -> bool {
    self.enabled && self.cache.is_stale(&self.key)
  }

  /// Check for changes since the last poll.
  ///
  /// Returns `true` if the entry changed (data arrived, error occurred,
  /// invalidated). Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    match &mut self.subscription {
      Some(subscription) if subscription.has_changed() => {
        subscription.mark_seen();
        true
      }
      _ => false,
    }
  }

  /// Wait until the entry changes. Returns `false` when disabled.
  pub async fn changed(&mut self) -> bool {
    match &mut self.subscription {
      Some(subscription) => subscription.changed().await,
      None => false,
    }
  }
}

impl<T> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    if let Some(handle) = self.interval.take() {
      handle.abort();
    }
  }
}

impl<T> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.key)
      .field("enabled", &self.enabled)
      .finish_non_exhaustive()
  }
}
