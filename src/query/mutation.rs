//! Write hook: send a change, then invalidate what it affected.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cache::QueryCache;
use super::invalidation::Mutation;
use crate::error::Result;

type Perform<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;
type Identify<I> = Arc<dyn Fn(&I) -> Mutation + Send + Sync>;

/// A mounted write hook.
///
/// Cached data is never edited in place. On success the mutation's
/// invalidation rule marks the affected keys stale and observed entries
/// refetch; on failure the cache is left exactly as it was.
pub struct MutationHook<I, O> {
  cache: QueryCache,
  perform: Perform<I, O>,
  identify: Identify<I>,
  pending: Arc<AtomicUsize>,
}

impl<I, O> Clone for MutationHook<I, O> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      perform: self.perform.clone(),
      identify: self.identify.clone(),
      pending: self.pending.clone(),
    }
  }
}

struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
  fn new(counter: &Arc<AtomicUsize>) -> Self {
    counter.fetch_add(1, Ordering::SeqCst);
    Self(counter.clone())
  }
}

impl Drop for PendingGuard {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

impl<I, O> MutationHook<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  /// `identify` names the mutation for an input; `perform` sends it.
  pub fn new<Id, F, Fut>(cache: QueryCache, identify: Id, perform: F) -> Self
  where
    Id: Fn(&I) -> Mutation + Send + Sync + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
  {
    Self {
      cache,
      perform: Arc::new(move |input| perform(input).boxed()),
      identify: Arc::new(identify),
      pending: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Send the mutation and wait for it. Invalidates only on success.
  pub async fn mutate_async(&self, input: I) -> Result<O> {
    let mutation = (self.identify)(&input);
    let _pending = PendingGuard::new(&self.pending);
    debug!(%mutation, "mutation started");

    match (self.perform)(input).await {
      Ok(output) => {
        let count = self.cache.invalidate_all(&mutation.invalidates());
        debug!(%mutation, invalidated = count, "mutation succeeded");
        Ok(output)
      }
      Err(err) => {
        warn!(%mutation, error = %err, "mutation failed");
        Err(err)
      }
    }
  }

  /// Fire-and-forget variant. Failures are logged; the handle still yields them.
  pub fn mutate(&self, input: I) -> JoinHandle<Result<O>> {
    let hook = self.clone();
    tokio::spawn(async move { hook.mutate_async(input).await })
  }

  /// True while any call through this hook (or its clones) is running.
  pub fn is_pending(&self) -> bool {
    self.pending.load(Ordering::SeqCst) > 0
  }
}

impl<I, O> std::fmt::Debug for MutationHook<I, O> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MutationHook")
      .field("pending", &self.pending.load(Ordering::SeqCst))
      .finish_non_exhaustive()
  }
}
