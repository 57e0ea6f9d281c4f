//! Query layer: cache keys, the shared cache, and the read/write hooks on top.
//!
//! Inspired by TanStack Query. Reads go through a [`QueryObserver`], which
//! serves fresh cached data or fetches it once for all concurrent readers.
//! Writes go through a [`MutationHook`], which marks the keys named by the
//! [`Mutation`] table stale after the server accepts the change.

mod cache;
mod invalidation;
mod key;
mod mutation;
mod observer;

pub use cache::{CacheOptions, EntryMeta, EntryState, FetchStatus, QueryCache, Subscription};
pub use invalidation::Mutation;
pub use key::{KeySegment, ParamValue, Params, QueryKey};
pub use mutation::MutationHook;
pub use observer::{QueryObserver, QueryResult, QueryState};
