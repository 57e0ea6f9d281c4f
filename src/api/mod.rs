//! Remote API client: HTTP transport, response envelopes and session state.

mod client;
mod envelope;
mod session;

pub use client::ApiClient;
pub use envelope::{Envelope, Page};
pub use session::{KeyValueStore, MemoryStore, Session, SqliteStore};
