//! Client library for a multi-tenant business-management API.
//!
//! [`api`] talks HTTP, [`query`] caches and invalidates results, [`resources`]
//! binds both to the backend's resources, and [`views`] derives filtered,
//! sorted and paginated views from cached lists.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod resources;
pub mod views;

pub use error::{ApiError, Result};
