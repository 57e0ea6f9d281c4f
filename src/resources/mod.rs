//! Backend resources: the catalogue, the record shape and the hook factory.

mod catalog;
mod hooks;
mod record;

pub use catalog::{Resource, UnknownResource, CRM_ROOT};
pub use hooks::{Hooks, Update};
pub use record::Record;
