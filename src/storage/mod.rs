mod backend;
mod catalog;
pub mod models;

pub use backend::{CatalogBackend, JsonFile};
pub use catalog::{Catalog, CatalogError, Snapshot};
