//! Core data model: the component catalog and the user's selection.

pub mod catalog;
pub mod selection;

pub use catalog::{Catalog, CatalogError, Component, ComponentId, Profile};
pub use selection::{OpaqueKeys, Selection, SelectionError, SelectionFile};
