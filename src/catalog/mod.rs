//! World catalog: document model and dependency resolution.

pub mod document;
pub mod resolver;

pub use document::DocNode;
pub use resolver::{CatalogResolver, CatalogSummary};
