//! Plugin catalog: sources and aggregation
//!
//! Sources are persisted in `sources.json` next to the registry. Each
//! file source carries a `repo.json` catalog document; url sources serve
//! the same document over HTTP. Aggregation merges every source into one
//! view of the known plugins.

pub mod aggregator;
pub mod source;

// Re-export main types
pub use aggregator::{Aggregation, CatalogAggregator};
pub use source::{CatalogSource, SourceStore};
