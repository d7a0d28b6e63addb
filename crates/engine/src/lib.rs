//! Catalog query engine.
//!
//! This crate provides:
//! - Record: one catalog entry (id, display name, open field mapping)
//! - CatalogQuery: search text, filters, sort and page as a single value
//! - BucketScheme: continuous measurements mapped to categorical labels
//! - CatalogQueryEngine: evaluates a query against an in-memory snapshot
//!
//! The engine is pure and synchronous. It never mutates its input and is
//! safe to call concurrently against the same records.

mod bucket;
mod collate;
mod engine;
mod error;
mod filter;
mod query;
mod record;
mod result;
mod sort;

pub use bucket::{BucketRange, BucketRegistry, BucketScheme, DerivedField, UNKNOWN_BUCKET};
pub use collate::collation_key;
pub use engine::{CatalogQueryEngine, FacetCount};
pub use error::QueryError;
pub use query::{
    CatalogQuery, FilterSpec, FilterValue, PageRequest, RangeSpec, SortDirection, SortSpec,
    toggle_sort,
};
pub use record::Record;
pub use result::ResultPage;
