//! Catalogs: definitions, source loading, normalization and the service
//! that serves queries over loaded snapshots.

pub mod definition;
pub mod loader;
pub mod params;
pub mod service;
pub mod source;

pub use definition::{
    CatalogDefinition, CatalogManifest, SourceDefinition, SourceFormat, default_manifest,
};
pub use loader::{LoadError, Loader, SourceLocation};
pub use params::{ParamError, QueryParams};
pub use service::{
    CatalogError, CatalogPage, CatalogService, CatalogSnapshot, CatalogSummary, MAX_PAGE_SIZE,
};
pub use source::SourceSchema;
