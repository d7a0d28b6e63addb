//! Catalog service.
//!
//! Provides the catalog side of the site with:
//! - Catalog registration and lookup
//! - Loading and reloading record snapshots
//! - Query execution with page-size guardrails
//! - Facet listings for filter selectors

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mspsrpi_engine::{
    BucketRegistry, BucketScheme, CatalogQuery, CatalogQueryEngine, FacetCount, QueryError,
    Record, ResultPage,
};
use serde::Serialize;
use thiserror::Error;

use super::definition::{CatalogDefinition, CatalogManifest};
use super::loader::Loader;

/// Default maximum page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors surfaced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown catalog: {0}")]
    UnknownCatalog(String),

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
}

/// The records of one catalog at one point in time.
///
/// Snapshots are immutable; loading swaps in a new one with a higher
/// generation.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    #[serde(skip)]
    pub records: Vec<Record>,

    /// Why the last load failed, if it did. The records are then empty.
    pub load_error: Option<String>,

    pub loaded_at: Option<DateTime<Utc>>,

    /// Increases with every snapshot the service installs.
    pub generation: u64,
}

impl CatalogSnapshot {
    fn empty(generation: u64) -> Self {
        Self {
            records: Vec::new(),
            load_error: None,
            loaded_at: None,
            generation,
        }
    }
}

/// Summary row for catalog listings.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub records: usize,
    pub load_error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// A query result together with the state it was computed from.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub catalog: String,

    #[serde(flatten)]
    pub result: ResultPage,

    /// The query as evaluated, after default sort and page-size cap.
    pub query: CatalogQuery,

    /// Snapshot generation; responses from an older generation are stale.
    pub generation: u64,

    pub load_error: Option<String>,
}

#[derive(Clone)]
struct CatalogEntry {
    definition: Arc<CatalogDefinition>,
    engine: Arc<CatalogQueryEngine>,
    snapshot: Arc<CatalogSnapshot>,
}

/// Service owning every catalog and its current snapshot.
pub struct CatalogService {
    loader: Loader,
    max_page_size: u32,
    generation: AtomicU64,
    /// Registered catalogs by id
    catalogs: DashMap<String, CatalogEntry>,
}

impl CatalogService {
    /// Create an empty CatalogService.
    pub fn new(loader: Loader, max_page_size: u32) -> Arc<Self> {
        Arc::new(Self {
            loader,
            max_page_size: max_page_size.max(1),
            generation: AtomicU64::new(0),
            catalogs: DashMap::new(),
        })
    }

    /// Create a service and register every catalog of a manifest.
    pub fn from_manifest(
        manifest: &CatalogManifest,
        loader: Loader,
        max_page_size: u32,
    ) -> Result<Arc<Self>> {
        let errors = manifest.validate();
        if !errors.is_empty() {
            anyhow::bail!("Catalog manifest validation failed: {}", errors.join("; "));
        }

        let service = Self::new(loader, max_page_size);
        let buckets = manifest.buckets();
        for catalog in &manifest.catalogs {
            service.register(catalog.clone(), &buckets)?;
        }
        Ok(service)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a catalog with an empty snapshot, replacing any previous one.
    pub fn register(
        &self,
        definition: CatalogDefinition,
        buckets: &BucketRegistry,
    ) -> Result<(), CatalogError> {
        let engine = definition.engine(buckets);
        // Resolves every derived scheme up front.
        engine.derive_fields(&[])?;

        let id = definition.id.clone();
        let entry = CatalogEntry {
            definition: Arc::new(definition),
            engine: Arc::new(engine),
            snapshot: Arc::new(CatalogSnapshot::empty(self.next_generation())),
        };
        self.catalogs.insert(id.clone(), entry);
        tracing::debug!(catalog = %id, "catalog registered");
        Ok(())
    }

    fn entry(&self, id: &str) -> Result<CatalogEntry, CatalogError> {
        self.catalogs
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| CatalogError::UnknownCatalog(id.to_string()))
    }

    /// Swap in `snapshot` unless a newer generation is already installed.
    ///
    /// Returns whichever snapshot is current afterwards.
    fn install(&self, id: &str, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        let Some(mut entry) = self.catalogs.get_mut(id) else {
            return snapshot;
        };
        if snapshot.generation > entry.snapshot.generation {
            entry.snapshot = Arc::clone(&snapshot);
            snapshot
        } else {
            tracing::debug!(
                catalog = %id,
                generation = snapshot.generation,
                current = entry.snapshot.generation,
                "discarding stale snapshot"
            );
            Arc::clone(&entry.snapshot)
        }
    }

    /// Fetch a catalog's source and install a fresh snapshot.
    ///
    /// A failed fetch is not an error here: the snapshot is installed empty
    /// with `load_error` set, so the catalog keeps answering queries.
    pub async fn load(&self, id: &str) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let entry = self.entry(id)?;

        let snapshot = match self.loader.load(&entry.definition.source).await {
            Ok(records) => CatalogSnapshot {
                records: entry.engine.derive_fields(&records)?,
                load_error: None,
                loaded_at: Some(Utc::now()),
                generation: self.next_generation(),
            },
            Err(e) => {
                tracing::warn!(catalog = %id, error = %e, "failed to load catalog");
                CatalogSnapshot {
                    records: Vec::new(),
                    load_error: Some(e.to_string()),
                    loaded_at: Some(Utc::now()),
                    generation: self.next_generation(),
                }
            }
        };

        Ok(self.install(id, snapshot))
    }

    /// Load every registered catalog. Returns how many loaded cleanly.
    pub async fn load_all(&self) -> usize {
        let mut ids: Vec<String> = self.catalogs.iter().map(|e| e.key().clone()).collect();
        ids.sort();

        let mut loaded = 0;
        for id in &ids {
            match self.load(id).await {
                Ok(snapshot) if snapshot.load_error.is_none() => loaded += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!(catalog = %id, error = %e, "catalog load skipped"),
            }
        }

        tracing::info!(catalogs = ids.len(), loaded, "catalogs loaded");
        loaded
    }

    /// Reload one catalog from its source.
    pub async fn reload(&self, id: &str) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        tracing::info!(catalog = %id, "reloading catalog");
        self.load(id).await
    }

    /// Install records directly, bypassing the source.
    pub fn insert_records(
        &self,
        id: &str,
        records: Vec<Record>,
    ) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let entry = self.entry(id)?;
        let snapshot = CatalogSnapshot {
            records: entry.engine.derive_fields(&records)?,
            load_error: None,
            loaded_at: Some(Utc::now()),
            generation: self.next_generation(),
        };
        Ok(self.install(id, snapshot))
    }

    /// Summaries of every catalog, ordered by id.
    pub fn list(&self) -> Vec<CatalogSummary> {
        let mut summaries: Vec<CatalogSummary> = self
            .catalogs
            .iter()
            .map(|entry| CatalogSummary {
                id: entry.definition.id.clone(),
                label: entry.definition.label.clone(),
                description: entry.definition.description.clone(),
                records: entry.snapshot.records.len(),
                load_error: entry.snapshot.load_error.clone(),
                loaded_at: entry.snapshot.loaded_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Number of registered catalogs.
    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    /// Whether no catalog is registered.
    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// Get a catalog definition by id.
    pub fn get(&self, id: &str) -> Option<Arc<CatalogDefinition>> {
        self.catalogs.get(id).map(|e| Arc::clone(&e.definition))
    }

    /// Current snapshot of a catalog.
    pub fn snapshot(&self, id: &str) -> Option<Arc<CatalogSnapshot>> {
        self.catalogs.get(id).map(|e| Arc::clone(&e.snapshot))
    }

    /// Bucket schemes referenced by a catalog's derived fields.
    pub fn derived_schemes(&self, id: &str) -> Result<Vec<BucketScheme>, CatalogError> {
        let entry = self.entry(id)?;
        entry
            .definition
            .derived
            .iter()
            .map(|d| -> Result<BucketScheme, CatalogError> {
                Ok(entry.engine.buckets().scheme(&d.scheme)?.clone())
            })
            .collect()
    }

    /// Evaluate a query against a catalog's current snapshot.
    pub fn query(&self, id: &str, mut query: CatalogQuery) -> Result<CatalogPage, CatalogError> {
        // Clone out of the map so evaluation holds no shard lock.
        let entry = self.entry(id)?;

        if query.page.size > self.max_page_size {
            tracing::warn!(
                catalog = %id,
                requested = query.page.size,
                capped = self.max_page_size,
                "page size exceeds maximum, capping"
            );
            query.page.size = self.max_page_size;
        }

        if query.sort.is_none() {
            query.sort = entry.definition.default_sort.clone();
        }

        let snapshot = entry.snapshot;
        let result = entry.engine.evaluate(&snapshot.records, &query)?;
        if result.is_out_of_range() && result.total_matches > 0 {
            tracing::debug!(
                catalog = %id,
                page = result.page,
                page_count = result.page_count,
                "requested page past the last page"
            );
        }

        Ok(CatalogPage {
            catalog: id.to_string(),
            result,
            query,
            generation: snapshot.generation,
            load_error: snapshot.load_error.clone(),
        })
    }

    /// Distinct values of a field across a catalog's snapshot.
    pub fn facets(&self, id: &str, field: &str) -> Result<Vec<FacetCount>, CatalogError> {
        let entry = self.entry(id)?;
        Ok(entry.engine.facet(&entry.snapshot.records, field))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use mspsrpi_engine::{DerivedField, FilterSpec, SortDirection, SortSpec};
    use serde_json::json;

    use super::*;
    use crate::catalog::definition::default_manifest;

    fn service() -> Arc<CatalogService> {
        let loader = Loader::new(PathBuf::from("/nonexistent"), Duration::from_secs(1)).unwrap();
        CatalogService::from_manifest(&default_manifest(), loader, 5).unwrap()
    }

    fn pulsars() -> Vec<Record> {
        vec![
            Record::new("1", "J1713+0747").with_field("fluxDensity", 0.3),
            Record::new("2", "J0437-4715").with_field("fluxDensity", 149.0),
            Record::new("3", "J1012+5307").with_field("fluxDensity", 0.9),
        ]
    }

    #[test]
    fn insert_derives_fields() {
        let service = service();
        let snapshot = service.insert_records("mspsrpi", pulsars()).unwrap();
        assert_eq!(snapshot.records[0].get("fluxBucket"), Some(json!("low")));
        assert_eq!(snapshot.records[1].get("fluxBucket"), Some(json!("high")));
    }

    #[test]
    fn query_applies_default_sort() {
        let service = service();
        service.insert_records("mspsrpi", pulsars()).unwrap();
        let page = service.query("mspsrpi", CatalogQuery::new()).unwrap();
        let ids: Vec<&str> = page.result.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(page.query.sort, Some(SortSpec::asc("name")));
    }

    #[test]
    fn explicit_sort_wins() {
        let service = service();
        service.insert_records("mspsrpi", pulsars()).unwrap();
        let query = CatalogQuery::new().with_sort("fluxDensity", SortDirection::Desc);
        let page = service.query("mspsrpi", query).unwrap();
        assert_eq!(page.result.items[0].id, "2");
    }

    #[test]
    fn page_size_is_capped() {
        let service = service();
        service.insert_records("mspsrpi", pulsars()).unwrap();
        let page = service
            .query("mspsrpi", CatalogQuery::new().with_page(1, 500))
            .unwrap();
        assert_eq!(page.query.page.size, 5);
        assert_eq!(page.result.page_size, 5);
    }

    #[test]
    fn unknown_catalog() {
        let service = service();
        assert!(matches!(
            service.query("nope", CatalogQuery::new()),
            Err(CatalogError::UnknownCatalog(_))
        ));
        assert!(service.get("nope").is_none());
    }

    #[test]
    fn invalid_query_is_reported() {
        let service = service();
        let query = CatalogQuery::new().with_filter("x", FilterSpec::bucket("nope", ["a"]));
        assert!(matches!(
            service.query("mspsrpi", query),
            Err(CatalogError::InvalidQuery(QueryError::UnknownBucketScheme(_)))
        ));
    }

    #[test]
    fn generations_increase() {
        let service = service();
        let first = service.insert_records("mspsrpi", pulsars()).unwrap();
        let second = service.insert_records("mspsrpi", pulsars()).unwrap();
        assert!(second.generation > first.generation);
        let page = service.query("mspsrpi", CatalogQuery::new()).unwrap();
        assert_eq!(page.generation, second.generation);
    }

    #[test]
    fn stale_snapshot_is_not_installed() {
        let service = service();
        let current = service.insert_records("mspsrpi", pulsars()).unwrap();

        let stale = CatalogSnapshot {
            records: Vec::new(),
            load_error: None,
            loaded_at: None,
            generation: current.generation - 1,
        };
        let installed = service.install("mspsrpi", stale);

        assert_eq!(installed.generation, current.generation);
        let snapshot = service.snapshot("mspsrpi").unwrap();
        assert_eq!(snapshot.generation, current.generation);
        assert_eq!(snapshot.records.len(), 3);
    }

    #[tokio::test]
    async fn failed_load_keeps_catalog_queryable() {
        let service = service();
        service.insert_records("mspsrpi", pulsars()).unwrap();

        let snapshot = service.load("mspsrpi").await.unwrap();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.load_error.is_some());

        let page = service.query("mspsrpi", CatalogQuery::new()).unwrap();
        assert_eq!(page.result.total_matches, 0);
        assert!(page.load_error.is_some());
    }

    #[test]
    fn register_rejects_unknown_derived_scheme() {
        let service = service();
        let mut definition = default_manifest().catalogs.remove(0);
        definition.derived = vec![DerivedField::new("x", "y", "missing")];
        assert!(matches!(
            service.register(definition, &BucketRegistry::builtin()),
            Err(CatalogError::InvalidQuery(_))
        ));
    }

    #[test]
    fn list_is_sorted() {
        let service = service();
        let ids: Vec<String> = service.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["data_release", "mspsrpi", "mspsrpi2", "publications"]);
    }

    #[test]
    fn facets_and_schemes() {
        let service = service();
        service.insert_records("mspsrpi", pulsars()).unwrap();
        let facets = service.facets("mspsrpi", "fluxBucket").unwrap();
        assert_eq!(facets.len(), 3);
        let schemes = service.derived_schemes("mspsrpi").unwrap();
        assert_eq!(schemes[0].name, "flux_density");
    }
}
