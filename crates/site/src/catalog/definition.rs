//! Catalog definitions and the catalog manifest.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use mspsrpi_engine::{BucketRegistry, CatalogQueryEngine, DerivedField, SortSpec};
use serde::{Deserialize, Serialize};

use super::source::SourceSchema;

/// Encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Json,
    Csv,
}

/// Where a catalog's records come from and how to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// URL or path relative to the data directory.
    pub location: String,

    #[serde(default)]
    pub format: SourceFormat,

    pub schema: SourceSchema,
}

/// One browsable catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    pub id: String,
    pub label: String,

    #[serde(default)]
    pub description: Option<String>,

    pub source: SourceDefinition,

    /// Page size used when a request does not name one.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Sort applied when a query carries none.
    #[serde(default)]
    pub default_sort: Option<SortSpec>,

    /// Fields matched by free-text search in addition to the display name.
    #[serde(default)]
    pub search_fields: Vec<String>,

    /// Bucket fields precomputed for display.
    #[serde(default)]
    pub derived: Vec<DerivedField>,
}

fn default_page_size() -> u32 {
    10
}

impl CatalogDefinition {
    /// Build the query engine for this catalog.
    pub fn engine(&self, buckets: &BucketRegistry) -> CatalogQueryEngine {
        CatalogQueryEngine::new(buckets.clone())
            .with_search_fields(self.search_fields.clone())
            .with_derived_fields(self.derived.clone())
    }
}

/// All catalogs served by the site, plus any extra bucket schemes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// Schemes added to (or overriding) the built-in ones.
    #[serde(default)]
    pub bucket_schemes: BucketRegistry,

    pub catalogs: Vec<CatalogDefinition>,
}

impl CatalogManifest {
    /// Parse a YAML manifest.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yml::from_str(yaml).context("failed to parse catalog manifest")
    }

    /// Read a YAML manifest from disk.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read catalog manifest {}", path.display()))?;
        Self::from_yaml(&yaml)
    }

    /// Built-in schemes merged with the manifest's own.
    pub fn buckets(&self) -> BucketRegistry {
        let mut buckets = BucketRegistry::builtin();
        buckets.extend(self.bucket_schemes.clone());
        buckets
    }

    /// Check the manifest for problems.
    ///
    /// Returns a list of validation errors. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let buckets = self.buckets();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for catalog in &self.catalogs {
            if catalog.id.is_empty() {
                errors.push("Catalog id is required".to_string());
            } else if !is_valid_id(&catalog.id) {
                errors.push(format!(
                    "Catalog id '{}' contains invalid characters",
                    catalog.id
                ));
            }

            if !seen.insert(catalog.id.as_str()) {
                errors.push(format!("Duplicate catalog id '{}'", catalog.id));
            }

            if catalog.page_size == 0 {
                errors.push(format!("Catalog '{}' has page size 0", catalog.id));
            }

            if catalog.source.location.trim().is_empty() {
                errors.push(format!("Catalog '{}' has no source location", catalog.id));
            }

            for derived in &catalog.derived {
                if !buckets.contains(&derived.scheme) {
                    errors.push(format!(
                        "Catalog '{}' derives '{}' from unknown bucket scheme '{}'",
                        catalog.id, derived.field, derived.scheme
                    ));
                }
            }
        }

        errors
    }
}

/// Catalog ids appear in URLs: ASCII alphanumerics, `_` and `-`.
fn is_valid_id(id: &str) -> bool {
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The catalogs of the MSPSRpi site.
pub fn default_manifest() -> CatalogManifest {
    CatalogManifest {
        bucket_schemes: BucketRegistry::new(),
        catalogs: vec![
            CatalogDefinition {
                id: "data_release".to_string(),
                label: "Data Release".to_string(),
                description: Some(
                    "Parallax and proper motion measurements across all phases".to_string(),
                ),
                source: SourceDefinition {
                    location: "pulsars.json".to_string(),
                    format: SourceFormat::Json,
                    schema: SourceSchema::DataRelease,
                },
                page_size: 12,
                default_sort: Some(SortSpec::asc("name")),
                search_fields: Vec::new(),
                derived: vec![DerivedField::new("parallaxBucket", "parallax", "parallax")],
            },
            CatalogDefinition {
                id: "mspsrpi".to_string(),
                label: "MSPSRPI".to_string(),
                description: Some("First-phase millisecond pulsar targets".to_string()),
                source: SourceDefinition {
                    location: "mspsrpi/mspsrpiDetails.json".to_string(),
                    format: SourceFormat::Json,
                    schema: SourceSchema::Mspsrpi,
                },
                page_size: 8,
                default_sort: Some(SortSpec::asc("name")),
                search_fields: Vec::new(),
                derived: vec![DerivedField::new("fluxBucket", "fluxDensity", "flux_density")],
            },
            CatalogDefinition {
                id: "mspsrpi2".to_string(),
                label: "MSPSRPI2".to_string(),
                description: Some("Second-phase millisecond pulsar targets".to_string()),
                source: SourceDefinition {
                    location: "mspsrpi2/mspsrpi2Pulsars.json".to_string(),
                    format: SourceFormat::Json,
                    schema: SourceSchema::Mspsrpi2,
                },
                page_size: 8,
                default_sort: Some(SortSpec::asc("name")),
                search_fields: Vec::new(),
                derived: vec![DerivedField::new("fluxBucket", "fluxDensity", "flux_density")],
            },
            CatalogDefinition {
                id: "publications".to_string(),
                label: "Publications".to_string(),
                description: Some("Papers from the PSRPI and MSPSRPI programmes".to_string()),
                source: SourceDefinition {
                    location: "publications.csv".to_string(),
                    format: SourceFormat::Csv,
                    schema: SourceSchema::Publications,
                },
                page_size: 20,
                default_sort: Some(SortSpec::desc("year")),
                search_fields: vec![
                    "authors".to_string(),
                    "abstract".to_string(),
                    "keywords".to_string(),
                ],
                derived: Vec::new(),
            },
        ],
    }
}
