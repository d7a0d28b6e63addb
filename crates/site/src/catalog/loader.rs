//! Fetching catalog sources.
//!
//! A source location is either an HTTP(S) URL or a path under the data
//! directory. Whatever the transport, the raw bytes are decoded into a JSON
//! value (CSV rows become objects keyed by the header) and handed to the
//! source schema for normalization.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mspsrpi_engine::Record;
use serde_json::{Map, Value};
use thiserror::Error;

use super::definition::{SourceDefinition, SourceFormat};

/// Why a catalog source could not be turned into records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected data shape: {0}")]
    Shape(String),
}

/// Where a source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(url::Url),
    Path(PathBuf),
}

impl SourceLocation {
    /// Resolve a configured location.
    ///
    /// `http` and `https` URLs are fetched remotely; anything else is a file
    /// path, relative paths being taken under `data_dir`.
    pub fn resolve(location: &str, data_dir: &Path) -> Self {
        if let Ok(url) = url::Url::parse(location)
            && matches!(url.scheme(), "http" | "https")
        {
            return SourceLocation::Url(url);
        }

        let path = Path::new(location);
        if path.is_absolute() {
            SourceLocation::Path(path.to_path_buf())
        } else {
            SourceLocation::Path(data_dir.join(path))
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Url(url) => write!(f, "{url}"),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads catalog sources over HTTP or from disk.
#[derive(Debug, Clone)]
pub struct Loader {
    client: reqwest::Client,
    data_dir: PathBuf,
}

impl Loader {
    /// Create a loader with the given fetch timeout.
    pub fn new(data_dir: PathBuf, timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, data_dir })
    }

    /// Directory that relative locations resolve against.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Fetch, decode and normalize one source.
    pub async fn load(&self, source: &SourceDefinition) -> Result<Vec<Record>, LoadError> {
        let location = SourceLocation::resolve(&source.location, &self.data_dir);
        let bytes = self.fetch(&location).await?;
        let raw = decode(source.format, &bytes)?;
        let records = source.schema.normalize(raw)?;

        tracing::info!(
            location = %location,
            records = records.len(),
            "catalog source loaded"
        );

        Ok(records)
    }

    /// Read the raw bytes behind a location.
    pub async fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, LoadError> {
        match location {
            SourceLocation::Url(url) => {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(LoadError::Http {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Ok(response.bytes().await?.to_vec())
            }
            SourceLocation::Path(path) => {
                tokio::fs::read(path).await.map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Decode raw bytes into a JSON value.
///
/// CSV input must carry a header row; each data row becomes an object of
/// string values keyed by column name, with surrounding whitespace trimmed.
pub fn decode(format: SourceFormat, bytes: &[u8]) -> Result<Value, LoadError> {
    match format {
        SourceFormat::Json => Ok(serde_json::from_slice(bytes)?),
        SourceFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(bytes);

            let headers = reader.headers()?.clone();
            let mut rows = Vec::new();
            for row in reader.records() {
                let row = row?;
                let object: Map<String, Value> = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                    .collect();
                rows.push(Value::Object(object));
            }
            Ok(Value::Array(rows))
        }
    }
}
