//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::catalog::MAX_PAGE_SIZE;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Directory that relative catalog locations resolve against
    /// (default: ./public/data).
    pub data_dir: PathBuf,

    /// YAML catalog manifest. When unset, the built-in catalogs are used.
    pub catalogs_file: Option<PathBuf>,

    /// Timeout for fetching remote catalog sources (default: 10s).
    pub fetch_timeout: Duration,

    /// Largest page size a query may request (default: 100).
    pub max_page_size: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            data_dir: PathBuf::from("./public/data"),
            catalogs_file: None,
            fetch_timeout: Duration::from_secs(10),
            max_page_size: MAX_PAGE_SIZE,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/data"));

        let catalogs_file = env::var("CATALOGS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let fetch_timeout_secs: u64 = env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("FETCH_TIMEOUT_SECS must be a valid u64")?;

        let max_page_size: u32 = env::var("MAX_PAGE_SIZE")
            .map(|v| v.parse().context("MAX_PAGE_SIZE must be a valid u32"))
            .unwrap_or(Ok(MAX_PAGE_SIZE))?;
        if max_page_size == 0 {
            anyhow::bail!("MAX_PAGE_SIZE must be at least 1");
        }

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            data_dir,
            catalogs_file,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            max_page_size,
            cors_allowed_origins,
        })
    }
}
