//! Configuration for the catalog cache

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CatalogError;

/// Configuration for the [`crate::CatalogCache`]
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Age after which the catalog is reported stale
    /// Default: 300 seconds
    pub ttl: Duration,

    /// Where the last successful listing is kept between runs
    /// Default: None (memory only)
    pub persist_path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            persist_path: None,
        }
    }
}

impl CatalogConfig {
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.ttl.is_zero() {
            return Err(CatalogError::Config("ttl must be greater than zero".to_string()));
        }
        if let Some(path) = &self.persist_path {
            if path.file_name().is_none() {
                return Err(CatalogError::Config(format!(
                    "persist_path {} does not name a file",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
