//! Coordinator configuration

use yoto_catalog::CatalogConfig;
use yoto_dispatch::DispatchConfig;

use crate::error::SdkError;

/// Configuration for the [`crate::Coordinator`]
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Command timeout and history
    pub dispatch: DispatchConfig,

    /// Catalog TTL and persistence
    pub catalog: CatalogConfig,

    /// Capacity of the broadcast channel behind `notifications()`;
    /// slow receivers past this many messages observe a lag
    /// Default: 256
    pub notification_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            catalog: CatalogConfig::default(),
            notification_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), SdkError> {
        self.dispatch.validate()?;
        self.catalog.validate()?;
        if self.notification_capacity == 0 {
            return Err(SdkError::Config(
                "notification_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
