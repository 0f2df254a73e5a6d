//! Configuration for the synchronizer.

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Page size requested from the aggregator for both account and
    /// transaction listings. The provider may serve fewer per page.
    pub page_size: u32,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self { page_size: 100 }
    }

    /// Sets the requested page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
