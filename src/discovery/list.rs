//! Discovery from a class listing file.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ClassDiscoverer, DiscoveryResult, TestClass, parse_listing};
use crate::config::{ListDiscoveryConfig, expand_path};

/// Reads candidate test classes from a listing file.
///
/// The file is typically produced ahead of time by a build step that scans
/// the test artifact.
pub struct ListDiscoverer {
    path: PathBuf,
}

impl ListDiscoverer {
    /// Creates a discoverer for the listing at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a discoverer from configuration.
    pub fn from_config(config: &ListDiscoveryConfig) -> Self {
        Self::new(expand_path(&config.path))
    }
}

#[async_trait]
impl ClassDiscoverer for ListDiscoverer {
    async fn discover(&self) -> DiscoveryResult<Vec<TestClass>> {
        debug!("Reading class listing from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await?;
        let classes = parse_listing(&content);

        if classes.is_empty() {
            warn!("No test classes listed in {}", self.path.display());
        }

        Ok(classes)
    }

    fn name(&self) -> &'static str {
        "list"
    }
}
