//! Configuration schema definitions for testshard.
//!
//! ```text
//! Config (root)
//! ├── RunConfig             - Node count, node index, batch size, filter
//! ├── ManifestConfig        - Location of the decoded manifest
//! └── DiscoveryConfig       - Tagged enum selecting discovery type (optional)
//!     ├── List              - Class listing file
//!     └── Command           - Command printing a class listing
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::{DEFAULT_BATCH_SIZE, RunParameters};

/// Root configuration structure for testshard.
///
/// # TOML Structure
///
/// ```toml
/// [run]
/// total_nodes = 3
/// node_index = 0
/// batch_size = 5
/// filter = "com.example.login.*, CheckoutTest"
///
/// [manifest]
/// path = "build/AndroidManifest.xml"
///
/// [discovery]
/// type = "list"
/// path = "build/test-classes.txt"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Run parameters (optional, has defaults).
    #[serde(default)]
    pub run: RunConfig,

    /// Where the instrumentation manifest is read from.
    pub manifest: ManifestConfig,

    /// How test classes are discovered.
    ///
    /// Only needed when the run is sharded or filtered.
    #[serde(default)]
    pub discovery: Option<DiscoveryConfig>,
}

/// Parameters of one node's run.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `total_nodes` | 1 |
/// | `node_index` | 0 |
/// | `batch_size` | 5 |
/// | `filter` | None |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Number of nodes sharing the suite.
    #[serde(default = "default_total_nodes")]
    pub total_nodes: usize,

    /// This node's zero-based index.
    #[serde(default)]
    pub node_index: usize,

    /// Classes handed to each device per pull.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Comma-separated class patterns to include.
    pub filter: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_nodes: default_total_nodes(),
            node_index: 0,
            batch_size: default_batch_size(),
            filter: None,
        }
    }
}

impl From<&RunConfig> for RunParameters {
    fn from(config: &RunConfig) -> Self {
        Self {
            total_nodes: config.total_nodes,
            node_index: config.node_index,
            batch_size: config.batch_size,
            filter: config.filter.clone(),
        }
    }
}

fn default_total_nodes() -> usize {
    1
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Location of the decoded manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestConfig {
    /// Path to the XML manifest. A leading `~` is expanded.
    pub path: PathBuf,
}

impl ManifestConfig {
    /// Returns the path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

/// Discovery configuration specifying how test classes are found.
///
/// # Example
///
/// ```toml
/// # Read a listing produced by the build
/// [discovery]
/// type = "list"
/// path = "build/test-classes.txt"
///
/// # Run a scanner that prints the listing
/// [discovery]
/// type = "command"
/// command = "./scripts/scan-dex.sh app-debug-androidTest.apk"
/// working_dir = "."
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiscoveryConfig {
    /// Read classes from a listing file.
    List(ListDiscoveryConfig),

    /// Run a command and read classes from its stdout.
    Command(CommandDiscoveryConfig),
}

/// Configuration for listing-file discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListDiscoveryConfig {
    /// Path to the listing. A leading `~` is expanded.
    pub path: PathBuf,
}

/// Configuration for command discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDiscoveryConfig {
    /// Command line, split into words like a shell would.
    pub command: String,

    /// Working directory for the command.
    pub working_dir: Option<PathBuf>,
}

/// Expands a leading `~` in `path`.
pub fn expand_path(path: &std::path::Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_str;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_config_str(
            r#"
            [manifest]
            path = "AndroidManifest.xml"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.total_nodes, 1);
        assert_eq!(config.run.node_index, 0);
        assert_eq!(config.run.batch_size, 5);
        assert!(config.run.filter.is_none());
        assert!(config.discovery.is_none());

        let params = RunParameters::from(&config.run);
        assert_eq!(params, RunParameters::default());
    }

    #[test]
    fn test_list_discovery() {
        let config = load_config_str(
            r#"
            [run]
            total_nodes = 3
            node_index = 2
            filter = "Login"

            [manifest]
            path = "AndroidManifest.xml"

            [discovery]
            type = "list"
            path = "classes.txt"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.node_index, 2);
        assert_eq!(config.run.filter.as_deref(), Some("Login"));
        match config.discovery {
            Some(DiscoveryConfig::List(list)) => {
                assert_eq!(list.path, PathBuf::from("classes.txt"))
            }
            other => panic!("unexpected discovery config: {:?}", other),
        }
    }

    #[test]
    fn test_command_discovery() {
        let config = load_config_str(
            r#"
            [manifest]
            path = "AndroidManifest.xml"

            [discovery]
            type = "command"
            command = "scan-dex tests.apk"
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.discovery,
            Some(DiscoveryConfig::Command(CommandDiscoveryConfig { ref command, working_dir: None }))
                if command == "scan-dex tests.apk"
        ));
    }

    #[test]
    fn test_unknown_discovery_type_is_rejected() {
        let result = load_config_str(
            r#"
            [manifest]
            path = "AndroidManifest.xml"

            [discovery]
            type = "dex"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_manifest_is_rejected() {
        assert!(load_config_str("[run]\ntotal_nodes = 2\n").is_err());
    }

    #[test]
    fn test_expand_plain_path_unchanged() {
        let path = PathBuf::from("build/AndroidManifest.xml");
        assert_eq!(expand_path(&path), path);
    }
}
