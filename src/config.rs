//! Configuration loading and schema definitions for testshard.
//!
//! This module provides types and functions for loading testshard
//! configuration from TOML files or strings. The configuration schema defines
//! the run parameters, where the manifest lives, and how test classes are
//! discovered.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result};

/// Loads testshard configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read (e.g., doesn't exist or permission denied)
/// - The file contains invalid TOML syntax
/// - The configuration doesn't match the expected schema
///
/// # Example
///
/// ```no_run
/// use testshard::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("testshard.toml"))?;
/// println!("Total nodes: {}", config.run.total_nodes);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads testshard configuration from a TOML string.
///
/// # Example
///
/// ```
/// use testshard::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [run]
///     total_nodes = 4
///     node_index = 2
///
///     [manifest]
///     path = "build/AndroidManifest.xml"
/// "#)?;
///
/// assert_eq!(config.run.total_nodes, 4);
/// assert_eq!(config.run.batch_size, 5);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}
