//! Discovery from the output of a user-supplied command.
//!
//! The command prints a class listing on stdout, e.g. a script that runs a
//! dex scanner over the test APK. The command line is split into words with
//! `shell-words`; it is not run through a shell.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ClassDiscoverer, DiscoveryError, DiscoveryResult, TestClass, parse_listing};
use crate::config::CommandDiscoveryConfig;

/// Discoverer that runs a command and parses its stdout as a class listing.
pub struct CommandDiscoverer {
    config: CommandDiscoveryConfig,
}

impl CommandDiscoverer {
    /// Creates a new command discoverer with the given configuration.
    pub fn new(config: CommandDiscoveryConfig) -> Self {
        Self { config }
    }

    fn argv(&self) -> DiscoveryResult<Vec<String>> {
        let argv = shell_words::split(&self.config.command).map_err(|e| {
            DiscoveryError::DiscoveryFailed(format!(
                "Invalid discovery command '{}': {}",
                self.config.command, e
            ))
        })?;

        if argv.is_empty() {
            return Err(DiscoveryError::DiscoveryFailed(
                "Discovery command is empty".to_string(),
            ));
        }

        Ok(argv)
    }

    fn working_dir(&self) -> Option<PathBuf> {
        self.config.working_dir.clone()
    }
}

#[async_trait]
impl ClassDiscoverer for CommandDiscoverer {
    async fn discover(&self) -> DiscoveryResult<Vec<TestClass>> {
        let argv = self.argv()?;
        debug!("Running discovery command: {:?}", argv);

        let mut cmd = tokio::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(dir) = self.working_dir() {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| DiscoveryError::DiscoveryFailed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(DiscoveryError::DiscoveryFailed(format!(
                "Discovery command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let classes = parse_listing(&stdout);

        if classes.is_empty() {
            warn!("No test classes discovered. stderr: {}", stderr.trim());
        }

        Ok(classes)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
