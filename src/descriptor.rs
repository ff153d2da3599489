//! Run configuration assembly.
//!
//! A [`RunDescriptor`] is the immutable description of one node's run: who
//! the instrumentation is (resolved from the manifest), which test classes
//! this node owns, and how many classes each consumer pulls at a time. It is
//! built once per run and handed to every consumer by reference; nothing
//! about a run lives in process-wide state.
//!
//! ```text
//!  manifest events ──► InstrumentationInfo ─────────────┐
//!                                                       ▼
//!  ClassDiscoverer ──► dedupe ─► filter ─► sort ─► shard ──► RunDescriptor
//!                                                       ▲
//!  RunParameters (nodes, index, batch size, filter) ────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::discovery::{self, ClassDiscoverer, DiscoveryError, TestClass};
use crate::filter::ClassFilter;
use crate::manifest::{InstrumentationInfo, ManifestError, ManifestEvents};
use crate::queue::WorkQueue;
use crate::shard;

/// Default number of classes handed to a consumer per pull.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Errors that abort building a [`RunDescriptor`].
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Node count, node index or batch size out of range.
    #[error("Invalid run parameters: {0}")]
    InvalidParameters(String),

    /// The manifest was unreadable or lacked a required field.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Test class discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Result type for run planning.
pub type PlanResult<T> = Result<T, PlanError>;

/// Caller-chosen execution parameters for one node.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `total_nodes` | 1 |
/// | `node_index` | 0 |
/// | `batch_size` | 5 |
/// | `filter` | None |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Number of independent nodes sharing the suite.
    pub total_nodes: usize,

    /// This node's zero-based index.
    pub node_index: usize,

    /// Classes handed to a consumer per pull.
    pub batch_size: usize,

    /// Comma-separated inclusion patterns.
    pub filter: Option<String>,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            total_nodes: 1,
            node_index: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            filter: None,
        }
    }
}

impl RunParameters {
    /// Checks the parameters are in range.
    pub fn validate(&self) -> PlanResult<()> {
        if self.total_nodes == 0 {
            return Err(PlanError::InvalidParameters(
                "total node count must be at least 1".to_string(),
            ));
        }
        if self.node_index >= self.total_nodes {
            return Err(PlanError::InvalidParameters(format!(
                "node index {} is out of range for {} nodes",
                self.node_index, self.total_nodes
            )));
        }
        if self.batch_size == 0 {
            return Err(PlanError::InvalidParameters(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the parsed inclusion filter, if one with patterns was given.
    pub fn class_filter(&self) -> Option<ClassFilter> {
        ClassFilter::from_option(self.filter.as_deref())
    }

    /// Returns `true` if test classes have to be discovered and selected.
    ///
    /// A single node without a filter runs everything, so discovery is
    /// skipped entirely.
    pub fn needs_selection(&self) -> bool {
        self.total_nodes > 1 || self.class_filter().is_some()
    }
}

/// The resolved configuration of one node's run.
#[derive(Debug, Clone, Serialize)]
pub struct RunDescriptor {
    application_package: String,
    instrumentation_package: String,
    test_runner_class: String,
    test_classes: Option<Vec<TestClass>>,
    total_nodes: usize,
    node_index: usize,
    batch_size: usize,
}

impl RunDescriptor {
    /// Combines a resolved manifest identity with this node's classes.
    ///
    /// `owned_classes` is the node's selection from
    /// [`shard::select_classes`], or `None` to run everything. It is dropped
    /// when parameters do not call for selection, so a single unfiltered node
    /// never carries a class list.
    ///
    /// Fails if any identifier in `info` is empty, or if selection is
    /// required but `owned_classes` is `None`.
    pub fn assemble(
        info: InstrumentationInfo,
        owned_classes: Option<Vec<TestClass>>,
        params: &RunParameters,
    ) -> PlanResult<Self> {
        params.validate()?;
        info.validate()?;

        let test_classes = if params.needs_selection() {
            if owned_classes.is_none() {
                return Err(PlanError::InvalidParameters(format!(
                    "node {} of {} requires a class selection",
                    params.node_index, params.total_nodes
                )));
            }
            owned_classes
        } else {
            None
        };

        Ok(Self {
            application_package: info.application_package,
            instrumentation_package: info.instrumentation_package,
            test_runner_class: info.test_runner_class,
            test_classes,
            total_nodes: params.total_nodes,
            node_index: params.node_index,
            batch_size: params.batch_size,
        })
    }

    /// Builds a descriptor from manifest events and a class discoverer.
    ///
    /// Parameters are validated and the manifest resolved before anything
    /// else, so a bad manifest aborts the run without discovery or sharding.
    /// Discovery only runs when [`RunParameters::needs_selection`] holds.
    pub async fn build<E, D>(events: E, discoverer: &D, params: &RunParameters) -> PlanResult<Self>
    where
        E: ManifestEvents,
        D: ClassDiscoverer + ?Sized,
    {
        params.validate()?;
        let info = InstrumentationInfo::resolve(events)?;

        let owned = if params.needs_selection() {
            info!("Loading test classes using {} discovery", discoverer.name());
            let discovered = discoverer.discover().await?;
            Some(shard::select_classes(
                discovered,
                params.class_filter().as_ref(),
                params.total_nodes,
                params.node_index,
            ))
        } else {
            info!("Not filtering test classes");
            None
        };

        Self::assemble(info, owned, params)
    }

    /// Package of the application under test.
    pub fn application_package(&self) -> &str {
        &self.application_package
    }

    /// Package of the instrumentation (test) application.
    pub fn instrumentation_package(&self) -> &str {
        &self.instrumentation_package
    }

    /// Fully-qualified test runner class.
    pub fn test_runner_class(&self) -> &str {
        &self.test_runner_class
    }

    /// Classes owned by this node, or `None` meaning "run everything".
    pub fn test_classes(&self) -> Option<&[TestClass]> {
        self.test_classes.as_deref()
    }

    /// Names of the owned classes; `None` if absent or empty.
    pub fn test_class_names(&self) -> Option<Vec<&str>> {
        discovery::class_names(self.test_classes.as_deref()?)
    }

    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    pub fn node_index(&self) -> usize {
        self.node_index
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns `true` if this run executes the whole suite unsharded.
    pub fn runs_everything(&self) -> bool {
        self.test_classes.is_none()
    }

    /// Creates a fresh work queue over the owned classes.
    ///
    /// Returns `None` when the run is not sharded; the whole suite then runs
    /// as one instrumentation invocation per device.
    pub fn work_queue(&self) -> Option<WorkQueue> {
        self.test_classes.clone().map(WorkQueue::new)
    }
}

impl fmt::Display for RunDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application package: {}", self.application_package)?;
        writeln!(f, "Instrumentation package: {}", self.instrumentation_package)?;
        writeln!(f, "Test runner: {}", self.test_runner_class)?;
        writeln!(f, "Node: {} of {}", self.node_index, self.total_nodes)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        match &self.test_classes {
            None => write!(f, "Test classes: all"),
            Some(classes) => {
                write!(f, "Test classes: {}", classes.len())?;
                for class in classes {
                    write!(f, "\n  {}", class.name())?;
                    if !class.is_whole_class() {
                        let methods: Vec<&str> =
                            class.methods().iter().map(String::as_str).collect();
                        write!(f, " [{}]", methods.join(", "))?;
                    }
                }
                Ok(())
            }
        }
    }
}
