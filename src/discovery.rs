//! Test class model and discovery collaborators.
//!
//! Scanning a compiled test artifact for candidate classes is not done here.
//! Instead, a [`ClassDiscoverer`] produces an unordered collection of
//! [`TestClass`] values that the sharding pipeline then filters, sorts and
//! partitions.
//!
//! # Built-in Discoverers
//!
//! | Discoverer | Source |
//! |------------|--------|
//! | [`list::ListDiscoverer`] | A class listing file |
//! | [`command::CommandDiscoverer`] | stdout of a user command |
//!
//! # Listing Format
//!
//! Both built-in discoverers read the same line-oriented format:
//!
//! ```text
//! # comments and blank lines are ignored
//! com.example.LoginTest
//! com.example.CheckoutTest#testEmptyCart
//! com.example.CheckoutTest#testCoupon
//! ```
//!
//! Lines naming the same class merge into a single [`TestClass`].

pub mod command;
pub mod list;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DiscoveryConfig;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that can occur while discovering test classes.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The discovery command could not be run or exited unsuccessfully.
    #[error("Failed to discover test classes: {0}")]
    DiscoveryFailed(String),

    /// I/O error reading a listing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One discoverable test unit.
///
/// Identity, equality and ordering are all defined by the fully-qualified
/// class name alone. Two values with the same name are the same class even if
/// their method sets differ, which keeps the working set a value set and the
/// sort order total and reproducible across processes.
///
/// # Example
///
/// ```
/// use testshard::discovery::TestClass;
///
/// let a = TestClass::new("com.example.LoginTest").with_method("testValid");
/// let b = TestClass::new("com.example.LoginTest");
/// assert_eq!(a, b);
/// assert!(TestClass::new("com.example.A") < TestClass::new("com.example.B"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestClass {
    /// Fully-qualified class name.
    name: String,

    /// Methods to run. Empty means the whole class.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    methods: BTreeSet<String>,
}

impl TestClass {
    /// Creates a test class covering every method of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeSet::new(),
        }
    }

    /// Adds a method to run.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.insert(method.into());
        self
    }

    /// Returns the fully-qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the selected methods, empty when the whole class runs.
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Returns `true` if the whole class runs.
    pub fn is_whole_class(&self) -> bool {
        self.methods.is_empty()
    }
}

impl PartialEq for TestClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TestClass {}

impl Hash for TestClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for TestClass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TestClass {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::fmt::Display for TestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Returns the class names of `classes`, or `None` if there are none.
pub fn class_names(classes: &[TestClass]) -> Option<Vec<&str>> {
    if classes.is_empty() {
        return None;
    }
    Some(classes.iter().map(TestClass::name).collect())
}

/// Collapses duplicate classes into one entry per name.
///
/// Method sets of duplicates are merged. A class listed once without methods
/// means "whole class" and wins over any method selection.
pub fn dedupe(classes: impl IntoIterator<Item = TestClass>) -> Vec<TestClass> {
    let mut merged: BTreeMap<String, Option<BTreeSet<String>>> = BTreeMap::new();
    for class in classes {
        let whole = class.is_whole_class();
        let entry = merged
            .entry(class.name)
            .or_insert_with(|| Some(BTreeSet::new()));
        if whole {
            *entry = None;
        } else if let Some(methods) = entry {
            methods.extend(class.methods);
        }
    }

    merged
        .into_iter()
        .map(|(name, methods)| TestClass {
            name,
            methods: methods.unwrap_or_default(),
        })
        .collect()
}

/// Parses a class listing into test classes.
///
/// See the module documentation for the format.
pub fn parse_listing(listing: &str) -> Vec<TestClass> {
    let entries = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.split_once('#') {
            Some((class, method)) => {
                let (class, method) = (class.trim(), method.trim());
                if class.is_empty() {
                    return None;
                }
                if method.is_empty() {
                    Some(TestClass::new(class))
                } else {
                    Some(TestClass::new(class).with_method(method))
                }
            }
            None => Some(TestClass::new(line)),
        });

    dedupe(entries)
}

/// Produces the candidate test classes for a run.
///
/// Implementations stand in for static inspection of a compiled test
/// artifact. The returned collection is unordered and may contain duplicates;
/// callers dedupe and sort.
#[async_trait]
pub trait ClassDiscoverer: Send + Sync {
    /// Discovers candidate test classes.
    async fn discover(&self) -> DiscoveryResult<Vec<TestClass>>;

    /// Returns the discoverer name (for logging).
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: ClassDiscoverer + ?Sized> ClassDiscoverer for Box<T> {
    async fn discover(&self) -> DiscoveryResult<Vec<TestClass>> {
        (**self).discover().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Creates the discoverer selected by configuration.
pub fn from_config(config: &DiscoveryConfig) -> Box<dyn ClassDiscoverer> {
    match config {
        DiscoveryConfig::List(cfg) => Box::new(list::ListDiscoverer::from_config(cfg)),
        DiscoveryConfig::Command(cfg) => Box::new(command::CommandDiscoverer::new(cfg.clone())),
    }
}

/// Discoverer over an in-memory class collection.
///
/// Useful when the caller already scanned the artifact itself.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscoverer {
    classes: Vec<TestClass>,
}

impl StaticDiscoverer {
    /// Creates a discoverer returning `classes`.
    pub fn new(classes: Vec<TestClass>) -> Self {
        Self { classes }
    }
}

#[async_trait]
impl ClassDiscoverer for StaticDiscoverer {
    async fn discover(&self) -> DiscoveryResult<Vec<TestClass>> {
        Ok(self.classes.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
