//! User-supplied inclusion filter over discovered test classes.
//!
//! The filter string is a comma-separated list of patterns. A class is kept
//! if any pattern matches it, either literally or as a regular expression
//! over the whole class name. A pattern without `.*` in it is treated as a
//! substring match, so `LoginTest` keeps `com.example.LoginTest`.
//!
//! # Example
//!
//! ```
//! use testshard::discovery::TestClass;
//! use testshard::filter::ClassFilter;
//!
//! let classes = vec![
//!     TestClass::new("com.example.LoginTest"),
//!     TestClass::new("com.example.CheckoutTest"),
//!     TestClass::new("com.example.ui.ScreenTest"),
//! ];
//!
//! let filter = ClassFilter::new("Login, com.example.ui.*");
//! let mut kept = filter.apply(classes);
//! kept.sort();
//! assert_eq!(kept.len(), 2);
//! assert_eq!(kept[0].name(), "com.example.LoginTest");
//! ```

use std::collections::HashSet;

use regex::Regex;
use tracing::{info, warn};

use crate::discovery::TestClass;

/// The token that marks a pattern as already being a wildcard expression.
const WILDCARD: &str = ".*";

/// A single filter pattern.
#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    /// `None` when the source is not a valid expression; only literal
    /// matching applies then.
    regex: Option<Regex>,
}

impl Pattern {
    fn new(source: &str) -> Self {
        let expr = if source.contains(WILDCARD) {
            source.to_string()
        } else {
            format!("{}{}{}", WILDCARD, source, WILDCARD)
        };

        let regex = match Regex::new(&format!("^(?:{})$", expr)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Filter '{}' is not a valid pattern, matching literally: {}", source, e);
                None
            }
        };

        Self {
            source: source.to_string(),
            regex,
        }
    }

    fn matches(&self, class_name: &str) -> bool {
        class_name == self.source || self.regex.as_ref().is_some_and(|re| re.is_match(class_name))
    }
}

/// Filters classes by a comma-separated pattern list.
#[derive(Debug, Clone)]
pub struct ClassFilter {
    patterns: Vec<Pattern>,
}

impl ClassFilter {
    /// Parses a comma-separated pattern list.
    ///
    /// Patterns are trimmed and empty entries are dropped.
    pub fn new(patterns: &str) -> Self {
        Self {
            patterns: patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Pattern::new)
                .collect(),
        }
    }

    /// Builds a filter from an optional pattern list.
    ///
    /// Returns `None` when there is nothing to filter by.
    pub fn from_option(patterns: Option<&str>) -> Option<Self> {
        let filter = Self::new(patterns?);
        if filter.is_empty() { None } else { Some(filter) }
    }

    /// Returns `true` if the filter has no patterns (passes everything).
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the pattern sources in declaration order.
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.source.as_str()).collect()
    }

    /// Keeps the classes that match at least one pattern.
    ///
    /// The result holds each class at most once and has no particular order;
    /// callers sort it before sharding. Patterns that matched nothing are
    /// logged once and never cause an error. An empty filter returns the
    /// input unchanged.
    pub fn apply(&self, classes: Vec<TestClass>) -> Vec<TestClass> {
        if self.is_empty() {
            return classes;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut keep = vec![false; classes.len()];
        let mut unmatched: Vec<&str> = Vec::new();

        for pattern in &self.patterns {
            let mut matched = false;
            for (i, class) in classes.iter().enumerate() {
                if pattern.matches(class.name()) {
                    matched = true;
                    if seen.insert(class.name()) {
                        keep[i] = true;
                    }
                }
            }
            if !matched {
                unmatched.push(&pattern.source);
            }
        }

        if !unmatched.is_empty() {
            info!(
                "Filters specified but did not match any classes: {}",
                unmatched.join(", ")
            );
        }

        classes
            .into_iter()
            .zip(keep)
            .filter_map(|(class, keep)| keep.then_some(class))
            .collect()
    }
}
