//! Deterministic partitioning of test classes across nodes.
//!
//! Nodes never talk to each other. Each one recomputes the same global order
//! (sort by class name) and keeps every element whose position `i` satisfies
//! `i % total_nodes == node_index`. Because the partition is a pure function
//! of the class set and `(total_nodes, node_index)`, the union of all nodes'
//! partitions is exactly the class set, with no overlap.
//!
//! # Example
//!
//! ```
//! use testshard::discovery::TestClass;
//! use testshard::shard::shard;
//!
//! let classes: Vec<_> = (0..10).map(|i| TestClass::new(format!("A{}", i))).collect();
//! let node0 = shard(classes, 3, 0);
//! let names: Vec<_> = node0.iter().map(|c| c.name()).collect();
//! assert_eq!(names, vec!["A0", "A3", "A6", "A9"]);
//! ```

use tracing::info;

use crate::discovery::{self, TestClass};
use crate::filter::ClassFilter;

/// Selects the elements at positions `i` where `i % total == current`.
///
/// `list` must already be in its global order. With `total == 1` the list is
/// returned unchanged.
pub fn filter_by_node_index(list: Vec<TestClass>, total: usize, current: usize) -> Vec<TestClass> {
    if total <= 1 {
        return list;
    }

    list.into_iter()
        .enumerate()
        .filter(|(i, _)| i % total == current)
        .map(|(_, class)| class)
        .collect()
}

/// Sorts `classes` by name and returns the partition owned by `node_index`.
///
/// With `total_nodes == 1` the input is returned as is, without sorting.
pub fn shard(mut classes: Vec<TestClass>, total_nodes: usize, node_index: usize) -> Vec<TestClass> {
    if total_nodes <= 1 {
        return classes;
    }

    classes.sort();
    filter_by_node_index(classes, total_nodes, node_index)
}

/// Runs the full selection pipeline for one node.
///
/// Discovered classes are deduplicated by name, narrowed by `filter` (if
/// any), sorted and sharded. The result is in ascending name order. Empty
/// results are valid and simply mean the node has no work.
pub fn select_classes(
    discovered: Vec<TestClass>,
    filter: Option<&ClassFilter>,
    total_nodes: usize,
    node_index: usize,
) -> Vec<TestClass> {
    let unique = discovery::dedupe(discovered);
    let filtered = match filter {
        Some(filter) => filter.apply(unique),
        None => unique,
    };

    let mut sorted = filtered;
    sorted.sort();
    info!("Loaded {} classes", sorted.len());

    let owned = filter_by_node_index(sorted, total_nodes, node_index);
    info!(
        "Filtered down to {} classes for node {}/{}",
        owned.len(),
        node_index,
        total_nodes
    );

    owned
}
