//! Thread-safe work queue over one node's test classes.
//!
//! Consumers (one per device) pull single classes or fixed-size batches from
//! a shared [`WorkQueue`]. The check for remaining work and the removal happen
//! under one lock, so no class is handed out twice and none is lost.
//!
//! # Example
//!
//! ```
//! use testshard::discovery::TestClass;
//! use testshard::queue::WorkQueue;
//!
//! let queue = WorkQueue::new(vec![TestClass::new("B"), TestClass::new("A")]);
//! assert_eq!(queue.take_one().unwrap().name(), "A");
//! assert_eq!(queue.take_batch(5).unwrap().len(), 1);
//! assert!(queue.take_batch(5).is_none());
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::discovery::TestClass;

/// FIFO queue of test classes in ascending name order.
///
/// Classes are never added after construction; the queue only drains.
#[derive(Debug)]
pub struct WorkQueue {
    classes: Mutex<VecDeque<TestClass>>,
}

impl WorkQueue {
    /// Creates a queue over `classes`, sorting them by name.
    ///
    /// Duplicates are kept: every element passed in is handed out exactly
    /// once.
    pub fn new(mut classes: Vec<TestClass>) -> Self {
        classes.sort();
        Self {
            classes: Mutex::new(classes.into()),
        }
    }

    // The guarded data is a plain collection, so a poisoned lock is safe to
    // keep using.
    fn lock(&self) -> MutexGuard<'_, VecDeque<TestClass>> {
        self.classes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns how many classes remain.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no classes remain.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns the next class, or `None` once exhausted.
    pub fn take_one(&self) -> Option<TestClass> {
        self.lock().pop_front()
    }

    /// Removes and returns up to `count` classes from the head, in order.
    ///
    /// Returns fewer than `count` when fewer remain, and `None` (never an
    /// empty batch) when nothing could be removed.
    pub fn take_batch(&self, count: usize) -> Option<Vec<TestClass>> {
        let mut classes = self.lock();
        let take = count.min(classes.len());
        if take == 0 {
            return None;
        }
        Some(classes.drain(..take).collect())
    }
}
