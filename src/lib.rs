//! testshard: deterministic sharding of instrumentation test suites.
//!
//! This crate decides which instrumentation test classes run on which node
//! of a multi-node run, and hands each node's classes out to the devices
//! attached to it. It does not talk to devices or execute tests itself.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Manifest**: Resolve application package, test package and runner class
//! - **Discovery**: Produce the candidate test classes
//! - **Filter**: Keep classes matching user patterns
//! - **Shard**: Deterministically pick this node's classes
//! - **Queue**: Serve classes to concurrent consumers without duplication
//! - **Descriptor**: The immutable per-run configuration tying it together
//!
//! # Example
//!
//! ```no_run
//! use testshard::descriptor::{RunDescriptor, RunParameters};
//! use testshard::discovery::list::ListDiscoverer;
//! use testshard::manifest::XmlManifest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let params = RunParameters { total_nodes: 3, node_index: 1, ..Default::default() };
//!     let manifest = XmlManifest::open("build/AndroidManifest.xml")?;
//!     let discoverer = ListDiscoverer::new("build/test-classes.txt");
//!
//!     let descriptor = RunDescriptor::build(manifest, &discoverer, &params).await?;
//!     if let Some(queue) = descriptor.work_queue() {
//!         while let Some(batch) = queue.take_batch(descriptor.batch_size()) {
//!             println!("{:?}", batch);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod dispatch;
pub mod filter;
pub mod manifest;
pub mod queue;
pub mod shard;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use descriptor::{PlanError, RunDescriptor, RunParameters};
pub use discovery::{ClassDiscoverer, TestClass};
pub use dispatch::{BatchConsumer, DispatchReport, dispatch};
pub use filter::ClassFilter;
pub use manifest::{InstrumentationInfo, ManifestError, XmlManifest};
pub use queue::WorkQueue;
