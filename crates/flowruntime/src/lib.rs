//! Flowchart execution runtime
//!
//! This crate holds the connection graph, the `NodeManager` that owns one
//! flowchart's nodes and runs them in dependency order, the node registry
//! and flowchart load/save.

mod executor;
mod graph;
pub mod loader;
mod manager;
mod registry;
mod runtime;

pub use executor::RunReport;
pub use graph::NodeHandle;
pub use loader::{load_flowchart, load_path, read_flowchart, save_path};
pub use manager::NodeManager;
pub use registry::{NodeFactory, NodeMetadata, NodeRegister, NodeRegistry, TerminalDefinition};
pub use runtime::{FlowRuntime, RuntimeConfig};
