//! Core abstractions for the flow engine
//!
//! This crate provides the value model, terminals, the node trait and the
//! serialized flowchart form that all other components depend on.

mod error;
pub mod events;
mod flowchart;
mod globals;
mod node;
mod terminal;
mod value;

pub use error::{FlowError, GraphError, NodeError, RejectReason};
pub use events::*;
pub use flowchart::{ConnectionSpec, Flowchart, NodeSpec, Position};
pub use globals::{Globals, ROW_INDEX_GLOBAL};
pub use node::{Node, NodeSetup, NodeStatus, Parameters, ProcessContext};
pub use terminal::{full_name, Direction, Family, SubTerminal, Terminal};
pub use value::{Point, TypeTag, Value};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
