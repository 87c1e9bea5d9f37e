use crate::TypeTag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Malformed flowchart description at {location}: {message}")]
    MalformedDescription { location: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    pub fn node(node: impl Into<String>, source: NodeError) -> Self {
        FlowError::Node {
            node: node.into(),
            source,
        }
    }

    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::MalformedDescription {
            location: location.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Output '{terminal}' does not accept values of type {actual}")]
    InvalidOutputType { terminal: String, actual: TypeTag },

    #[error("Unknown terminal: {0}")]
    UnknownTerminal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Row inputs have unequal lengths: '{first}' has {expected} rows, '{terminal}' has {actual}")]
    UnequalRowLengths {
        first: String,
        expected: usize,
        terminal: String,
        actual: usize,
    },
}

/// Why a proposed connection was refused. The graph is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    #[error("no common type between {output:?} and {input:?}")]
    TypeMismatch {
        output: Vec<TypeTag>,
        input: Vec<TypeTag>,
    },

    #[error("input already has a connection")]
    InputOccupied,

    #[error("terminals are already connected")]
    Duplicate,

    #[error("a poly output can only feed a poly input")]
    FamilyMismatch,

    #[error("vector and scalar terminals cannot be connected")]
    ShapeMismatch,

    #[error("connection would create a cycle")]
    Cycle,
}

#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Connection {from} -> {to} rejected: {reason}")]
    ConnectionRejected {
        from: String,
        to: String,
        reason: RejectReason,
    },

    #[error("Connection {from} -> {to} does not exist")]
    NotConnected { from: String, to: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Terminal '{terminal}' not found on node '{node}'")]
    TerminalNotFound { node: String, terminal: String },

    #[error("Node name already in use: {0}")]
    DuplicateName(String),

    #[error("Unknown node register: {0}")]
    UnknownRegister(String),

    #[error("Unknown node type '{node_type}' in register '{register}'")]
    UnknownNodeType { register: String, node_type: String },
}
