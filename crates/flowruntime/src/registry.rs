use flowcore::{GraphError, Node, NodeError, TypeTag};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a new instance of the node. The registry is handed over so that
    /// nodes embedding whole flowcharts can instantiate their own sub-graphs.
    fn create(&self, registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError>;

    /// Get node type identifier
    fn node_type(&self) -> &str;

    /// Optional: Get node metadata (description, terminal schema, etc.)
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<TerminalDefinition>,
    pub outputs: Vec<TerminalDefinition>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerminalDefinition {
    pub name: String,
    pub types: Vec<TypeTag>,
    pub required: bool,
}

impl TerminalDefinition {
    pub fn new(name: impl Into<String>, types: &[TypeTag]) -> Self {
        Self {
            name: name.into(),
            types: types.to_vec(),
            required: true,
        }
    }
}

/// A named library of node types
pub struct NodeRegister {
    name: String,
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegister {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factories: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::info!("Registering node type: {}/{}", self.name, node_type);
        self.factories.insert(node_type, factory);
    }

    pub fn factory(&self, node_type: &str) -> Option<&Arc<dyn NodeFactory>> {
        self.factories.get(node_type)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

/// All registers a node manager may create nodes from
#[derive(Default)]
pub struct NodeRegistry {
    registers: HashMap<String, NodeRegister>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a register, replacing one of the same name
    pub fn add_register(&mut self, register: NodeRegister) {
        self.registers.insert(register.name.clone(), register);
    }

    pub fn register(&self, name: &str) -> Option<&NodeRegister> {
        self.registers.get(name)
    }

    pub fn register_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a factory by register and type name
    pub fn factory(&self, register: &str, node_type: &str) -> Result<&Arc<dyn NodeFactory>, GraphError> {
        let reg = self
            .registers
            .get(register)
            .ok_or_else(|| GraphError::UnknownRegister(register.to_string()))?;
        reg.factory(node_type).ok_or_else(|| GraphError::UnknownNodeType {
            register: register.to_string(),
            node_type: node_type.to_string(),
        })
    }
}
