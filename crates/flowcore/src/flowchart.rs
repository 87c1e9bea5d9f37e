use crate::{Globals, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized flowchart: nodes, their parameters and the connections between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flowchart {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub globals: Globals,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

impl Flowchart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> &str {
        self.nodes.push(node);
        &self.nodes[self.nodes.len() - 1].name
    }

    pub fn connect(
        &mut self,
        from_node: impl Into<String>,
        from_terminal: impl Into<String>,
        to_node: impl Into<String>,
        to_terminal: impl Into<String>,
    ) {
        self.connections.push(ConnectionSpec {
            from_node: from_node.into(),
            from_terminal: from_terminal.into(),
            to_node: to_node.into(),
            to_terminal: to_terminal.into(),
        });
    }

    pub fn find_node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Node entry in a flowchart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub register: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marked_inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marked_outputs: Vec<String>,
}

impl NodeSpec {
    pub fn new(
        name: impl Into<String>,
        register: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            register: register.into(),
            node_type: node_type.into(),
            position: None,
            parameters: HashMap::new(),
            marked_inputs: Vec::new(),
            marked_outputs: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn mark_input(mut self, terminal: impl Into<String>) -> Self {
        self.marked_inputs.push(terminal.into());
        self
    }

    pub fn mark_output(mut self, terminal: impl Into<String>) -> Self {
        self.marked_outputs.push(terminal.into());
        self
    }
}

/// Connection between two node terminals
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from_node: String,
    pub from_terminal: String,
    pub to_node: String,
    pub to_terminal: String,
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
