//! Flowchart description load/save.

use crate::graph::NodeHandle;
use crate::manager::NodeManager;
use crate::registry::NodeRegistry;
use flowcore::{Direction, FlowError, Flowchart};
use std::path::Path;
use std::sync::Arc;

/// Read and parse a flowchart description file
pub fn read_flowchart(path: impl AsRef<Path>) -> Result<Flowchart, FlowError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    Flowchart::from_json(&json).map_err(|e| FlowError::malformed(path.display().to_string(), e.to_string()))
}

/// Populate `manager` from a description: globals, nodes (created, named,
/// positioned, parameterized, marked) and then connections.
///
/// Globals already set on `manager` win over the description's, so inherited
/// values are visible while parameters load.
///
/// A failure leaves the manager partially loaded; discard it.
pub fn load_flowchart(manager: &mut NodeManager, flowchart: &Flowchart) -> Result<Vec<NodeHandle>, FlowError> {
    manager.globals_mut().merge_missing(&flowchart.globals);

    let mut handles = Vec::with_capacity(flowchart.nodes.len());
    for spec in &flowchart.nodes {
        let location = format!("node '{}'", spec.name);
        let handle = manager.create_node(&spec.register, &spec.node_type).map_err(|e| {
            tracing::error!("Cannot create {}: {}", location, e);
            e
        })?;
        manager
            .name_node(handle, &spec.name)
            .map_err(|e| FlowError::malformed(&location, e.to_string()))?;
        if let Some(position) = spec.position {
            manager.set_position(handle, position)?;
        }
        if !spec.parameters.is_empty() {
            manager.set_parameters(handle, spec.parameters.clone())?;
        }
        for terminal in &spec.marked_inputs {
            manager
                .mark_terminal(handle, Direction::Input, terminal, true)
                .map_err(|e| FlowError::malformed(&location, e.to_string()))?;
        }
        for terminal in &spec.marked_outputs {
            manager
                .mark_terminal(handle, Direction::Output, terminal, true)
                .map_err(|e| FlowError::malformed(&location, e.to_string()))?;
        }
        handles.push(handle);
    }

    for (i, c) in flowchart.connections.iter().enumerate() {
        let location = format!(
            "connection #{} ({}.{} -> {}.{})",
            i, c.from_node, c.from_terminal, c.to_node, c.to_terminal
        );
        let from = manager
            .node(&c.from_node)
            .ok_or_else(|| FlowError::malformed(&location, format!("unknown node '{}'", c.from_node)))?;
        let to = manager
            .node(&c.to_node)
            .ok_or_else(|| FlowError::malformed(&location, format!("unknown node '{}'", c.to_node)))?;
        manager
            .connect(from, &c.from_terminal, to, &c.to_terminal)
            .map_err(|e| FlowError::malformed(&location, e.to_string()))?;
    }

    tracing::info!(
        "Loaded flowchart '{}': {} nodes, {} connections",
        flowchart.name,
        handles.len(),
        flowchart.connections.len()
    );
    Ok(handles)
}

pub fn load_path(manager: &mut NodeManager, path: impl AsRef<Path>) -> Result<Vec<NodeHandle>, FlowError> {
    let flowchart = read_flowchart(path)?;
    load_flowchart(manager, &flowchart)
}

/// Write the manager's flowchart to `path` as pretty-printed JSON
pub fn save_path(manager: &NodeManager, name: &str, path: impl AsRef<Path>) -> Result<(), FlowError> {
    let json = manager.to_flowchart(name).to_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

impl NodeManager {
    /// Build a manager from a description
    pub fn from_flowchart(registry: Arc<NodeRegistry>, flowchart: &Flowchart) -> Result<Self, FlowError> {
        let mut manager = NodeManager::new(registry);
        load_flowchart(&mut manager, flowchart)?;
        Ok(manager)
    }
}
