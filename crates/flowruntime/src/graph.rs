//! Connection graph storage and traversal.
//!
//! Nodes live in a `StableDiGraph` arena so that indices survive removals.
//! Edges carry the terminal names and the type bound at connect time.

use flowcore::{Node, NodeStatus, Parameters, Position, Terminal, TypeTag};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Stable reference to a node inside one `NodeManager`.
///
/// The creation sequence number guards against a freed arena slot being
/// reused by a later node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) index: NodeIndex,
    pub(crate) seq: u64,
}

pub(crate) struct NodeEntry {
    pub name: String,
    pub register: Option<String>,
    pub node_type: String,
    pub seq: u64,
    pub node: Box<dyn Node>,
    pub inputs: Vec<Terminal>,
    pub outputs: Vec<Terminal>,
    pub params: Parameters,
    pub status: NodeStatus,
    pub position: Option<Position>,
}

impl NodeEntry {
    pub fn input(&self, name: &str) -> Option<&Terminal> {
        self.inputs.iter().find(|t| t.name() == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Terminal> {
        self.inputs.iter_mut().find(|t| t.name() == name)
    }

    pub fn output(&self, name: &str) -> Option<&Terminal> {
        self.outputs.iter().find(|t| t.name() == name)
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut Terminal> {
        self.outputs.iter_mut().find(|t| t.name() == name)
    }

    /// Every input either carries data or is optional.
    pub fn inputs_ready(&self) -> bool {
        self.inputs.iter().all(|t| t.is_optional() || t.has_data())
    }

    pub fn clear_outputs(&mut self) {
        self.outputs.iter_mut().for_each(Terminal::clear_data);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub from_terminal: String,
    pub to_terminal: String,
    pub type_tag: TypeTag,
}

pub(crate) type FlowGraph = StableDiGraph<NodeEntry, Link>;

/// Nodes reachable from `roots` along edges, roots included.
pub(crate) fn forward_closure(graph: &FlowGraph, roots: &[NodeIndex]) -> HashSet<NodeIndex> {
    let mut visited = HashSet::new();
    let mut stack: Vec<NodeIndex> = roots.to_vec();

    while let Some(n) = stack.pop() {
        if !visited.insert(n) {
            continue;
        }
        stack.extend(graph.neighbors_directed(n, Direction::Outgoing));
    }
    visited
}

/// Nodes strictly downstream of `node`.
pub(crate) fn descendants(graph: &FlowGraph, node: NodeIndex) -> HashSet<NodeIndex> {
    let children: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
    forward_closure(graph, &children)
}

/// Kahn's algorithm over `targets`, ties broken by creation order.
///
/// Edges from outside the target set are ignored.
pub(crate) fn topological_order(graph: &FlowGraph, targets: &HashSet<NodeIndex>) -> Vec<NodeIndex> {
    let mut in_degree: HashMap<NodeIndex, usize> = targets.iter().map(|&n| (n, 0)).collect();
    for &n in targets {
        for edge in graph.edges_directed(n, Direction::Outgoing) {
            if let Some(d) = in_degree.get_mut(&edge.target()) {
                *d += 1;
            }
        }
    }

    let mut ready: BTreeSet<(u64, NodeIndex)> = in_degree
        .iter()
        .filter(|&(_, &d)| d == 0)
        .map(|(&n, _)| (graph[n].seq, n))
        .collect();

    let mut order = Vec::with_capacity(targets.len());
    while let Some((_, n)) = ready.pop_first() {
        order.push(n);

        for edge in graph.edges_directed(n, Direction::Outgoing) {
            let t = edge.target();
            if let Some(d) = in_degree.get_mut(&t) {
                *d -= 1;
                if *d == 0 {
                    ready.insert((graph[t].seq, t));
                }
            }
        }
    }
    order
}

/// Nodes without inbound edges.
pub(crate) fn roots(graph: &FlowGraph) -> Vec<NodeIndex> {
    graph
        .node_indices()
        .filter(|&n| {
            graph
                .neighbors_directed(n, Direction::Incoming)
                .next()
                .is_none()
        })
        .collect()
}
