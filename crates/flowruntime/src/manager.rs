use crate::graph::{self, FlowGraph, Link, NodeEntry, NodeHandle};
use crate::registry::NodeRegistry;
use flowcore::{
    full_name, ConnectionSpec, Direction, EventBus, Family, FlowError, Flowchart, Globals,
    GraphError, Node, NodeSetup, NodeSpec, NodeStatus, Parameters, Position, RejectReason,
    SubTerminal, Terminal, TypeTag, Value,
};
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction as Flow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Owns the nodes and connections of one flowchart and runs them
pub struct NodeManager {
    pub(crate) registry: Arc<NodeRegistry>,
    pub(crate) graph: FlowGraph,
    pub(crate) names: HashMap<String, NodeIndex>,
    pub(crate) globals: Globals,
    pub(crate) events: Option<Arc<EventBus>>,
    next_seq: u64,
}

impl std::fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeManager")
            .field("names", &self.names)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

impl NodeManager {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            graph: FlowGraph::default(),
            names: HashMap::new(),
            globals: Globals::new(),
            events: None,
            next_seq: 0,
        }
    }

    /// Publish execution events on `bus`
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    // ----- nodes -----

    /// Instantiate a node type from a register and give it a unique default name
    pub fn create_node(&mut self, register: &str, node_type: &str) -> Result<NodeHandle, FlowError> {
        let factory = self.registry.factory(register, node_type)?;
        let node = factory
            .create(&self.registry)
            .map_err(|e| FlowError::node(node_type, e))?;
        Ok(self.insert(Some(register.to_string()), node))
    }

    /// Add a node that does not come from a register
    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeHandle {
        self.insert(None, node)
    }

    fn insert(&mut self, register: Option<String>, mut node: Box<dyn Node>) -> NodeHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        let node_type = node.node_type().to_string();
        let name = self.unique_name(&node_type, seq);
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut params = Parameters::new();
        {
            let mut setup = NodeSetup::new(&name, &mut inputs, &mut outputs, &mut params, &self.globals);
            node.init(&mut setup);
        }

        tracing::debug!("Created node {} ({})", name, node_type);
        let index = self.graph.add_node(NodeEntry {
            name: name.clone(),
            register,
            node_type,
            seq,
            node,
            inputs,
            outputs,
            params,
            status: NodeStatus::Unset,
            position: None,
        });
        self.names.insert(name, index);
        NodeHandle { index, seq }
    }

    fn unique_name(&self, base: &str, seq: u64) -> String {
        let mut n = seq;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Rename a node. Names are unique within a manager.
    pub fn name_node(&mut self, handle: NodeHandle, name: &str) -> Result<(), GraphError> {
        let index = self.index(handle)?;
        let old = self.graph[index].name.clone();
        if old == name {
            return Ok(());
        }
        if self.names.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }

        // poly inputs downstream know their sub-terminals by the feeding output's full name
        let outgoing: Vec<(NodeIndex, Link)> = self
            .graph
            .edges_directed(index, Flow::Outgoing)
            .map(|e| (e.target(), e.weight().clone()))
            .collect();
        for (target, link) in outgoing {
            let old_origin = full_name(&old, &link.from_terminal);
            let new_origin = full_name(name, &link.from_terminal);
            if let Some(input) = self.graph[target].input_mut(&link.to_terminal) {
                input.rename_origin(&old_origin, &new_origin);
            }
        }

        self.names.remove(&old);
        self.names.insert(name.to_string(), index);
        self.graph[index].name = name.to_string();
        Ok(())
    }

    /// Remove a node: first every connection touching it, then the node itself
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<(), GraphError> {
        let index = self.index(handle)?;
        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(index, Flow::Incoming)
            .chain(self.graph.edges_directed(index, Flow::Outgoing))
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.disconnect_edge(edge);
        }

        if let Some(entry) = self.graph.remove_node(index) {
            self.names.remove(&entry.name);
            tracing::debug!("Removed node {}", entry.name);
        }
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).map(|&index| NodeHandle {
            index,
            seq: self.graph[index].seq,
        })
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> Vec<NodeHandle> {
        let mut handles: Vec<NodeHandle> = self
            .graph
            .node_indices()
            .map(|index| NodeHandle {
                index,
                seq: self.graph[index].seq,
            })
            .collect();
        handles.sort_by_key(|h| h.seq);
        handles
    }

    pub(crate) fn index(&self, handle: NodeHandle) -> Result<NodeIndex, GraphError> {
        match self.graph.node_weight(handle.index) {
            Some(entry) if entry.seq == handle.seq => Ok(handle.index),
            _ => Err(GraphError::NodeNotFound(format!("#{}", handle.seq))),
        }
    }

    fn entry(&self, handle: NodeHandle) -> Result<&NodeEntry, GraphError> {
        let index = self.index(handle)?;
        Ok(&self.graph[index])
    }

    fn entry_mut(&mut self, handle: NodeHandle) -> Result<&mut NodeEntry, GraphError> {
        let index = self.index(handle)?;
        Ok(&mut self.graph[index])
    }

    pub fn name(&self, handle: NodeHandle) -> Result<&str, GraphError> {
        Ok(&self.entry(handle)?.name)
    }

    pub fn node_type(&self, handle: NodeHandle) -> Result<&str, GraphError> {
        Ok(&self.entry(handle)?.node_type)
    }

    pub fn status(&self, handle: NodeHandle) -> Result<NodeStatus, GraphError> {
        Ok(self.entry(handle)?.status)
    }

    pub fn inputs(&self, handle: NodeHandle) -> Result<&[Terminal], GraphError> {
        Ok(&self.entry(handle)?.inputs)
    }

    pub fn outputs(&self, handle: NodeHandle) -> Result<&[Terminal], GraphError> {
        Ok(&self.entry(handle)?.outputs)
    }

    pub fn input(&self, handle: NodeHandle, terminal: &str) -> Result<&Terminal, GraphError> {
        let entry = self.entry(handle)?;
        entry
            .input(terminal)
            .ok_or_else(|| terminal_not_found(&entry.name, terminal))
    }

    pub fn output(&self, handle: NodeHandle, terminal: &str) -> Result<&Terminal, GraphError> {
        let entry = self.entry(handle)?;
        entry
            .output(terminal)
            .ok_or_else(|| terminal_not_found(&entry.name, terminal))
    }

    /// Write access to an output, for feeding values from outside the graph.
    /// The value reaches connected inputs on the next push.
    pub fn output_mut(&mut self, handle: NodeHandle, terminal: &str) -> Result<&mut Terminal, GraphError> {
        let entry = self.entry_mut(handle)?;
        let name = entry.name.clone();
        entry
            .output_mut(terminal)
            .ok_or_else(|| terminal_not_found(&name, terminal))
    }

    /// Add or replace an output terminal on an existing node
    pub fn add_output_terminal(&mut self, handle: NodeHandle, terminal: Terminal) -> Result<(), GraphError> {
        let index = self.index(handle)?;
        let globals = &self.globals;
        let entry = &mut self.graph[index];
        let mut setup = NodeSetup::new(
            &entry.name,
            &mut entry.inputs,
            &mut entry.outputs,
            &mut entry.params,
            globals,
        );
        setup.add_terminal(terminal);
        Ok(())
    }

    /// Flag a terminal for export at a nested flowchart boundary
    pub fn mark_terminal(
        &mut self,
        handle: NodeHandle,
        direction: Direction,
        terminal: &str,
        marked: bool,
    ) -> Result<(), GraphError> {
        let entry = self.entry_mut(handle)?;
        let found = match direction {
            Direction::Input => entry.inputs.iter_mut().find(|t| t.name() == terminal),
            Direction::Output => entry.outputs.iter_mut().find(|t| t.name() == terminal),
        };
        match found {
            Some(t) => {
                t.set_marked(marked);
                Ok(())
            }
            None => Err(terminal_not_found(&entry.name, terminal)),
        }
    }

    pub fn position(&self, handle: NodeHandle) -> Result<Option<Position>, GraphError> {
        Ok(self.entry(handle)?.position)
    }

    pub fn set_position(&mut self, handle: NodeHandle, position: Position) -> Result<(), GraphError> {
        self.entry_mut(handle)?.position = Some(position);
        Ok(())
    }

    // ----- parameters -----

    pub fn params(&self, handle: NodeHandle) -> Result<&Parameters, GraphError> {
        Ok(&self.entry(handle)?.params)
    }

    pub fn set_parameter(
        &mut self,
        handle: NodeHandle,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), FlowError> {
        let mut params = Parameters::new();
        params.insert(key.to_string(), value.into());
        self.set_parameters(handle, params)
    }

    /// Apply new parameter values, let the node reshape itself and mark it
    /// and everything downstream for re-run
    pub fn set_parameters(&mut self, handle: NodeHandle, params: Parameters) -> Result<(), FlowError> {
        let index = self.index(handle)?;
        {
            let entry = &mut self.graph[index];
            let mut merged = entry.params.clone();
            merged.extend(params);
            entry
                .node
                .validate_config(&merged)
                .map_err(|e| FlowError::node(entry.name.clone(), e))?;
            entry.params = merged;
        }
        self.reconfigure(index)
    }

    /// Run `post_parameter_load` and resync edges with whatever terminals the node now has
    pub(crate) fn reconfigure(&mut self, index: NodeIndex) -> Result<(), FlowError> {
        let globals = &self.globals;
        let entry = &mut self.graph[index];
        let mut setup = NodeSetup::new(
            &entry.name,
            &mut entry.inputs,
            &mut entry.outputs,
            &mut entry.params,
            globals,
        );
        let result = entry.node.post_parameter_load(&mut setup);
        let name = entry.name.clone();

        self.resync_edges(index);
        self.invalidate(&[index], true);
        result.map_err(|e| FlowError::node(name, e))
    }

    /// Drop edges whose terminals vanished or no longer fit, and rebuild the
    /// connection bookkeeping of the node's terminals from the remaining ones.
    fn resync_edges(&mut self, index: NodeIndex) {
        let touching: Vec<(EdgeIndex, NodeIndex, NodeIndex)> = self
            .graph
            .edges_directed(index, Flow::Incoming)
            .chain(self.graph.edges_directed(index, Flow::Outgoing))
            .map(|e| (e.id(), e.source(), e.target()))
            .collect();

        let mut stale = Vec::new();
        for &(edge, source, target) in &touching {
            let link = &self.graph[edge];
            let fits = match (
                self.graph[source].output(&link.from_terminal),
                self.graph[target].input(&link.to_terminal),
            ) {
                (Some(o), Some(i)) => {
                    o.accepts(link.type_tag)
                        && i.accepts(link.type_tag)
                        && o.is_vector() == i.is_vector()
                        && !(o.is_poly() && !i.is_poly())
                }
                _ => false,
            };
            if !fits {
                stale.push(edge);
            }
        }

        let entry = &mut self.graph[index];
        entry.inputs.iter_mut().for_each(Terminal::reset_connections);
        entry.outputs.iter_mut().for_each(Terminal::reset_connections);

        for &(edge, source, target) in &touching {
            if stale.contains(&edge) {
                let link = self.graph[edge].clone();
                let source_name = self.graph[source].name.clone();
                tracing::warn!(
                    "Dropping connection {} -> {} after terminals changed",
                    full_name(&source_name, &link.from_terminal),
                    full_name(&self.graph[target].name, &link.to_terminal),
                );
                self.graph.remove_edge(edge);
                if source == index {
                    self.detach_input(target, &link, &source_name);
                    self.invalidate(&[target], true);
                } else {
                    if let Some(o) = self.graph[source].output_mut(&link.from_terminal) {
                        o.detach();
                    }
                    let origin = full_name(&source_name, &link.from_terminal);
                    if let Some(i) = self.graph[index].input_mut(&link.to_terminal) {
                        i.remove_subs_from(&origin);
                        i.clear_from(&origin);
                    }
                }
                continue;
            }

            let link = self.graph[edge].clone();
            if source == index {
                if let Some(o) = self.graph[index].output_mut(&link.from_terminal) {
                    o.attach(link.type_tag);
                }
            } else {
                let origin = full_name(&self.graph[source].name, &link.from_terminal);
                let source_is_poly = self.graph[source]
                    .output(&link.from_terminal)
                    .is_some_and(Terminal::is_poly);
                if let Some(i) = self.graph[index].input_mut(&link.to_terminal) {
                    i.attach(link.type_tag);
                    if i.is_poly() && !source_is_poly {
                        i.insert_sub(SubTerminal::new(origin.clone(), link.type_tag).with_origin(origin));
                    }
                }
                self.push_edge(edge);
            }
        }
    }

    // ----- connections -----

    /// Whether `from.output -> to.input` would be accepted
    pub fn can_connect(&self, from: NodeHandle, output: &str, to: NodeHandle, input: &str) -> bool {
        self.check_connection(from, output, to, input).is_ok()
    }

    /// Validate a proposed connection and pick the type it would bind to
    pub fn check_connection(
        &self,
        from: NodeHandle,
        output: &str,
        to: NodeHandle,
        input: &str,
    ) -> Result<TypeTag, GraphError> {
        let src = self.index(from)?;
        let dst = self.index(to)?;
        let src_entry = &self.graph[src];
        let dst_entry = &self.graph[dst];
        let o = src_entry
            .output(output)
            .ok_or_else(|| terminal_not_found(&src_entry.name, output))?;
        let i = dst_entry
            .input(input)
            .ok_or_else(|| terminal_not_found(&dst_entry.name, input))?;

        let reject = |reason: RejectReason| GraphError::ConnectionRejected {
            from: full_name(&src_entry.name, output),
            to: full_name(&dst_entry.name, input),
            reason,
        };

        if o.is_vector() != i.is_vector() {
            return Err(reject(RejectReason::ShapeMismatch));
        }
        if o.is_poly() && !i.is_poly() {
            return Err(reject(RejectReason::FamilyMismatch));
        }
        if i.family() == Family::Feature && i.connection_count() > 0 {
            return Err(reject(RejectReason::InputOccupied));
        }
        let duplicate = self
            .graph
            .edges_connecting(src, dst)
            .any(|e| e.weight().from_terminal == output && e.weight().to_terminal == input);
        if duplicate {
            return Err(reject(RejectReason::Duplicate));
        }

        let input_types = i.candidate_types();
        let tag = o
            .candidate_types()
            .into_iter()
            .find(|t| input_types.contains(t))
            .ok_or_else(|| {
                reject(RejectReason::TypeMismatch {
                    output: o.candidate_types(),
                    input: input_types.clone(),
                })
            })?;

        if src == dst || has_path_connecting(&self.graph, dst, src, None) {
            return Err(reject(RejectReason::Cycle));
        }
        Ok(tag)
    }

    /// Connect an output to an input. The input's node and everything
    /// downstream of it must re-run; data already on the output is delivered.
    pub fn connect(
        &mut self,
        from: NodeHandle,
        output: &str,
        to: NodeHandle,
        input: &str,
    ) -> Result<(), GraphError> {
        let tag = self.check_connection(from, output, to, input)?;
        let (src, dst) = (from.index, to.index);

        let origin = full_name(&self.graph[src].name, output);
        let source_is_poly = self.graph[src].output(output).is_some_and(Terminal::is_poly);
        if let Some(o) = self.graph[src].output_mut(output) {
            o.attach(tag);
        }
        if let Some(i) = self.graph[dst].input_mut(input) {
            i.attach(tag);
            if i.is_poly() && !source_is_poly && !i.insert_sub(SubTerminal::new(origin.clone(), tag).with_origin(origin.clone())) {
                tracing::warn!("Sub-terminal {} already present on {}", origin, input);
            }
        }

        let edge = self.graph.add_edge(
            src,
            dst,
            Link {
                from_terminal: output.to_string(),
                to_terminal: input.to_string(),
                type_tag: tag,
            },
        );
        tracing::debug!("Connected {} -> {}.{} as {}", origin, self.graph[dst].name, input, tag);

        self.invalidate(&[dst], true);
        self.push_edge(edge);
        Ok(())
    }

    pub fn disconnect(
        &mut self,
        from: NodeHandle,
        output: &str,
        to: NodeHandle,
        input: &str,
    ) -> Result<(), GraphError> {
        let src = self.index(from)?;
        let dst = self.index(to)?;
        let edge = self
            .graph
            .edges_connecting(src, dst)
            .find(|e| e.weight().from_terminal == output && e.weight().to_terminal == input)
            .map(|e| e.id())
            .ok_or_else(|| GraphError::NotConnected {
                from: full_name(&self.graph[src].name, output),
                to: full_name(&self.graph[dst].name, input),
            })?;
        self.disconnect_edge(edge);
        Ok(())
    }

    fn disconnect_edge(&mut self, edge: EdgeIndex) {
        let Some((src, dst)) = self.graph.edge_endpoints(edge) else {
            return;
        };
        let Some(link) = self.graph.remove_edge(edge) else {
            return;
        };
        if let Some(o) = self.graph[src].output_mut(&link.from_terminal) {
            o.detach();
        }
        let source_name = self.graph[src].name.clone();
        self.detach_input(dst, &link, &source_name);
        tracing::debug!(
            "Disconnected {} -> {}.{}",
            full_name(&source_name, &link.from_terminal),
            self.graph[dst].name,
            link.to_terminal
        );
        self.invalidate(&[dst], true);
    }

    fn detach_input(&mut self, dst: NodeIndex, link: &Link, source_name: &str) {
        let origin = full_name(source_name, &link.from_terminal);
        if let Some(i) = self.graph[dst].input_mut(&link.to_terminal) {
            if i.is_poly() {
                i.remove_subs_from(&origin);
            }
            i.detach();
        }
    }

    /// Every connection as (source node, source terminal, target node, target terminal),
    /// ordered by node creation
    pub fn dump_connections(&self) -> Vec<ConnectionSpec> {
        let mut edges: Vec<(u64, u64, ConnectionSpec)> = self
            .graph
            .edge_references()
            .map(|e| {
                let (s, t) = (&self.graph[e.source()], &self.graph[e.target()]);
                (
                    s.seq,
                    t.seq,
                    ConnectionSpec {
                        from_node: s.name.clone(),
                        from_terminal: e.weight().from_terminal.clone(),
                        to_node: t.name.clone(),
                        to_terminal: e.weight().to_terminal.clone(),
                    },
                )
            })
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, _, c)| c).collect()
    }

    // ----- globals -----

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Globals {
        &mut self.globals
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.set(name, value);
    }

    /// Take over the globals of a parent flowchart, overwriting local ones
    pub fn inherit_globals(&mut self, parent: &Globals) {
        self.globals.merge(parent);
    }

    pub fn substitute_globals(&self, text: &str) -> String {
        self.globals.substitute(text)
    }

    // ----- propagation -----

    /// Mark every node downstream of `handle` stale so the next run recomputes it
    pub fn notify_children(&mut self, handle: NodeHandle) -> Result<(), GraphError> {
        let index = self.index(handle)?;
        self.invalidate(&[index], false);
        Ok(())
    }

    /// Invalidate the closure of `roots` as one step: the affected set is
    /// computed before any state changes. Affected nodes go back to WAITING with
    /// their outputs cleared, and every input fed by an affected node (or by a
    /// root) loses its data. Roots themselves are only reset when `include_roots`.
    pub(crate) fn invalidate(&mut self, roots: &[NodeIndex], include_roots: bool) {
        let mut affected: HashSet<NodeIndex> = HashSet::new();
        for &root in roots {
            if include_roots {
                affected.insert(root);
            }
            affected.extend(graph::descendants(&self.graph, root));
        }

        let mut stale_inputs: Vec<(NodeIndex, String, String)> = Vec::new();
        for &n in affected.iter().chain(roots) {
            for e in self.graph.edges_directed(n, Flow::Outgoing) {
                stale_inputs.push((
                    e.target(),
                    e.weight().to_terminal.clone(),
                    full_name(&self.graph[n].name, &e.weight().from_terminal),
                ));
            }
        }

        for &n in &affected {
            let entry = &mut self.graph[n];
            entry.status = NodeStatus::Waiting;
            entry.clear_outputs();
        }
        for (target, terminal, origin) in stale_inputs {
            if let Some(i) = self.graph[target].input_mut(&terminal) {
                i.clear_from(&origin);
            }
        }
    }

    /// Deliver the current payload of the edge's output to its input
    pub(crate) fn push_edge(&mut self, edge: EdgeIndex) {
        let Some((src, dst)) = self.graph.edge_endpoints(edge) else {
            return;
        };
        let link = self.graph[edge].clone();
        let origin = full_name(&self.graph[src].name, &link.from_terminal);
        let Some(payload) = self.graph[src].output(&link.from_terminal).cloned() else {
            return;
        };
        let Some(input) = self.graph[dst].input_mut(&link.to_terminal) else {
            return;
        };

        match (payload.family(), input.family()) {
            (Family::Feature, Family::Feature) => {
                match payload.values().iter().flatten().find(|v| v.type_tag() != link.type_tag) {
                    Some(v) => {
                        tracing::warn!(
                            "Dropping {} value pushed from {}, the connection carries {}",
                            v.type_tag(),
                            origin,
                            link.type_tag
                        );
                        input.receive(&[], false);
                    }
                    None => input.receive(payload.values(), payload.has_data()),
                }
            }
            (Family::Feature, Family::Poly) => {
                if let Some(sub) = input.sub_mut(&origin) {
                    if !payload.has_data() {
                        sub.clear();
                    } else if let Err(e) = sub.set_values(payload.values().to_vec()) {
                        tracing::warn!("Dropping value pushed from {}: {}", origin, e);
                        sub.clear();
                    }
                }
            }
            (Family::Poly, Family::Poly) => {
                input.remove_subs_from(&origin);
                for s in payload.sub_terminals() {
                    if !input.accepts(s.type_tag()) {
                        tracing::warn!("{} does not accept sub-terminal {} of type {}", link.to_terminal, s.name(), s.type_tag());
                        continue;
                    }
                    let mut sub = SubTerminal::new(s.name(), s.type_tag()).with_origin(origin.clone());
                    if s.has_data() {
                        // types match by construction
                        let _ = sub.set_values(s.values().to_vec());
                    }
                    if !input.insert_sub(sub) {
                        tracing::warn!("Sub-terminal {} already present on {}", s.name(), link.to_terminal);
                    }
                }
            }
            (Family::Poly, Family::Feature) => {}
        }
    }

    /// Push every output of `index` along its connections
    pub(crate) fn push_outputs(&mut self, index: NodeIndex) {
        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(index, Flow::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.push_edge(edge);
        }
    }

    // ----- description -----

    /// Snapshot the flowchart in its serialized form. Nodes that were not
    /// created from a register cannot be reloaded and are left out.
    pub fn to_flowchart(&self, name: impl Into<String>) -> Flowchart {
        let mut flowchart = Flowchart::new(name);
        flowchart.globals = self.globals.clone();

        let mut skipped = HashSet::new();
        for handle in self.nodes() {
            let entry = &self.graph[handle.index];
            let Some(register) = &entry.register else {
                tracing::debug!("Not saving unregistered node {}", entry.name);
                skipped.insert(entry.name.clone());
                continue;
            };
            let mut spec = NodeSpec::new(&entry.name, register, &entry.node_type);
            spec.position = entry.position;
            spec.parameters = entry.params.clone();
            spec.marked_inputs = marked(&entry.inputs);
            spec.marked_outputs = marked(&entry.outputs);
            flowchart.add_node(spec);
        }

        flowchart.connections = self
            .dump_connections()
            .into_iter()
            .filter(|c| !skipped.contains(&c.from_node) && !skipped.contains(&c.to_node))
            .collect();
        flowchart
    }
}

fn marked(terminals: &[Terminal]) -> Vec<String> {
    terminals
        .iter()
        .filter(|t| t.is_marked())
        .map(|t| t.name().to_string())
        .collect()
}

fn terminal_not_found(node: &str, terminal: &str) -> GraphError {
    GraphError::TerminalNotFound {
        node: node.to_string(),
        terminal: terminal.to_string(),
    }
}
