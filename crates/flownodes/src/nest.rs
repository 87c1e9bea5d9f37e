//! A node whose body is a whole flowchart, run once per input row.
//!
//! Terminals marked in the nested flowchart surface on the nest node as
//! vector terminals named `node.terminal`. On `process` the nested flowchart
//! is copied, a proxy node is wired in front of the marked inputs and for
//! every row `i` the proxy outputs are fed with element `i` of the nest's
//! inputs. After each run the marked outputs are appended to the nest's
//! outputs at index `i`; a marked output without data leaves an empty slot.

use flowcore::{
    full_name, Family, Flowchart, Globals, Node, NodeError, NodeSetup, Parameters,
    ProcessContext, Terminal, TypeTag, Value, ROW_INDEX_GLOBAL,
};
use flowruntime::{
    load_flowchart, read_flowchart, NodeFactory, NodeHandle, NodeManager, NodeMetadata,
    NodeRegistry, TerminalDefinition,
};
use rayon::prelude::*;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

const GLOBALS_INPUT: &str = "globals";
const TIMINGS_OUTPUT: &str = "timings";
const GLOBAL_TYPES: [TypeTag; 4] = [TypeTag::Int, TypeTag::Float, TypeTag::Bool, TypeTag::Text];

/// Feeds the nested flowchart. Its outputs are added when the proxy is wired.
struct ProxyNode;

impl Node for ProxyNode {
    fn node_type(&self) -> &str {
        "Proxy"
    }

    fn init(&mut self, _setup: &mut NodeSetup<'_>) {}

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// A marked terminal of the nested flowchart
#[derive(Debug, Clone)]
struct Export {
    node: String,
    terminal: String,
    full: String,
    family: Family,
    types: Vec<TypeTag>,
}

impl Export {
    fn of(node: &str, terminal: &Terminal) -> Self {
        Self {
            node: node.to_string(),
            terminal: terminal.name().to_string(),
            full: full_name(node, terminal.name()),
            family: terminal.family(),
            types: terminal.accepted_types().to_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct Exports {
    inputs: Vec<Export>,
    outputs: Vec<Export>,
}

/// Row-carrying inputs of one `process` call
struct RowInputs<'a> {
    features: Vec<(&'a Export, &'a Terminal)>,
    polys: Vec<(&'a Export, &'a Terminal)>,
    globals: Option<&'a Terminal>,
    len: usize,
}

impl<'a> RowInputs<'a> {
    /// Collect the inputs and check that every row-carrying sequence has the same length
    fn gather(exports: &'a Exports, inputs: &'a [Terminal]) -> Result<Self, NodeError> {
        let find = |name: &str| {
            inputs
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| NodeError::UnknownTerminal(name.to_string()))
        };

        let mut features = Vec::new();
        let mut polys = Vec::new();
        for export in &exports.inputs {
            let terminal = find(&export.full)?;
            match export.family {
                Family::Feature => features.push((export, terminal)),
                Family::Poly => polys.push((export, terminal)),
            }
        }
        let globals = inputs.iter().find(|t| t.name() == GLOBALS_INPUT);

        let mut lengths: Vec<(String, usize)> = Vec::new();
        for (_, t) in &features {
            lengths.push((t.name().to_string(), t.len()));
        }
        for t in polys.iter().map(|(_, t)| *t).chain(globals) {
            for sub in t.sub_terminals() {
                lengths.push((full_name(t.name(), sub.name()), sub.len()));
            }
        }

        let len = match lengths.split_first() {
            None => 0,
            Some(((first, expected), rest)) => {
                if let Some((terminal, actual)) = rest.iter().find(|(_, n)| n != expected) {
                    return Err(NodeError::UnequalRowLengths {
                        first: first.clone(),
                        expected: *expected,
                        terminal: terminal.clone(),
                        actual: *actual,
                    });
                }
                *expected
            }
        };

        Ok(Self {
            features,
            polys,
            globals,
            len,
        })
    }

    /// `base` plus the row counter and one global per sub-terminal of the
    /// `globals` input. An empty slot leaves the name as `base` has it.
    fn row_globals(&self, base: &Globals, row: usize) -> Globals {
        let mut globals = base.clone();
        globals.set(ROW_INDEX_GLOBAL, row.to_string());
        if let Some(t) = self.globals {
            for sub in t.sub_terminals() {
                match sub.values().get(row).cloned().flatten() {
                    Some(value) if GLOBAL_TYPES.contains(&value.type_tag()) => globals.set(sub.name(), value),
                    Some(value) => {
                        tracing::warn!("Ignoring global {} of type {}", sub.name(), value.type_tag())
                    }
                    None => {}
                }
            }
        }
        globals
    }
}

enum Collected {
    Feature(Option<Value>),
    Poly(Vec<(String, TypeTag, Option<Value>)>),
}

struct RowOutput {
    collected: Vec<Collected>,
    millis: f64,
}

fn exec_err(e: impl Display) -> NodeError {
    NodeError::ExecutionFailed(e.to_string())
}

pub struct NestNode {
    registry: Arc<NodeRegistry>,
    flowchart: Option<Flowchart>,
    exports: Exports,
}

impl NestNode {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            flowchart: None,
            exports: Exports::default(),
        }
    }

    /// Load the nested flowchart and find the terminals it exports
    fn load(&self, path: &str, globals: &Globals) -> Result<(Flowchart, Exports), NodeError> {
        let flowchart = read_flowchart(path)
            .map_err(|e| NodeError::Configuration(format!("Cannot load nested flowchart: {}", e)))?;

        let mut manager = NodeManager::new(Arc::clone(&self.registry));
        manager.inherit_globals(globals);
        load_flowchart(&mut manager, &flowchart)
            .map_err(|e| NodeError::Configuration(format!("Cannot load nested flowchart {}: {}", path, e)))?;

        let exported = |node: &str, terminal: &Terminal| {
            if !terminal.is_marked() {
                return false;
            }
            if terminal.is_vector() {
                tracing::warn!(
                    "Skipping vector terminal {}, only scalar terminals can be exported",
                    full_name(node, terminal.name())
                );
                return false;
            }
            true
        };

        let mut exports = Exports::default();
        for handle in manager.nodes() {
            let node = manager.name(handle).map_err(exec_err)?;
            for terminal in manager.inputs(handle).map_err(exec_err)? {
                if exported(node, terminal) {
                    exports.inputs.push(Export::of(node, terminal));
                }
            }
            for terminal in manager.outputs(handle).map_err(exec_err)? {
                if exported(node, terminal) {
                    exports.outputs.push(Export::of(node, terminal));
                }
            }
        }
        Ok((flowchart, exports))
    }

    /// A fresh copy of the nested flowchart with a proxy node feeding every exported input
    fn build_proxy(&self, rows: &RowInputs<'_>, globals: &Globals) -> Result<(NodeManager, NodeHandle), NodeError> {
        let flowchart = self
            .flowchart
            .as_ref()
            .ok_or_else(|| NodeError::Configuration("No nested flowchart loaded".to_string()))?;

        let mut manager = NodeManager::new(Arc::clone(&self.registry));
        manager.inherit_globals(globals);
        load_flowchart(&mut manager, flowchart).map_err(exec_err)?;

        let proxy = manager.add_node(Box::new(ProxyNode));
        for (export, input) in rows.features.iter().chain(&rows.polys) {
            let types = match input.connected_type() {
                Some(tag) if export.family == Family::Feature => vec![tag],
                _ => export.types.clone(),
            };
            let terminal = match export.family {
                Family::Feature => Terminal::output(&export.full, &types),
                Family::Poly => Terminal::output(&export.full, &types).poly(),
            };
            manager.add_output_terminal(proxy, terminal).map_err(exec_err)?;

            let target = manager
                .node(&export.node)
                .ok_or_else(|| NodeError::ExecutionFailed(format!("Nested node {} disappeared", export.node)))?;
            manager
                .connect(proxy, &export.full, target, &export.terminal)
                .map_err(exec_err)?;
        }
        Ok((manager, proxy))
    }

    /// Feed row `row` into the proxy, run the nested flowchart and read the exported outputs.
    /// The proxy's globals are reset to `base` plus the row's globals.
    fn run_row(
        &self,
        manager: &mut NodeManager,
        proxy: NodeHandle,
        base: &Globals,
        rows: &RowInputs<'_>,
        row: usize,
    ) -> Result<RowOutput, NodeError> {
        *manager.globals_mut() = rows.row_globals(base, row);

        for (export, input) in &rows.features {
            let out = manager.output_mut(proxy, &export.full).map_err(exec_err)?;
            match input.values().get(row).cloned().flatten() {
                Some(value) => out.set(value)?,
                None => out.clear_data(),
            }
        }
        for (export, input) in &rows.polys {
            let out = manager.output_mut(proxy, &export.full).map_err(exec_err)?;
            out.clear_data();
            for sub in input.sub_terminals() {
                let target = out.add_sub(sub.name(), sub.type_tag())?;
                if let Some(value) = sub.values().get(row).cloned().flatten() {
                    target.set(value)?;
                }
            }
        }

        let started = Instant::now();
        manager
            .run_all(true)
            .map_err(|e| NodeError::ExecutionFailed(format!("row {}: {}", row, e)))?;
        let millis = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!("Row {}/{} done in {:.3}ms", row + 1, rows.len, millis);

        let mut collected = Vec::with_capacity(self.exports.outputs.len());
        for export in &self.exports.outputs {
            let handle = manager
                .node(&export.node)
                .ok_or_else(|| NodeError::ExecutionFailed(format!("Nested node {} disappeared", export.node)))?;
            let terminal = manager.output(handle, &export.terminal).map_err(exec_err)?;
            collected.push(match export.family {
                Family::Feature => Collected::Feature(terminal.value().filter(|_| terminal.has_data()).cloned()),
                Family::Poly => Collected::Poly(
                    terminal
                        .sub_terminals()
                        .iter()
                        .map(|s| {
                            let value = s.value().filter(|_| s.has_data()).cloned();
                            (s.name().to_string(), s.type_tag(), value)
                        })
                        .collect(),
                ),
            });
        }
        Ok(RowOutput { collected, millis })
    }

    /// One proxy flowchart reused for every row
    fn process_sequential(&self, rows: &RowInputs<'_>, globals: &Globals) -> Result<Vec<RowOutput>, NodeError> {
        let (mut manager, proxy) = self.build_proxy(rows, globals)?;
        let base = manager.globals().clone();
        (0..rows.len)
            .map(|row| self.run_row(&mut manager, proxy, &base, rows, row))
            .collect()
    }

    /// A private proxy flowchart per row, at most `max_parallel` at once
    fn process_parallel(
        &self,
        rows: &RowInputs<'_>,
        globals: &Globals,
        max_parallel: usize,
    ) -> Result<Vec<RowOutput>, NodeError> {
        let run = || {
            (0..rows.len)
                .into_par_iter()
                .map(|row| {
                    let (mut manager, proxy) = self.build_proxy(rows, globals)?;
                    let base = manager.globals().clone();
                    self.run_row(&mut manager, proxy, &base, rows, row)
                })
                .collect::<Result<Vec<_>, _>>()
        };

        if max_parallel == 0 {
            return run();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_parallel)
            .build()
            .map_err(|e| NodeError::ExecutionFailed(format!("Cannot start worker pool: {}", e)))?;
        pool.install(run)
    }
}

impl Node for NestNode {
    fn node_type(&self) -> &str {
        "Nest"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_param("filepath", "");
        setup.add_param("parallel", false);
        setup.add_param("max_parallel", 0i64);
        add_fixed_terminals(setup);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        if self.flowchart.is_none() {
            tracing::warn!("Nest {} has no flowchart loaded", ctx.node_name());
            return ctx.output(TIMINGS_OUTPUT)?.set_values(Vec::new());
        }

        let parallel = ctx.param("parallel").and_then(Value::as_bool).unwrap_or(false);
        let max_parallel = ctx.param("max_parallel").and_then(Value::as_int).unwrap_or(0).max(0) as usize;
        let globals = ctx.globals().clone();

        let results = {
            let rows = RowInputs::gather(&self.exports, ctx.inputs())?;
            tracing::info!(
                "Processing nest {} over {} rows ({})",
                ctx.node_name(),
                rows.len,
                if parallel { "parallel" } else { "sequential" }
            );
            if parallel {
                self.process_parallel(&rows, &globals, max_parallel)?
            } else {
                self.process_sequential(&rows, &globals)?
            }
        };
        let n = results.len();

        for (k, export) in self.exports.outputs.iter().enumerate() {
            let out = ctx.output(&export.full)?;
            out.clear_data();
            match export.family {
                Family::Feature => {
                    let column = results
                        .iter()
                        .map(|r| match &r.collected[k] {
                            Collected::Feature(value) => value.clone(),
                            Collected::Poly(_) => None,
                        })
                        .collect();
                    out.set_values(column)?;
                }
                Family::Poly => {
                    // sub-terminals first seen at a later row get empty slots before it
                    let mut columns: Vec<(String, TypeTag, Vec<Option<Value>>)> = Vec::new();
                    for (row, r) in results.iter().enumerate() {
                        let Collected::Poly(subs) = &r.collected[k] else {
                            continue;
                        };
                        for (name, tag, value) in subs {
                            let pos = match columns.iter().position(|c| c.0 == *name) {
                                Some(pos) => pos,
                                None => {
                                    columns.push((name.clone(), *tag, vec![None; n]));
                                    columns.len() - 1
                                }
                            };
                            columns[pos].2[row] = value.clone();
                        }
                    }
                    for (name, tag, column) in columns {
                        out.add_sub(&name, tag)?.set_values(column)?;
                    }
                }
            }
        }

        let timings = results.iter().map(|r| Some(Value::Float(r.millis))).collect();
        ctx.output(TIMINGS_OUTPUT)?.set_values(timings)
    }

    fn post_parameter_load(&mut self, setup: &mut NodeSetup<'_>) -> Result<(), NodeError> {
        let raw = setup
            .param("filepath")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let path = setup.substitute_globals(&raw);

        setup.clear_terminals();
        add_fixed_terminals(setup);
        self.flowchart = None;
        self.exports = Exports::default();
        if path.is_empty() {
            return Ok(());
        }

        let (flowchart, exports) = self.load(&path, setup.globals())?;
        for export in &exports.inputs {
            let terminal = Terminal::input(&export.full, &export.types).vector();
            setup.add_terminal(match export.family {
                Family::Feature => terminal,
                Family::Poly => terminal.poly(),
            });
        }
        for export in &exports.outputs {
            let terminal = Terminal::output(&export.full, &export.types).vector();
            setup.add_terminal(match export.family {
                Family::Feature => terminal,
                Family::Poly => terminal.poly(),
            });
        }

        tracing::info!(
            "Nest {} loaded {}: {} inputs, {} outputs exported",
            setup.node_name(),
            path,
            exports.inputs.len(),
            exports.outputs.len()
        );
        self.flowchart = Some(flowchart);
        self.exports = exports;
        Ok(())
    }

    fn validate_config(&self, params: &Parameters) -> Result<(), NodeError> {
        let check = |key: &str, tag: TypeTag| match params.get(key) {
            Some(v) if v.type_tag() != tag => Err(NodeError::Configuration(format!(
                "'{}' must be {}, got {}",
                key,
                tag,
                v.type_tag()
            ))),
            _ => Ok(()),
        };
        check("filepath", TypeTag::Text)?;
        check("parallel", TypeTag::Bool)?;
        check("max_parallel", TypeTag::Int)?;
        if params.get("max_parallel").and_then(Value::as_int).is_some_and(|n| n < 0) {
            return Err(NodeError::Configuration("'max_parallel' cannot be negative".to_string()));
        }
        Ok(())
    }
}

fn add_fixed_terminals(setup: &mut NodeSetup<'_>) {
    setup.add_terminal(
        Terminal::input(GLOBALS_INPUT, &GLOBAL_TYPES)
            .poly()
            .vector()
            .optional(),
    );
    setup.add_vector_output(TIMINGS_OUTPUT, TypeTag::Float);
}

pub struct NestNodeFactory;

impl NodeFactory for NestNodeFactory {
    fn create(&self, registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(NestNode::new(Arc::clone(registry))))
    }

    fn node_type(&self) -> &str {
        "Nest"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Run a nested flowchart once per input row".to_string(),
            category: "flow".to_string(),
            inputs: vec![TerminalDefinition {
                name: GLOBALS_INPUT.to_string(),
                types: GLOBAL_TYPES.to_vec(),
                required: false,
            }],
            outputs: vec![TerminalDefinition::new(TIMINGS_OUTPUT, &[TypeTag::Float])],
        }
    }
}
