use crate::{Globals, NodeError, Terminal, TypeTag, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node parameters, consumed only by the node's own logic.
pub type Parameters = HashMap<String, Value>;

/// Core trait that all executable nodes implement
pub trait Node: Send {
    /// Type identifier within its register (e.g. "Int", "Nest")
    fn node_type(&self) -> &str;

    /// Declare terminals and default parameters.
    fn init(&mut self, setup: &mut NodeSetup<'_>);

    /// Compute outputs from inputs.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError>;

    /// Optional: react to new parameter values, possibly redeclaring terminals
    fn post_parameter_load(&mut self, _setup: &mut NodeSetup<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Optional: validate parameters before they are applied
    fn validate_config(&self, _params: &Parameters) -> Result<(), NodeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Unset,
    /// Inputs being gathered, or invalidated and awaiting a re-run
    Waiting,
    /// All inputs present, queued for `process`
    Ready,
    Done,
    Error,
}

fn find<'t>(terminals: &'t [Terminal], name: &str) -> Option<&'t Terminal> {
    terminals.iter().find(|t| t.name() == name)
}

fn find_mut<'t>(terminals: &'t mut [Terminal], name: &str) -> Option<&'t mut Terminal> {
    terminals.iter_mut().find(|t| t.name() == name)
}

fn upsert(terminals: &mut Vec<Terminal>, terminal: Terminal) -> &mut Terminal {
    match terminals.iter().position(|t| t.name() == terminal.name()) {
        Some(pos) => {
            tracing::warn!("Terminal '{}' declared twice, replacing", terminal.name());
            terminals[pos] = terminal;
            &mut terminals[pos]
        }
        None => {
            terminals.push(terminal);
            let last = terminals.len() - 1;
            &mut terminals[last]
        }
    }
}

/// Passed to `init` and `post_parameter_load` so a node can shape itself.
pub struct NodeSetup<'a> {
    name: &'a str,
    inputs: &'a mut Vec<Terminal>,
    outputs: &'a mut Vec<Terminal>,
    params: &'a mut Parameters,
    globals: &'a Globals,
}

impl<'a> NodeSetup<'a> {
    pub fn new(
        name: &'a str,
        inputs: &'a mut Vec<Terminal>,
        outputs: &'a mut Vec<Terminal>,
        params: &'a mut Parameters,
        globals: &'a Globals,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            params,
            globals,
        }
    }

    pub fn node_name(&self) -> &str {
        self.name
    }

    pub fn add_input(&mut self, name: &str, types: &[TypeTag]) -> &mut Terminal {
        upsert(self.inputs, Terminal::input(name, types))
    }

    pub fn add_vector_input(&mut self, name: &str, types: &[TypeTag]) -> &mut Terminal {
        upsert(self.inputs, Terminal::input(name, types).vector())
    }

    pub fn add_poly_input(&mut self, name: &str, types: &[TypeTag]) -> &mut Terminal {
        upsert(self.inputs, Terminal::input(name, types).poly())
    }

    pub fn add_output(&mut self, name: &str, tag: TypeTag) -> &mut Terminal {
        upsert(self.outputs, Terminal::output(name, &[tag]))
    }

    pub fn add_vector_output(&mut self, name: &str, tag: TypeTag) -> &mut Terminal {
        upsert(self.outputs, Terminal::output(name, &[tag]).vector())
    }

    pub fn add_poly_output(&mut self, name: &str, types: &[TypeTag]) -> &mut Terminal {
        upsert(self.outputs, Terminal::output(name, types).poly())
    }

    /// Insert a terminal built by hand, e.g. a vector-shaped poly terminal.
    pub fn add_terminal(&mut self, terminal: Terminal) -> &mut Terminal {
        match terminal.direction() {
            crate::Direction::Input => upsert(self.inputs, terminal),
            crate::Direction::Output => upsert(self.outputs, terminal),
        }
    }

    /// Remove every terminal. The manager drops or rebinds affected edges afterwards.
    pub fn clear_terminals(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    /// Declare a parameter; an already loaded value wins over the default.
    pub fn add_param(&mut self, name: &str, default: impl Into<Value>) {
        self.params
            .entry(name.to_string())
            .or_insert_with(|| default.into());
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn globals(&self) -> &Globals {
        self.globals
    }

    pub fn substitute_globals(&self, text: &str) -> String {
        self.globals.substitute(text)
    }
}

/// Execution context passed to `Node::process`
pub struct ProcessContext<'a> {
    name: &'a str,
    inputs: &'a [Terminal],
    outputs: &'a mut [Terminal],
    params: &'a Parameters,
    globals: &'a Globals,
}

impl<'a> ProcessContext<'a> {
    pub fn new(
        name: &'a str,
        inputs: &'a [Terminal],
        outputs: &'a mut [Terminal],
        params: &'a Parameters,
        globals: &'a Globals,
    ) -> Self {
        Self {
            name,
            inputs,
            outputs,
            params,
            globals,
        }
    }

    pub fn node_name(&self) -> &str {
        self.name
    }

    pub fn inputs(&self) -> &[Terminal] {
        self.inputs
    }

    pub fn outputs(&self) -> &[Terminal] {
        self.outputs
    }

    /// Get an input terminal by name
    pub fn input_terminal(&self, name: &str) -> Result<&Terminal, NodeError> {
        find(self.inputs, name).ok_or_else(|| NodeError::UnknownTerminal(name.to_string()))
    }

    /// Get the value of a required scalar input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.input_terminal(name)?
            .value()
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        find(self.inputs, name).and_then(Terminal::value)
    }

    pub fn output(&mut self, name: &str) -> Result<&mut Terminal, NodeError> {
        find_mut(self.outputs, name).ok_or_else(|| NodeError::UnknownTerminal(name.to_string()))
    }

    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) -> Result<(), NodeError> {
        self.output(name)?.set(value.into())
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Get parameter value or return error
    pub fn require_param(&self, name: &str) -> Result<&Value, NodeError> {
        self.params
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing parameter: {}", name)))
    }

    /// Get parameter with default
    pub fn param_or(&self, name: &str, default: Value) -> Value {
        self.params.get(name).cloned().unwrap_or(default)
    }

    pub fn globals(&self) -> &Globals {
        self.globals
    }

    pub fn substitute_globals(&self, text: &str) -> String {
        self.globals.substitute(text)
    }
}
