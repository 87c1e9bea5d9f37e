//! Typed attachment points on a node.
//!
//! A terminal is either a *feature* terminal, holding one value (or one value
//! per row when it is vector shaped), or a *poly* terminal owning an ordered set
//! of named sub-terminals that appear as connections are made.

use crate::{NodeError, TypeTag, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    Feature,
    Poly,
}

/// `node.terminal`, the name a terminal is known by outside its node.
pub fn full_name(node: &str, terminal: &str) -> String {
    format!("{}.{}", node, terminal)
}

/// One named member of a poly terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTerminal {
    name: String,
    type_tag: TypeTag,
    origin: Option<String>,
    values: Vec<Option<Value>>,
    has_data: bool,
}

impl SubTerminal {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            origin: None,
            values: Vec::new(),
            has_data: false,
        }
    }

    /// Tag the sub-terminal with the full name of the output feeding it.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn value(&self) -> Option<&Value> {
        self.values.first().and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, value: Value) -> Result<(), NodeError> {
        self.check(&value)?;
        self.values = vec![Some(value)];
        self.has_data = true;
        Ok(())
    }

    /// Append one row. `None` is the explicit "no value" placeholder.
    pub fn push(&mut self, value: Option<Value>) -> Result<(), NodeError> {
        if let Some(v) = &value {
            self.check(v)?;
        }
        self.values.push(value);
        self.has_data = true;
        Ok(())
    }

    pub fn set_values(&mut self, values: Vec<Option<Value>>) -> Result<(), NodeError> {
        for v in values.iter().flatten() {
            self.check(v)?;
        }
        self.values = values;
        self.has_data = true;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.has_data = false;
    }

    fn check(&self, value: &Value) -> Result<(), NodeError> {
        if value.type_tag() == self.type_tag {
            Ok(())
        } else {
            Err(NodeError::InvalidOutputType {
                terminal: self.name.clone(),
                actual: value.type_tag(),
            })
        }
    }
}

/// A named, typed port on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    name: String,
    direction: Direction,
    family: Family,
    vector: bool,
    accepted: Vec<TypeTag>,
    connected_type: Option<TypeTag>,
    connections: usize,
    optional: bool,
    marked: bool,
    values: Vec<Option<Value>>,
    has_data: bool,
    subs: Vec<SubTerminal>,
}

impl Terminal {
    pub fn input(name: impl Into<String>, types: &[TypeTag]) -> Self {
        Self::new(name.into(), Direction::Input, types)
    }

    pub fn output(name: impl Into<String>, types: &[TypeTag]) -> Self {
        Self::new(name.into(), Direction::Output, types)
    }

    fn new(name: String, direction: Direction, types: &[TypeTag]) -> Self {
        Self {
            name,
            direction,
            family: Family::Feature,
            vector: false,
            accepted: types.to_vec(),
            connected_type: None,
            connections: 0,
            optional: false,
            marked: false,
            values: Vec::new(),
            has_data: false,
            subs: Vec::new(),
        }
    }

    /// Hold one value per row instead of a single value.
    pub fn vector(mut self) -> Self {
        self.vector = true;
        self
    }

    pub fn poly(mut self) -> Self {
        self.family = Family::Poly;
        self
    }

    /// Exempt this input from the readiness check.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Surface this terminal at a nested flowchart boundary.
    pub fn marked(mut self) -> Self {
        self.marked = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn is_poly(&self) -> bool {
        self.family == Family::Poly
    }

    pub fn is_vector(&self) -> bool {
        self.vector
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn set_marked(&mut self, marked: bool) {
        self.marked = marked;
    }

    pub fn accepted_types(&self) -> &[TypeTag] {
        &self.accepted
    }

    pub fn accepts(&self, tag: TypeTag) -> bool {
        self.accepted.contains(&tag)
    }

    pub fn connected_type(&self) -> Option<TypeTag> {
        self.connected_type
    }

    /// Types a new connection may bind to: the bound type once connected,
    /// otherwise every accepted type in declaration order.
    pub fn candidate_types(&self) -> Vec<TypeTag> {
        match self.connected_type {
            Some(tag) => vec![tag],
            None => self.accepted.clone(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections
    }

    /// Record a new edge bound to `tag`. The bound type is only taken when
    /// the terminal is unbound.
    pub fn attach(&mut self, tag: TypeTag) {
        self.connections += 1;
        if self.family == Family::Feature && self.connected_type.is_none() {
            self.connected_type = Some(tag);
        }
    }

    /// Drop one edge. A terminal left without edges forgets its bound type,
    /// and an input also forgets its data.
    pub fn detach(&mut self) {
        self.connections = self.connections.saturating_sub(1);
        if self.connections == 0 {
            self.connected_type = None;
            if self.direction == Direction::Input {
                self.clear_data();
            }
        }
    }

    /// Forget every edge while keeping data. The manager re-attaches the
    /// edges that survive a terminal redeclaration.
    pub fn reset_connections(&mut self) {
        self.connections = 0;
        self.connected_type = None;
    }

    /// Force the bound type, used when a node re-types a terminal it feeds.
    pub fn bind(&mut self, tag: TypeTag) {
        self.connected_type = Some(tag);
    }

    pub fn has_data(&self) -> bool {
        match self.family {
            Family::Feature => self.has_data,
            Family::Poly => !self.subs.is_empty() && self.subs.iter().all(SubTerminal::has_data),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.values.first().and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Number of rows held, taken from the first sub-terminal for poly terminals.
    pub fn len(&self) -> usize {
        match self.family {
            Family::Feature => self.values.len(),
            Family::Poly => self.subs.first().map(SubTerminal::len).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&mut self, value: Value) -> Result<(), NodeError> {
        self.check(&value)?;
        self.values = vec![Some(value)];
        self.has_data = true;
        Ok(())
    }

    pub fn push(&mut self, value: Option<Value>) -> Result<(), NodeError> {
        if let Some(v) = &value {
            self.check(v)?;
        }
        self.values.push(value);
        self.has_data = true;
        Ok(())
    }

    pub fn set_values(&mut self, values: Vec<Option<Value>>) -> Result<(), NodeError> {
        for v in values.iter().flatten() {
            self.check(v)?;
        }
        self.values = values;
        self.has_data = true;
        Ok(())
    }

    /// Copy the payload of another feature terminal. Used when pushing along an edge.
    pub fn receive(&mut self, values: &[Option<Value>], has_data: bool) {
        self.values = values.to_vec();
        self.has_data = has_data;
    }

    /// Reset data. Outputs also drop their sub-terminals, inputs keep the
    /// sub-terminals their connections created.
    pub fn clear_data(&mut self) {
        self.values.clear();
        self.has_data = false;
        match self.direction {
            Direction::Output => self.subs.clear(),
            Direction::Input => self.subs.iter_mut().for_each(SubTerminal::clear),
        }
    }

    pub fn sub_terminals(&self) -> &[SubTerminal] {
        &self.subs
    }

    pub fn sub(&self, name: &str) -> Option<&SubTerminal> {
        self.subs.iter().find(|s| s.name == name)
    }

    pub fn sub_mut(&mut self, name: &str) -> Option<&mut SubTerminal> {
        self.subs.iter_mut().find(|s| s.name == name)
    }

    /// Get or create a sub-terminal. An existing sub-terminal of another type is replaced.
    pub fn add_sub(&mut self, name: &str, tag: TypeTag) -> Result<&mut SubTerminal, NodeError> {
        if !self.accepts(tag) {
            return Err(NodeError::InvalidOutputType {
                terminal: full_name(&self.name, name),
                actual: tag,
            });
        }
        let pos = match self.subs.iter().position(|s| s.name == name) {
            Some(pos) if self.subs[pos].type_tag == tag => pos,
            Some(pos) => {
                self.subs[pos] = SubTerminal::new(name, tag);
                pos
            }
            None => {
                self.subs.push(SubTerminal::new(name, tag));
                self.subs.len() - 1
            }
        };
        Ok(&mut self.subs[pos])
    }

    /// Insert a fully formed sub-terminal, returning false when the name is taken.
    pub fn insert_sub(&mut self, sub: SubTerminal) -> bool {
        if self.subs.iter().any(|s| s.name == sub.name) {
            return false;
        }
        self.subs.push(sub);
        true
    }

    /// Clear the data delivered by the output `origin`.
    pub fn clear_from(&mut self, origin: &str) {
        match self.family {
            Family::Feature => {
                self.values.clear();
                self.has_data = false;
            }
            Family::Poly => self
                .subs
                .iter_mut()
                .filter(|s| s.origin.as_deref() == Some(origin))
                .for_each(SubTerminal::clear),
        }
    }

    /// Follow a rename of the output `old`. Sub-terminals named after it are renamed too.
    pub fn rename_origin(&mut self, old: &str, new: &str) {
        for sub in self.subs.iter_mut() {
            if sub.origin.as_deref() == Some(old) {
                if sub.name == old {
                    sub.name = new.to_string();
                }
                sub.origin = Some(new.to_string());
            }
        }
    }

    /// Remove every sub-terminal introduced by the output `origin`.
    pub fn remove_subs_from(&mut self, origin: &str) {
        self.subs.retain(|s| s.origin.as_deref() != Some(origin));
    }

    /// A connected feature terminal only holds values of its bound type.
    fn check(&self, value: &Value) -> Result<(), NodeError> {
        let tag = value.type_tag();
        let ok = match self.connected_type {
            Some(bound) => tag == bound,
            None => self.accepts(tag),
        };
        if ok {
            Ok(())
        } else {
            Err(NodeError::InvalidOutputType {
                terminal: self.name.clone(),
                actual: value.type_tag(),
            })
        }
    }
}
