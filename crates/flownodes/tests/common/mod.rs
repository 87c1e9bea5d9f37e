// crates/flownodes/tests/common/mod.rs
#![allow(dead_code)]

use flowcore::{Flowchart, Node, NodeError, NodeSetup, ProcessContext, TypeTag, Value};
use flowruntime::{NodeFactory, NodeManager, NodeRegistry, NodeRegister};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TEST_REGISTER: &str = "Test";

fn int_input(ctx: &ProcessContext<'_>, name: &str) -> Result<i64, NodeError> {
    ctx.require_input(name)?
        .as_int()
        .ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "int".to_string(),
            actual: "other".to_string(),
        })
}

#[derive(Default)]
pub struct Doubler;

impl Node for Doubler {
    fn node_type(&self) -> &str {
        "Doubler"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("value", &[TypeTag::Int]);
        setup.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let v = int_input(ctx, "value")?;
        ctx.set_output("value", v * 2)
    }
}

/// Passes even values through and leaves its output empty for odd ones
#[derive(Default)]
pub struct SkipOdd;

impl Node for SkipOdd {
    fn node_type(&self) -> &str {
        "SkipOdd"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("value", &[TypeTag::Int]);
        setup.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let v = int_input(ctx, "value")?;
        if v % 2 == 0 {
            ctx.set_output("value", v)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Adder;

impl Node for Adder {
    fn node_type(&self) -> &str {
        "Adder"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("a", &[TypeTag::Int]);
        setup.add_input("b", &[TypeTag::Int]);
        setup.add_output("sum", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let sum = int_input(ctx, "a")? + int_input(ctx, "b")?;
        ctx.set_output("sum", sum)
    }
}

/// Sums the int sub-terminals of its poly input
#[derive(Default)]
pub struct SumAll;

impl Node for SumAll {
    fn node_type(&self) -> &str {
        "SumAll"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_poly_input("items", &[TypeTag::Int]);
        setup.add_output("sum", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let sum: i64 = ctx
            .input_terminal("items")?
            .sub_terminals()
            .iter()
            .filter_map(|s| s.value().and_then(Value::as_int))
            .sum();
        ctx.set_output("sum", sum)
    }
}

struct SimpleFactory {
    node_type: &'static str,
    make: fn() -> Box<dyn Node>,
}

impl NodeFactory for SimpleFactory {
    fn create(&self, _registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok((self.make)())
    }

    fn node_type(&self) -> &str {
        self.node_type
    }
}

fn make<N: Node + Default + 'static>() -> Box<dyn Node> {
    Box::new(N::default())
}

/// The core nodes plus a handful of test nodes
pub fn registry() -> Arc<NodeRegistry> {
    let mut register = NodeRegister::new(TEST_REGISTER);
    let factories: [(&'static str, fn() -> Box<dyn Node>); 4] = [
        ("Doubler", make::<Doubler>),
        ("SkipOdd", make::<SkipOdd>),
        ("Adder", make::<Adder>),
        ("SumAll", make::<SumAll>),
    ];
    for (node_type, make) in factories {
        register.register(Arc::new(SimpleFactory { node_type, make }));
    }

    let mut registry = flownodes::core_registry();
    registry.add_register(register);
    Arc::new(registry)
}

pub fn manager() -> NodeManager {
    NodeManager::new(registry())
}

/// Write `flowchart` as JSON under `dir`, returning its path
pub fn write_flowchart(dir: &Path, file: &str, flowchart: &Flowchart) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, flowchart.to_json().unwrap()).unwrap();
    path
}

/// Column of ints read off a vector terminal, empty slots as `None`
pub fn ints(values: &[Option<Value>]) -> Vec<Option<i64>> {
    values
        .iter()
        .map(|v| v.as_ref().and_then(Value::as_int))
        .collect()
}
