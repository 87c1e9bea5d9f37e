// crates/flowruntime/tests/common/mod.rs
#![allow(dead_code)]

use flowcore::{Node, NodeError, NodeSetup, ProcessContext, Terminal, TypeTag, Value};
use flowruntime::{NodeFactory, NodeManager, NodeRegister, NodeRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Emits its `value` parameter (default 5)
#[derive(Default)]
pub struct IntSource;

impl Node for IntSource {
    fn node_type(&self) -> &str {
        "IntSource"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_output("value", TypeTag::Int);
        setup.add_param("value", 5i64);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let value = ctx.require_param("value")?.clone();
        ctx.set_output("value", value)
    }
}

#[derive(Default)]
pub struct FloatSource;

impl Node for FloatSource {
    fn node_type(&self) -> &str {
        "FloatSource"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_output("value", TypeTag::Float);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        ctx.set_output("value", 2.5)
    }
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

/// Accepts ints and floats, produces nothing
#[derive(Default)]
pub struct Sink;

impl Node for Sink {
    fn node_type(&self) -> &str {
        "Sink"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("value", &[TypeTag::Int, TypeTag::Float]);
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct TextSink;

impl Node for TextSink {
    fn node_type(&self) -> &str {
        "TextSink"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("text", &[TypeTag::Text]);
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Counts and sums the sub-terminals of its poly input
#[derive(Default)]
pub struct Collect;

impl Node for Collect {
    fn node_type(&self) -> &str {
        "Collect"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_poly_input("items", &[TypeTag::Int, TypeTag::Float, TypeTag::Text]);
        setup.add_output("count", TypeTag::Int);
        setup.add_output("sum", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let items = ctx.input_terminal("items")?;
        let count = items.sub_terminals().len() as i64;
        let sum: i64 = items
            .sub_terminals()
            .iter()
            .filter_map(|s| s.value().and_then(Value::as_int))
            .sum();
        ctx.set_output("count", count)?;
        ctx.set_output("sum", sum)
    }
}

/// Poly output with `count` int sub-terminals named item0, item1, ...
#[derive(Default)]
pub struct PolySource;

impl Node for PolySource {
    fn node_type(&self) -> &str {
        "PolySource"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_poly_output("many", &[TypeTag::Int]);
        setup.add_param("count", 2i64);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let count = ctx.require_param("count")?.as_int().unwrap_or(0);
        let out = ctx.output("many")?;
        for i in 0..count {
            out.add_sub(&format!("item{}", i), TypeTag::Int)?.set(Value::Int(i))?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct VecSource;

impl Node for VecSource {
    fn node_type(&self) -> &str {
        "VecSource"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_vector_output("values", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        ctx.output("values")?
            .set_values(vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))])
    }
}

#[derive(Default)]
pub struct Failing;

impl Node for Failing {
    fn node_type(&self) -> &str {
        "Failing"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("value", &[TypeTag::Int]);
        setup.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Output type follows the `kind` parameter ("int" or "text")
#[derive(Default)]
pub struct Reshape;

impl Reshape {
    fn tag(kind: Option<&Value>) -> TypeTag {
        match kind.and_then(Value::as_str) {
            Some("text") => TypeTag::Text,
            _ => TypeTag::Int,
        }
    }
}

impl Node for Reshape {
    fn node_type(&self) -> &str {
        "Reshape"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_param("kind", "int");
        setup.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match Self::tag(ctx.param("kind")) {
            TypeTag::Text => ctx.set_output("value", "text"),
            _ => ctx.set_output("value", 1i64),
        }
    }

    fn post_parameter_load(&mut self, setup: &mut NodeSetup<'_>) -> Result<(), NodeError> {
        let tag = Self::tag(setup.param("kind"));
        setup.add_output("value", tag);
        Ok(())
    }
}

/// Output declared as Int or Text, emitting whichever the `kind` parameter names
#[derive(Default)]
pub struct Either;

impl Node for Either {
    fn node_type(&self) -> &str {
        "Either"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_param("kind", "int");
        setup.add_terminal(Terminal::output("value", &[TypeTag::Int, TypeTag::Text]));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match ctx.param("kind").and_then(Value::as_str) {
            Some("text") => ctx.set_output("value", "text"),
            _ => ctx.set_output("value", 1i64),
        }
    }
}

/// Counts its `process` calls and emits the sum of its optional inputs, at least 1
pub struct Counting {
    pub calls: Arc<AtomicUsize>,
}

impl Counting {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: Arc::clone(&calls) }, calls)
    }
}

impl Node for Counting {
    fn node_type(&self) -> &str {
        "Counting"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_terminal(Terminal::input("a", &[TypeTag::Int]).optional());
        setup.add_terminal(Terminal::input("b", &[TypeTag::Int]).optional());
        setup.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let a = ctx.input("a").and_then(Value::as_int).unwrap_or(0);
        let b = ctx.input("b").and_then(Value::as_int).unwrap_or(0);
        ctx.set_output("value", (a + b).max(1))
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

pub fn test_registry() -> Arc<NodeRegistry> {
    let mut register = NodeRegister::new(TEST_REGISTER);
    let factories: [(&'static str, fn() -> Box<dyn Node>); 12] = [
        ("IntSource", make::<IntSource>),
        ("FloatSource", make::<FloatSource>),
        ("Doubler", make::<Doubler>),
        ("Adder", make::<Adder>),
        ("Sink", make::<Sink>),
        ("TextSink", make::<TextSink>),
        ("Collect", make::<Collect>),
        ("PolySource", make::<PolySource>),
        ("VecSource", make::<VecSource>),
        ("Failing", make::<Failing>),
        ("Reshape", make::<Reshape>),
        ("Either", make::<Either>),
    ];
    for (node_type, make) in factories {
        register.register(Arc::new(SimpleFactory { node_type, make }));
    }

    let mut registry = NodeRegistry::new();
    registry.add_register(register);
    Arc::new(registry)
}

pub fn manager() -> NodeManager {
    NodeManager::new(test_registry())
}
