//! Standard node library
//!
//! Collection of built-in nodes, registered under the "Core" register

mod debug;
mod nest;
mod text;
mod values;
mod vector;

pub use debug::PrintNode;
pub use nest::{NestNode, NestNodeFactory};
pub use text::TextWriterNode;
pub use values::{ValueNode, ValueNodeFactory};
pub use vector::{VectorNode, VectorNodeFactory};
use flowruntime::{NodeRegister, NodeRegistry};

use std::sync::Arc;

pub const CORE_REGISTER: &str = "Core";

/// Register all standard nodes with a register
pub fn register_all(register: &mut NodeRegister) {
    register.register(Arc::new(ValueNodeFactory::int()));
    register.register(Arc::new(ValueNodeFactory::float()));
    register.register(Arc::new(ValueNodeFactory::bool()));
    register.register(Arc::new(ValueNodeFactory::text()));
    register.register(Arc::new(VectorNodeFactory::int()));
    register.register(Arc::new(VectorNodeFactory::float()));
    register.register(Arc::new(text::TextWriterNodeFactory));
    register.register(Arc::new(debug::PrintNodeFactory));
    register.register(Arc::new(NestNodeFactory));
}

/// The "Core" register holding every standard node
pub fn core_register() -> NodeRegister {
    let mut register = NodeRegister::new(CORE_REGISTER);
    register_all(&mut register);
    register
}

/// A registry holding just the "Core" register
pub fn core_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.add_register(core_register());
    registry
}
