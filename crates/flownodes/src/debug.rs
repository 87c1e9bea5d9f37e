use flowcore::{Node, NodeError, NodeSetup, ProcessContext, TypeTag};
use flowruntime::{NodeFactory, NodeMetadata, NodeRegistry, TerminalDefinition};
use std::sync::Arc;

/// Simple debug node that logs its input
pub struct PrintNode;

impl Node for PrintNode {
    fn node_type(&self) -> &str {
        "Print"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("value", &TypeTag::ALL);
        setup.add_output("text", TypeTag::Text);
        setup.add_param("label", "");
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let text = ctx.require_input("value")?.to_string();
        let label = ctx
            .param("label")
            .and_then(|v| v.as_str())
            .map(|l| ctx.substitute_globals(l))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| ctx.node_name().to_string());

        tracing::info!("{}: {}", label, text);
        ctx.set_output("text", text)
    }
}

pub struct PrintNodeFactory;

impl NodeFactory for PrintNodeFactory {
    fn create(&self, _registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(PrintNode))
    }

    fn node_type(&self) -> &str {
        "Print"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Logs its input value for debugging".to_string(),
            category: "debug".to_string(),
            inputs: vec![TerminalDefinition::new("value", &TypeTag::ALL)],
            outputs: vec![TerminalDefinition::new("text", &[TypeTag::Text])],
        }
    }
}
