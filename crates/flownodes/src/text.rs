use flowcore::{Node, NodeError, NodeSetup, ProcessContext, TypeTag};
use flowruntime::{NodeFactory, NodeMetadata, NodeRegistry, TerminalDefinition};
use std::path::PathBuf;
use std::sync::Arc;

/// Writes its `text` input to the file named by the `filepath` parameter
pub struct TextWriterNode;

impl Node for TextWriterNode {
    fn node_type(&self) -> &str {
        "TextWriter"
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_input("text", &[TypeTag::Text]);
        setup.add_output("filepath", TypeTag::Text);
        setup.add_param("filepath", "");
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let text = ctx
            .require_input("text")?
            .as_str()
            .ok_or_else(|| NodeError::InvalidInputType {
                field: "text".to_string(),
                expected: "text".to_string(),
                actual: "other".to_string(),
            })?
            .to_string();
        let raw = ctx
            .require_param("filepath")?
            .as_str()
            .ok_or_else(|| NodeError::Configuration("'filepath' must be text".to_string()))?;
        let path = PathBuf::from(ctx.substitute_globals(raw));
        if path.as_os_str().is_empty() {
            return Err(NodeError::Configuration("'filepath' is empty".to_string()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| NodeError::ExecutionFailed(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(&path, text)
            .map_err(|e| NodeError::ExecutionFailed(format!("Cannot write {}: {}", path.display(), e)))?;
        tracing::debug!("Wrote {}", path.display());

        ctx.set_output("filepath", path.display().to_string())
    }
}

pub struct TextWriterNodeFactory;

impl NodeFactory for TextWriterNodeFactory {
    fn create(&self, _registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TextWriterNode))
    }

    fn node_type(&self) -> &str {
        "TextWriter"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Write text to a file".to_string(),
            category: "io".to_string(),
            inputs: vec![TerminalDefinition::new("text", &[TypeTag::Text])],
            outputs: vec![TerminalDefinition::new("filepath", &[TypeTag::Text])],
        }
    }
}
