use flowcore::{Node, NodeError, NodeSetup, Parameters, ProcessContext, TypeTag, Value};
use flowruntime::{NodeFactory, NodeMetadata, NodeRegistry, TerminalDefinition};
use std::sync::Arc;

/// Emits the JSON array in its `values` parameter as a vector output, one
/// row per element. `null` elements become empty rows.
pub struct VectorNode {
    node_type: &'static str,
    tag: TypeTag,
}

impl VectorNode {
    pub fn new(node_type: &'static str, tag: TypeTag) -> Self {
        Self { node_type, tag }
    }

    fn parse(&self, param: &Value) -> Result<Vec<Option<Value>>, NodeError> {
        let items = param
            .as_json()
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| NodeError::Configuration("'values' must be a JSON array".to_string()))?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if item.is_null() {
                    return Ok(None);
                }
                let value = match self.tag {
                    TypeTag::Int => item.as_i64().map(Value::Int),
                    _ => item.as_f64().map(Value::Float),
                };
                value.map(Some).ok_or_else(|| {
                    NodeError::Configuration(format!("element {} of 'values' is not a {}: {}", i, self.tag, item))
                })
            })
            .collect()
    }
}

impl Node for VectorNode {
    fn node_type(&self) -> &str {
        self.node_type
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_vector_output("values", self.tag);
        setup.add_param("values", serde_json::json!([]));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let rows = self.parse(ctx.require_param("values")?)?;
        ctx.output("values")?.set_values(rows)
    }

    fn validate_config(&self, params: &Parameters) -> Result<(), NodeError> {
        match params.get("values") {
            Some(v) => self.parse(v).map(|_| ()),
            None => Ok(()),
        }
    }
}

pub struct VectorNodeFactory {
    node_type: &'static str,
    tag: TypeTag,
}

impl VectorNodeFactory {
    pub fn int() -> Self {
        Self { node_type: "IntVector", tag: TypeTag::Int }
    }

    pub fn float() -> Self {
        Self { node_type: "FloatVector", tag: TypeTag::Float }
    }
}

impl NodeFactory for VectorNodeFactory {
    fn create(&self, _registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(VectorNode::new(self.node_type, self.tag)))
    }

    fn node_type(&self) -> &str {
        self.node_type
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: format!("Vector of {} values, one per row", self.tag),
            category: "values".to_string(),
            inputs: vec![],
            outputs: vec![TerminalDefinition::new("values", &[self.tag])],
        }
    }
}
