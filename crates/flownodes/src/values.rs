use flowcore::{Node, NodeError, NodeSetup, Parameters, ProcessContext, TypeTag, Value};
use flowruntime::{NodeFactory, NodeMetadata, NodeRegistry, TerminalDefinition};
use std::sync::Arc;

/// Emits its `value` parameter on the `value` output.
///
/// Text values have `{{global}}` placeholders substituted at process time.
pub struct ValueNode {
    node_type: &'static str,
    tag: TypeTag,
}

impl ValueNode {
    pub fn new(node_type: &'static str, tag: TypeTag) -> Self {
        Self { node_type, tag }
    }

    fn default_value(&self) -> Value {
        match self.tag {
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Bool => Value::Bool(false),
            _ => Value::Text(String::new()),
        }
    }

    /// Ints are accepted where floats are expected.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self.tag, value) {
            (TypeTag::Float, Value::Int(n)) => Some(Value::Float(*n as f64)),
            (tag, v) if v.type_tag() == tag => Some(v.clone()),
            _ => None,
        }
    }
}

impl Node for ValueNode {
    fn node_type(&self) -> &str {
        self.node_type
    }

    fn init(&mut self, setup: &mut NodeSetup<'_>) {
        setup.add_output("value", self.tag);
        setup.add_param("value", self.default_value());
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let param = ctx.require_param("value")?;
        let value = self.coerce(param).ok_or_else(|| NodeError::InvalidInputType {
            field: "value".to_string(),
            expected: self.tag.to_string(),
            actual: param.type_tag().to_string(),
        })?;
        let value = match value {
            Value::Text(text) => Value::Text(ctx.substitute_globals(&text)),
            other => other,
        };
        ctx.set_output("value", value)
    }

    fn validate_config(&self, params: &Parameters) -> Result<(), NodeError> {
        match params.get("value") {
            Some(v) if self.coerce(v).is_none() => Err(NodeError::Configuration(format!(
                "{} node expects a {} value, got {}",
                self.node_type,
                self.tag,
                v.type_tag()
            ))),
            _ => Ok(()),
        }
    }
}

pub struct ValueNodeFactory {
    node_type: &'static str,
    tag: TypeTag,
}

impl ValueNodeFactory {
    pub fn int() -> Self {
        Self { node_type: "Int", tag: TypeTag::Int }
    }

    pub fn float() -> Self {
        Self { node_type: "Float", tag: TypeTag::Float }
    }

    pub fn bool() -> Self {
        Self { node_type: "Bool", tag: TypeTag::Bool }
    }

    pub fn text() -> Self {
        Self { node_type: "Text", tag: TypeTag::Text }
    }
}

impl NodeFactory for ValueNodeFactory {
    fn create(&self, _registry: &Arc<NodeRegistry>) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ValueNode::new(self.node_type, self.tag)))
    }

    fn node_type(&self) -> &str {
        self.node_type
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: format!("Constant {} value", self.tag),
            category: "values".to_string(),
            inputs: vec![],
            outputs: vec![TerminalDefinition::new("value", &[self.tag])],
        }
    }
}
