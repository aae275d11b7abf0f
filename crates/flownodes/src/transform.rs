use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, InputSchema, NodeError, NodeOutput, OutputSchema, Process,
    ProcessContext, SocketSchema, Type, Value,
};

/// Parse JSON string to Value
pub struct JsonParseNode;

#[async_trait]
impl Process for JsonParseNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_input("json")?;
        let text = input.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "json".to_string(),
            expected: "string".to_string(),
            actual: input.type_name().to_string(),
        })?;

        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| NodeError::process(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", Value::from(parsed)))
    }
}

pub fn json_parse() -> Component {
    Component::new(ComponentSpecifier::new("json", "parse"), JsonParseNode)
        .with_metadata("Parse JSON string", "transform")
        .with_inputs(InputSchema::new([
            SocketSchema::new("json", Type::String).required()
        ]))
        .with_outputs(OutputSchema::new([SocketSchema::new("parsed", Type::Any)]))
}

/// Stringify Value to JSON
pub struct JsonStringifyNode;

#[async_trait]
impl Process for JsonStringifyNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let value = serde_json::Value::from(ctx.require_input("value")?.clone());
        let pretty = ctx.input_or("pretty", Value::Bool(false)).as_bool().unwrap_or(false);

        let json = if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|e| NodeError::process(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", json))
    }
}

pub fn json_stringify() -> Component {
    Component::new(ComponentSpecifier::new("json", "stringify"), JsonStringifyNode)
        .with_metadata("Convert value to JSON string", "transform")
        .with_inputs(InputSchema::new([
            SocketSchema::new("value", Type::Any).required(),
            SocketSchema::new("pretty", Type::Boolean).with_default(false),
        ]))
        .with_outputs(OutputSchema::new([SocketSchema::new("json", Type::String)]))
}
