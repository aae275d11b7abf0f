use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, InputSchema, NodeError, NodeOutput, OutputSchema, Process,
    ProcessContext, SocketSchema, Type, Value,
};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl Process for DebugNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .inputs
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)")
            .to_string();

        tracing::debug!("[{}] {}", ctx.node_id, message);
        ctx.trace.info(format!("DEBUG: {}", message));

        // Also log all inputs for visibility
        for (key, value) in &ctx.inputs {
            ctx.trace.info(format!("  {}: {}", key, value));
        }

        Ok(NodeOutput::new()
            .with_output("message", message)
            .with_output("value", ctx.input_or("value", Value::Null)))
    }
}

pub fn log() -> Component {
    Component::new(ComponentSpecifier::new("debug", "log"), DebugNode)
        .with_metadata("Logs input values for debugging", "debug")
        .with_inputs(InputSchema::new([
            SocketSchema::new("message", Type::String),
            SocketSchema::new("value", Type::Any),
        ]))
        .with_outputs(OutputSchema::new([
            SocketSchema::new("message", Type::String),
            SocketSchema::new("value", Type::Any),
        ]))
}
