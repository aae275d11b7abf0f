use async_trait::async_trait;
use flowcore::{
    Component, ComponentRole, ComponentSpecifier, InputSchema, NodeError, NodeOutput,
    OutputSchema, Process, ProcessContext, SocketSchema, Type, Value,
};

/// Flow input. Fed from the run's initial inputs or interactively; the
/// runtime completes it without calling a process function.
pub fn input() -> Component {
    Component::boundary(ComponentSpecifier::new("core", "input"), ComponentRole::Input)
        .with_metadata("Flow input value", "core")
        .with_inputs(InputSchema::new([
            SocketSchema::new("name", Type::String)
                .with_description("Input name; defaults to the node name"),
            SocketSchema::new("default", Type::Any)
                .with_description("Value used when the run provides none"),
        ]))
        .with_outputs(OutputSchema::new([SocketSchema::new("value", Type::Any)]))
}

/// Flow output. Emits `output` once its value arrives.
pub fn output() -> Component {
    Component::boundary(ComponentSpecifier::new("core", "output"), ComponentRole::Output)
        .with_metadata("Flow output value", "core")
        .with_inputs(InputSchema::new([
            SocketSchema::new("name", Type::String)
                .with_description("Output name; defaults to the node name"),
            SocketSchema::new("value", Type::Any),
        ]))
}

/// Error handler: runs even when its upstream failed and turns the failure
/// into regular output values.
pub struct CatchNode;

#[async_trait]
impl Process for CatchNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let Some((socket, error)) = ctx.errors.iter().next() else {
            return Ok(NodeOutput::new()
                .with_output("value", ctx.input_or("value", Value::Null))
                .with_output("failed", false));
        };

        ctx.trace.warn(format!("Caught failure on '{}': {}", socket, error));
        let detail = serde_json::to_value(error)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(error.to_string()));

        Ok(NodeOutput::new()
            .with_output("value", ctx.input_or("fallback", Value::Null))
            .with_output("failed", true)
            .with_output("error", error.to_string())
            .with_output("detail", detail))
    }
}

pub fn catch() -> Component {
    Component::new(ComponentSpecifier::new("core", "catch"), CatchNode)
        .with_role(ComponentRole::ErrorHandler)
        .with_metadata("Recover from an upstream failure", "core")
        .with_inputs(InputSchema::new([
            SocketSchema::new("value", Type::Any),
            SocketSchema::new("fallback", Type::Any)
                .with_description("Emitted as value when the upstream failed"),
        ]))
        .with_outputs(OutputSchema::new([
            SocketSchema::new("value", Type::Any),
            SocketSchema::new("failed", Type::Boolean),
            SocketSchema::new("error", Type::optional(Type::String)),
            SocketSchema::new("detail", Type::optional(Type::Object)),
        ]))
}
