use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, InputSchema, NodeError, NodeOutput, OutputSchema, Process,
    ProcessContext, SocketSchema, Type,
};

fn number(ctx: &ProcessContext, name: &str) -> Result<f64, NodeError> {
    let value = ctx.require_input(name)?;
    value.as_f64().ok_or_else(|| NodeError::InvalidInputType {
        field: name.to_string(),
        expected: "number".to_string(),
        actual: value.type_name().to_string(),
    })
}

fn binary(name: &str, description: &str, process: impl Process + 'static) -> Component {
    Component::new(ComponentSpecifier::new("math", name), process)
        .with_metadata(description, "math")
        .with_inputs(InputSchema::new([
            SocketSchema::new("a", Type::Number).required(),
            SocketSchema::new("b", Type::Number).required(),
        ]))
        .with_outputs(OutputSchema::new([SocketSchema::new("result", Type::Number)]))
}

/// Multiply two numbers
pub struct MultiplyNode;

#[async_trait]
impl Process for MultiplyNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let result = number(&ctx, "a")? * number(&ctx, "b")?;
        Ok(NodeOutput::new().with_output("result", result))
    }
}

pub fn multiply() -> Component {
    binary("multiply", "Multiply two numbers", MultiplyNode)
}

/// Add two numbers
pub struct AddNode;

#[async_trait]
impl Process for AddNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let result = number(&ctx, "a")? + number(&ctx, "b")?;
        Ok(NodeOutput::new().with_output("result", result))
    }
}

pub fn add() -> Component {
    binary("add", "Add two numbers", AddNode)
}
