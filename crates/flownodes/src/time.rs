use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, InputSchema, NodeError, NodeOutput, OutputSchema, Process,
    ProcessContext, SocketSchema, Type, Value,
};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl Process for DelayNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .input_or("delay_ms", Value::Number(1000.0))
            .as_f64()
            .unwrap_or(1000.0)
            .max(0.0) as u64;

        ctx.trace.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            biased;
            _ = ctx.signal.cancelled() => return Err(NodeError::Cancelled),
            _ = sleep(Duration::from_millis(delay_ms)) => {}
        }

        Ok(NodeOutput::new().with_output("value", ctx.input_or("value", Value::Null)))
    }
}

pub fn delay() -> Component {
    Component::new(ComponentSpecifier::new("time", "delay"), DelayNode)
        .with_metadata("Delay execution for specified milliseconds", "time")
        .with_inputs(InputSchema::new([
            SocketSchema::new("value", Type::Any),
            SocketSchema::new("delay_ms", Type::Integer).with_default(1000i64),
        ]))
        .with_outputs(OutputSchema::new([SocketSchema::new("value", Type::Any)]))
}
