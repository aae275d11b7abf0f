use async_trait::async_trait;
use flowcore::{
    Component, ComponentSpecifier, InputSchema, NodeError, NodeOutput, OutputSchema, Process,
    ProcessContext, SocketSchema, Type, Value,
};

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: &str, url: &str) -> Result<reqwest::RequestBuilder, NodeError> {
        let request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            _ => {
                return Err(NodeError::InvalidInputType {
                    field: "method".to_string(),
                    expected: "GET, POST, PUT, PATCH or DELETE".to_string(),
                    actual: method.to_string(),
                })
            }
        };
        Ok(request)
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Process for HttpRequestNode {
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError> {
        let url = ctx
            .require_input("url")?
            .as_str()
            .ok_or_else(|| NodeError::InvalidInputType {
                field: "url".to_string(),
                expected: "string".to_string(),
                actual: "other".to_string(),
            })?
            .to_string();
        let method_value = ctx.input_or("method", Value::from("GET"));
        let method = method_value.as_str().unwrap_or("GET");

        ctx.trace.info(format!("{} {}", method, url));

        let mut request = self.request(method, &url)?;
        match ctx.inputs.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(body) => request = request.json(&serde_json::Value::from(body.clone())),
        }

        // Add headers if provided
        if let Some(headers) = ctx.inputs.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(val_str) = value.as_str() {
                    request = request.header(key, val_str);
                }
            }
        }

        let response = tokio::select! {
            biased;
            _ = ctx.signal.cancelled() => return Err(NodeError::Cancelled),
            response = request.send() => response
                .map_err(|e| NodeError::process(format!("HTTP request failed: {}", e)))?,
        };

        let status = response.status().as_u16();
        let headers = Value::object(response.headers().iter().map(|(k, v)| {
            (
                k.to_string(),
                Value::String(v.to_str().unwrap_or("").to_string()),
            )
        }));

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::process(format!("Failed to read response: {}", e)))?;

        ctx.trace.info(format!("Response status: {}", status));

        Ok(NodeOutput::new()
            .with_output("status", status as i64)
            .with_output("body", body_text)
            .with_output("headers", headers))
    }
}

fn methods() -> Vec<Value> {
    ["GET", "POST", "PUT", "PATCH", "DELETE"]
        .into_iter()
        .map(Value::from)
        .collect()
}

pub fn request() -> Component {
    Component::new(ComponentSpecifier::new("http", "request"), HttpRequestNode::new())
        .with_metadata("Make HTTP requests", "http")
        .with_inputs(InputSchema::new([
            SocketSchema::new("url", Type::String).required(),
            SocketSchema::new("method", Type::Enum(methods()))
                .with_default("GET")
                .with_options(methods()),
            SocketSchema::new("headers", Type::map(Type::String)),
            SocketSchema::new("body", Type::Any),
        ]))
        .with_outputs(OutputSchema::new([
            SocketSchema::new("status", Type::Integer),
            SocketSchema::new("body", Type::String),
            SocketSchema::new("headers", Type::map(Type::String)),
        ]))
}
