//! Socket type system.
//!
//! Every component declares its input and output sockets with a [`Type`].
//! Values arriving on an input socket are validated and coerced before the
//! component's process function sees them.

use crate::{NodeError, Sockets, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of a socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "of", rename_all = "camelCase")]
pub enum Type {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array(Box<Type>),
    Map(Box<Type>),
    Optional(Box<Type>),
    Enum(Vec<Value>),
}

impl Type {
    pub fn array(item: Type) -> Self {
        Type::Array(Box::new(item))
    }

    pub fn map(item: Type) -> Self {
        Type::Map(Box::new(item))
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional(Box::new(inner))
    }

    pub fn name(&self) -> String {
        match self {
            Type::Any => "any".into(),
            Type::String => "string".into(),
            Type::Number => "number".into(),
            Type::Integer => "integer".into(),
            Type::Boolean => "boolean".into(),
            Type::Object => "object".into(),
            Type::Array(item) => format!("array<{}>", item.name()),
            Type::Map(item) => format!("map<{}>", item.name()),
            Type::Optional(inner) => format!("{}?", inner.name()),
            Type::Enum(values) => {
                let names: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("enum({})", names.join("|"))
            }
        }
    }

    /// Validates `value` against this type, coercing where the conversion
    /// is lossless. `field` names the socket in the returned error.
    pub fn coerce(&self, field: &str, value: Value) -> Result<Value, NodeError> {
        let mismatch = |value: &Value| NodeError::InvalidInputType {
            field: field.to_string(),
            expected: self.name(),
            actual: value.type_name().to_string(),
        };

        match (self, value) {
            (Type::Any, value) => Ok(value),

            (Type::Optional(_), Value::Null) => Ok(Value::Null),
            (Type::Optional(inner), value) => inner.coerce(field, value),

            (Type::String, Value::String(s)) => Ok(Value::String(s)),
            (Type::String, Value::Number(n)) => Ok(Value::String(Value::Number(n).to_string())),
            (Type::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (Type::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (Type::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Value::Number(n)),
                _ => Err(mismatch(&Value::String(s))),
            },

            (Type::Integer, value) => match Type::Number.coerce(field, value.clone()) {
                Ok(Value::Number(n)) if n.fract() == 0.0 => Ok(Value::Number(n)),
                _ => Err(mismatch(&value)),
            },

            (Type::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Type::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch(&Value::String(s))),
            },

            (Type::Object, Value::Object(map)) => Ok(Value::Object(map)),

            (Type::Array(item), Value::Array(items)) => items
                .into_iter()
                .map(|v| item.coerce(field, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (Type::Array(item), Value::Bytes(bytes)) => bytes
                .into_iter()
                .map(|b| item.coerce(field, Value::Number(b as f64)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (Type::Array(_), Value::Null) => Ok(Value::Array(Vec::new())),
            (Type::Array(item), scalar) => Ok(Value::Array(vec![item.coerce(field, scalar)?])),

            (Type::Map(item), Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| item.coerce(field, v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Object),

            (Type::Enum(allowed), value) => {
                if allowed.contains(&value) {
                    Ok(value)
                } else {
                    Err(mismatch(&value))
                }
            }

            (_, value) => Err(mismatch(&value)),
        }
    }
}

/// A named, typed slot on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    /// Suggested values offered to editors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

impl SocketSchema {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            default: None,
            required: false,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = Value>) -> Self {
        self.options = options.into_iter().collect();
        self
    }
}

/// Ordered list of input sockets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema(pub Vec<SocketSchema>);

impl InputSchema {
    pub fn new(sockets: impl IntoIterator<Item = SocketSchema>) -> Self {
        Self(sockets.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<&SocketSchema> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketSchema> {
        self.0.iter()
    }

    /// Fills defaults, checks required sockets and coerces every declared
    /// socket. Sockets that are not declared pass through unchanged.
    pub fn prepare(
        &self,
        mut inputs: Sockets,
    ) -> Result<Sockets, NodeError> {
        for socket in &self.0 {
            match inputs.remove(&socket.name) {
                Some(value) => {
                    let coerced = socket.ty.coerce(&socket.name, value)?;
                    inputs.insert(socket.name.clone(), coerced);
                }
                None => {
                    if let Some(default) = &socket.default {
                        inputs.insert(socket.name.clone(), default.clone());
                    } else if socket.required {
                        return Err(NodeError::MissingInput {
                            name: socket.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(inputs)
    }
}

/// Ordered list of output sockets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSchema(pub Vec<SocketSchema>);

impl OutputSchema {
    pub fn new(sockets: impl IntoIterator<Item = SocketSchema>) -> Self {
        Self(sockets.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<&SocketSchema> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketSchema> {
        self.0.iter()
    }
}
