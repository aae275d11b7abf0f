use crate::{
    events::TraceEmitter, GraphError, InputSchema, NodeError, NodeId, OutputSchema, Sockets,
    Value,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Addressable identifier of a component kind:
/// `registry/workspace/collection:name@tag`.
///
/// Leading path segments are optional. One segment is a collection, two are
/// `workspace/collection`, three are `registry/workspace/collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentSpecifier {
    pub registry: Option<String>,
    pub workspace: Option<String>,
    pub collection: Option<String>,
    pub name: String,
    pub tag: Option<String>,
}

impl ComponentSpecifier {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            registry: None,
            workspace: None,
            collection: Some(collection.into()),
            name: name.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Same specifier without its tag.
    pub fn untagged(&self) -> Self {
        Self {
            tag: None,
            ..self.clone()
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for ComponentSpecifier {
    type Err = GraphError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| GraphError::InvalidSpecifier {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (path, rest) = match input.rsplit_once(':') {
            Some((path, rest)) => (Some(path), rest),
            None => (None, input),
        };
        let (name, tag) = match rest.split_once('@') {
            Some((name, tag)) => (name, Some(tag)),
            None => (rest, None),
        };

        if !valid_segment(name) {
            return Err(invalid("missing or malformed name"));
        }
        if let Some(tag) = tag {
            if !valid_segment(tag) {
                return Err(invalid("malformed tag"));
            }
        }

        let segments: Vec<&str> = match path {
            Some(path) => path.split('/').collect(),
            None => Vec::new(),
        };
        if segments.iter().any(|s| !valid_segment(s)) {
            return Err(invalid("malformed path segment"));
        }

        let owned = |s: &&str| s.to_string();
        let (registry, workspace, collection) = match segments.as_slice() {
            [] => (None, None, None),
            [collection] => (None, None, Some(owned(collection))),
            [workspace, collection] => (None, Some(owned(workspace)), Some(owned(collection))),
            [registry, workspace, collection] => (
                Some(owned(registry)),
                Some(owned(workspace)),
                Some(owned(collection)),
            ),
            _ => return Err(invalid("too many path segments")),
        };

        Ok(Self {
            registry,
            workspace,
            collection,
            name: name.to_string(),
            tag: tag.map(str::to_string),
        })
    }
}

impl TryFrom<String> for ComponentSpecifier {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComponentSpecifier> for String {
    fn from(specifier: ComponentSpecifier) -> Self {
        specifier.to_string()
    }
}

impl fmt::Display for ComponentSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<&str> = [&self.registry, &self.workspace, &self.collection]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .collect();
        if !path.is_empty() {
            write!(f, "{}:", path.join("/"))?;
        }
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, "@{}", tag)?;
        }
        Ok(())
    }
}

/// How the engine treats nodes bound to a component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentRole {
    /// Regular node driven through its process function.
    #[default]
    Process,
    /// Flow-level input boundary, seeded by the engine.
    Input,
    /// Flow-level output boundary, collected by the engine.
    Output,
    /// Runs even when upstream inputs failed; failures arrive in `ctx.errors`.
    ErrorHandler,
}

/// Human-facing description of a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
}

/// The computation behind a component.
#[async_trait]
pub trait Process: Send + Sync {
    /// Computes output socket values from prepared inputs.
    async fn process(&self, ctx: ProcessContext) -> Result<NodeOutput, NodeError>;

    /// Suggested values for an input socket, filtered by `query`.
    async fn input_options(
        &self,
        schema: &InputSchema,
        socket: &str,
        query: &str,
    ) -> Result<Vec<Value>, NodeError> {
        Ok(filter_options(schema, socket, query))
    }
}

/// Schema-declared options of `socket` whose text contains `query`
/// (case-insensitive).
pub fn filter_options(schema: &InputSchema, socket: &str, query: &str) -> Vec<Value> {
    let query = query.to_lowercase();
    schema
        .get(socket)
        .map(|s| {
            s.options
                .iter()
                .filter(|option| option.to_string().to_lowercase().contains(&query))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// A reusable computation unit: kind, metadata, socket schemas and an
/// optional process function.
#[derive(Clone)]
pub struct Component {
    pub specifier: ComponentSpecifier,
    pub metadata: ComponentMetadata,
    pub inputs: InputSchema,
    pub outputs: OutputSchema,
    pub role: ComponentRole,
    pub process: Option<Arc<dyn Process>>,
}

impl Component {
    pub fn new(specifier: ComponentSpecifier, process: impl Process + 'static) -> Self {
        let name = specifier.name.clone();
        Self {
            specifier,
            metadata: ComponentMetadata {
                name,
                ..Default::default()
            },
            inputs: InputSchema::default(),
            outputs: OutputSchema::default(),
            role: ComponentRole::Process,
            process: Some(Arc::new(process)),
        }
    }

    /// Component for a role the engine handles itself (input/output).
    pub fn boundary(specifier: ComponentSpecifier, role: ComponentRole) -> Self {
        let name = specifier.name.clone();
        Self {
            specifier,
            metadata: ComponentMetadata {
                name,
                ..Default::default()
            },
            inputs: InputSchema::default(),
            outputs: OutputSchema::default(),
            role,
            process: None,
        }
    }

    /// Placeholder substituted for a kind no resolver knows about.
    pub fn unavailable(specifier: ComponentSpecifier) -> Self {
        let description = format!("Component {} is unavailable", specifier);
        Self {
            metadata: ComponentMetadata {
                name: specifier.name.clone(),
                description,
                category: "unavailable".to_string(),
            },
            specifier,
            inputs: InputSchema::default(),
            outputs: OutputSchema::default(),
            role: ComponentRole::Process,
            process: None,
        }
    }

    pub fn with_metadata(
        mut self,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.metadata.description = description.into();
        self.metadata.category = category.into();
        self
    }

    pub fn with_inputs(mut self, inputs: InputSchema) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: OutputSchema) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_role(mut self, role: ComponentRole) -> Self {
        self.role = role;
        self
    }

    /// False for the unavailable placeholder.
    pub fn available(&self) -> bool {
        self.process.is_some() || matches!(self.role, ComponentRole::Input | ComponentRole::Output)
    }

    pub fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor {
            kind: self.specifier.clone(),
            metadata: self.metadata.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            role: self.role,
            available: self.available(),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("specifier", &self.specifier)
            .field("role", &self.role)
            .field("available", &self.available())
            .finish()
    }
}

/// Serializable view of a component, sent to editors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub kind: ComponentSpecifier,
    #[serde(flatten)]
    pub metadata: ComponentMetadata,
    pub inputs: InputSchema,
    pub outputs: OutputSchema,
    pub role: ComponentRole,
    pub available: bool,
}

/// Execution context passed to a component's process function.
#[derive(Clone)]
pub struct ProcessContext {
    pub node_id: NodeId,

    /// Prepared input values.
    pub inputs: Sockets,

    /// Failed upstream inputs, only populated for error handlers.
    pub errors: BTreeMap<String, NodeError>,

    /// Emits `nodeTrace` events for this node.
    pub trace: TraceEmitter,

    /// Shared abort signal of the running thread.
    pub signal: CancellationToken,
}

impl ProcessContext {
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs.get(name).ok_or_else(|| NodeError::MissingInput {
            name: name.to_string(),
        })
    }

    pub fn input_or(&self, name: &str, default: Value) -> Value {
        self.inputs.get(name).cloned().unwrap_or(default)
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_cancelled()
    }
}

/// Output socket values produced by a process call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub outputs: Sockets,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, socket: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(socket.into(), value.into());
        self
    }
}

impl From<Sockets> for NodeOutput {
    fn from(outputs: Sockets) -> Self {
        Self { outputs }
    }
}
