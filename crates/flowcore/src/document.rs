//! Persisted form of a flow.
//!
//! ```json
//! { "version": "1",
//!   "nodes": { "double": { "component": "math:multiply",
//!                          "meta": { "position": { "x": 0, "y": 0 } },
//!                          "a": { "$fromNode": { "id": "input", "name": "value" } },
//!                          "b": 2 } },
//!   "metadata": {} }
//! ```

use crate::{ComponentSpecifier, FlowError, FlowGraph, InputEntry, NodeId, NodeMeta, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DOCUMENT_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub version: String,
    pub nodes: BTreeMap<NodeId, NodeDocument>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub component: ComponentSpecifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub meta: NodeMeta,
    #[serde(flatten)]
    pub inputs: BTreeMap<String, InputEntry>,
}

/// Encoding of a document on disk or on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(DocumentFormat::Json),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            other => Err(FlowError::Document(format!("unknown format: {}", other))),
        }
    }
}

impl FlowDocument {
    pub fn to_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_yaml(&self) -> Result<String, FlowError> {
        Ok(serde_yaml_bw::to_string(self)?)
    }

    pub fn from_yaml(input: &str) -> Result<Self, FlowError> {
        Ok(serde_yaml_bw::from_str(input)?)
    }

    pub fn encode(&self, format: DocumentFormat) -> Result<String, FlowError> {
        match format {
            DocumentFormat::Json => self.to_json(),
            DocumentFormat::Yaml => self.to_yaml(),
        }
    }

    pub fn decode(input: &str, format: DocumentFormat) -> Result<Self, FlowError> {
        match format {
            DocumentFormat::Json => Self::from_json(input),
            DocumentFormat::Yaml => Self::from_yaml(input),
        }
    }

    pub fn into_graph(self) -> Result<FlowGraph, FlowError> {
        Ok(FlowGraph::from_document(self)?)
    }
}

impl From<&FlowGraph> for FlowDocument {
    fn from(graph: &FlowGraph) -> Self {
        graph.to_document()
    }
}
