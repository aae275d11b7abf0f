use crate::ReferenceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deferred value embedded in node input data, resolved once per run.
///
/// Serialized as `{"$fromVariable": {"name": ..}}` or
/// `{"$fromSecret": {"name": ..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    #[serde(rename = "$fromVariable")]
    FromVariable { name: String },

    #[serde(rename = "$fromSecret")]
    FromSecret { name: String },
}

impl Reference {
    pub fn variable(name: impl Into<String>) -> Self {
        Reference::FromVariable { name: name.into() }
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Reference::FromSecret { name: name.into() }
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            Reference::FromVariable { .. } => ReferenceKind::Variable,
            Reference::FromSecret { .. } => ReferenceKind::Secret,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Reference::FromVariable { name } | Reference::FromSecret { name } => name,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}
