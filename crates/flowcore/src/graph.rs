use crate::{
    document::{FlowDocument, NodeDocument, DOCUMENT_VERSION},
    ComponentSpecifier, GraphError, Reference, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

pub type NodeId = String;

/// Keys of a node document that cannot be used as socket names.
pub const RESERVED_KEYS: [&str; 4] = ["component", "name", "description", "meta"];

/// Node position in the visual editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Editor metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Upstream end of a link, stored on the target socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSource {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Value bound to an input socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryRepr", into = "EntryRepr")]
pub enum InputEntry {
    Static(Value),
    Reference(Reference),
    Link(LinkSource),
    /// Bindings addressing nested positions of the socket, keyed by path.
    Paths(BTreeMap<String, InputEntry>),
}

impl InputEntry {
    /// Link sources reachable from this entry, with their target path.
    pub fn links(&self) -> Vec<(Option<&str>, &LinkSource)> {
        match self {
            InputEntry::Link(source) => vec![(None, source)],
            InputEntry::Paths(paths) => paths
                .iter()
                .filter_map(|(path, entry)| match entry {
                    InputEntry::Link(source) => Some((Some(path.as_str()), source)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for InputEntry {
    fn from(value: Value) -> Self {
        InputEntry::Static(value)
    }
}

impl From<Reference> for InputEntry {
    fn from(reference: Reference) -> Self {
        InputEntry::Reference(reference)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkRepr {
    #[serde(rename = "$fromNode")]
    from_node: LinkSource,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsRepr {
    #[serde(rename = "$paths")]
    paths: BTreeMap<String, InputEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Link(LinkRepr),
    Paths(PathsRepr),
    Reference(Reference),
    Static(Value),
}

impl From<EntryRepr> for InputEntry {
    fn from(repr: EntryRepr) -> Self {
        match repr {
            EntryRepr::Link(link) => InputEntry::Link(link.from_node),
            EntryRepr::Paths(paths) => InputEntry::Paths(paths.paths),
            EntryRepr::Reference(reference) => InputEntry::Reference(reference),
            EntryRepr::Static(value) => InputEntry::Static(value),
        }
    }
}

impl From<InputEntry> for EntryRepr {
    fn from(entry: InputEntry) -> Self {
        match entry {
            InputEntry::Link(from_node) => EntryRepr::Link(LinkRepr { from_node }),
            InputEntry::Paths(paths) => EntryRepr::Paths(PathsRepr { paths }),
            InputEntry::Reference(reference) => EntryRepr::Reference(reference),
            InputEntry::Static(value) => EntryRepr::Static(value),
        }
    }
}

/// One component instance within a flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub id: NodeId,
    pub component: ComponentSpecifier,
    pub name: Option<String>,
    pub description: Option<String>,
    pub inputs: BTreeMap<String, InputEntry>,
    pub meta: NodeMeta,
}

impl FlowNode {
    pub fn new(id: impl Into<NodeId>, component: ComponentSpecifier) -> Self {
        Self {
            id: id.into(),
            component,
            name: None,
            description: None,
            inputs: BTreeMap::new(),
            meta: NodeMeta::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input(mut self, socket: impl Into<String>, entry: impl Into<InputEntry>) -> Self {
        self.inputs.insert(socket.into(), entry.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.meta.position = Position::new(x, y);
        self
    }

    /// Static value bound to `socket`, if any.
    pub fn static_input(&self, socket: &str) -> Option<&Value> {
        match self.inputs.get(socket) {
            Some(InputEntry::Static(value)) => Some(value),
            _ => None,
        }
    }
}

/// Directed edge from an output socket to an input socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowLink {
    pub source_node_id: NodeId,
    pub source_socket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub target_node_id: NodeId,
    pub target_socket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

impl FlowLink {
    pub fn new(
        source_node_id: impl Into<NodeId>,
        source_socket: impl Into<String>,
        target_node_id: impl Into<NodeId>,
        target_socket: impl Into<String>,
    ) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            source_socket: source_socket.into(),
            source_path: None,
            target_node_id: target_node_id.into(),
            target_socket: target_socket.into(),
            target_path: None,
        }
    }

    fn source(&self) -> LinkSource {
        LinkSource {
            id: self.source_node_id.clone(),
            name: self.source_socket.clone(),
            path: self.source_path.clone(),
        }
    }
}

/// Declarative dataflow graph of one flow.
///
/// Every edit is total over the current state: odd but well-formed edits
/// such as removing an unknown link are no-ops. Links live on the target
/// node's input entries, so removing a node never leaves a dangling link
/// behind on its own sockets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGraph {
    nodes: BTreeMap<NodeId, FlowNode>,
    metadata: BTreeMap<String, Value>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    fn allocate_id(&self, component: &ComponentSpecifier) -> NodeId {
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let id = format!("{}-{}", component.name, &suffix[..8]);
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Creates a node bound to `component` and returns its fresh id.
    pub fn create_node(&mut self, component: ComponentSpecifier, position: Position) -> NodeId {
        let id = self.allocate_id(&component);
        let mut node = FlowNode::new(id.clone(), component);
        node.meta.position = position;
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Inserts a fully built node.
    pub fn add_node(&mut self, node: FlowNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if let Some(reserved) = node.inputs.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(GraphError::ReservedSocket(reserved.clone()));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Duplicates `ids`, placing the first clone at `anchor` and keeping the
    /// others at the same relative offset. Links between cloned nodes are
    /// rewired to the clones; links from outside keep their original source.
    /// Returns the new ids in the order of `ids` (unknown ids are skipped).
    pub fn clone_nodes(&mut self, ids: &[NodeId], anchor: Position) -> Vec<NodeId> {
        let originals: Vec<FlowNode> = ids
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect();
        let Some(first) = originals.first() else {
            return Vec::new();
        };
        let dx = anchor.x - first.meta.position.x;
        let dy = anchor.y - first.meta.position.y;

        let mut renamed: HashMap<NodeId, NodeId> = HashMap::new();
        for original in &originals {
            let id = self.allocate_id(&original.component);
            // Reserve the id so the next allocation cannot collide with it.
            self.nodes
                .insert(id.clone(), FlowNode::new(id.clone(), original.component.clone()));
            renamed.insert(original.id.clone(), id);
        }

        let mut created = Vec::with_capacity(originals.len());
        for original in originals {
            let id = renamed[&original.id].clone();
            let mut node = original;
            node.id = id.clone();
            node.meta.position.x += dx;
            node.meta.position.y += dy;
            for entry in node.inputs.values_mut() {
                rewire(entry, &renamed);
            }
            self.nodes.insert(id.clone(), node);
            created.push(id);
        }
        created
    }

    /// Removes nodes and every link whose source is one of them. Returns
    /// the ids that actually existed.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Vec<NodeId> {
        let removed: Vec<NodeId> = ids
            .iter()
            .filter(|id| self.nodes.remove(id.as_str()).is_some())
            .cloned()
            .collect();
        if removed.is_empty() {
            return removed;
        }

        let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
        for node in self.nodes.values_mut() {
            node.inputs.retain(|_, entry| prune(entry, &gone));
        }
        tracing::debug!("Removed nodes {:?}", removed);
        removed
    }

    /// Binds (or with `None`, unbinds) an input socket. Returns `false`
    /// when the node does not exist.
    pub fn set_node_input_value(
        &mut self,
        id: &str,
        socket: &str,
        entry: Option<InputEntry>,
    ) -> Result<bool, GraphError> {
        if RESERVED_KEYS.contains(&socket) {
            return Err(GraphError::ReservedSocket(socket.to_string()));
        }
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(false);
        };
        match entry {
            Some(entry) => {
                node.inputs.insert(socket.to_string(), entry);
            }
            None => {
                node.inputs.remove(socket);
            }
        }
        Ok(true)
    }

    /// Sets `position`, `label` or `comment` on each node. Returns the ids
    /// that were updated.
    pub fn set_nodes_meta_value(
        &mut self,
        ids: &[NodeId],
        key: &str,
        value: &Value,
    ) -> Result<Vec<NodeId>, GraphError> {
        enum Update {
            Position(Position),
            Label(Option<String>),
            Comment(Option<String>),
        }

        let text = |value: &Value| -> Result<Option<String>, GraphError> {
            match value {
                Value::Null => Ok(None),
                Value::String(s) if s.is_empty() => Ok(None),
                Value::String(s) => Ok(Some(s.clone())),
                other => Err(GraphError::InvalidMetaValue {
                    key: key.to_string(),
                    reason: format!("expected string, got {}", other.type_name()),
                }),
            }
        };

        let update = match key {
            "position" => {
                let coord = |axis: &str| value.get_path(axis).and_then(Value::as_f64);
                match (coord("x"), coord("y")) {
                    (Some(x), Some(y)) => Update::Position(Position::new(x, y)),
                    _ => {
                        return Err(GraphError::InvalidMetaValue {
                            key: key.to_string(),
                            reason: "expected {x, y}".to_string(),
                        })
                    }
                }
            }
            "label" => Update::Label(text(value)?),
            "comment" => Update::Comment(text(value)?),
            other => return Err(GraphError::UnknownMetaKey(other.to_string())),
        };

        let mut updated = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            match &update {
                Update::Position(position) => node.meta.position = *position,
                Update::Label(label) => node.meta.label = label.clone(),
                Update::Comment(comment) => node.meta.comment = comment.clone(),
            }
            updated.push(id.clone());
        }
        Ok(updated)
    }

    /// Sets (or with `Null`, clears) a flow-level metadata entry.
    pub fn set_meta_value(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.metadata.remove(&key);
        } else {
            self.metadata.insert(key, value);
        }
    }

    /// All links, derived from the nodes' input entries.
    pub fn links(&self) -> Vec<FlowLink> {
        let mut links = Vec::new();
        for node in self.nodes.values() {
            for (socket, entry) in &node.inputs {
                for (target_path, source) in entry.links() {
                    links.push(FlowLink {
                        source_node_id: source.id.clone(),
                        source_socket: source.name.clone(),
                        source_path: source.path.clone(),
                        target_node_id: node.id.clone(),
                        target_socket: socket.clone(),
                        target_path: target_path.map(str::to_string),
                    });
                }
            }
        }
        links
    }

    /// Connects an output socket to an input socket, replacing whatever the
    /// target position was bound to.
    pub fn create_link(&mut self, link: FlowLink) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&link.source_node_id) {
            return Err(GraphError::NodeNotFound(link.source_node_id));
        }
        if RESERVED_KEYS.contains(&link.target_socket.as_str()) {
            return Err(GraphError::ReservedSocket(link.target_socket));
        }
        let source = link.source();
        let target = self
            .nodes
            .get_mut(&link.target_node_id)
            .ok_or_else(|| GraphError::NodeNotFound(link.target_node_id.clone()))?;

        match link.target_path {
            None => {
                target
                    .inputs
                    .insert(link.target_socket, InputEntry::Link(source));
            }
            Some(path) => {
                let entry = target
                    .inputs
                    .entry(link.target_socket)
                    .or_insert_with(|| InputEntry::Paths(BTreeMap::new()));
                if !matches!(entry, InputEntry::Paths(_)) {
                    *entry = InputEntry::Paths(BTreeMap::new());
                }
                if let InputEntry::Paths(paths) = entry {
                    paths.insert(path, InputEntry::Link(source));
                }
            }
        }
        Ok(())
    }

    /// Removes every link with an endpoint at `(id, socket, path)`, matching
    /// either the target or the source side. Returns the target node ids
    /// whose inputs changed.
    pub fn remove_link(&mut self, id: &str, socket: &str, path: Option<&str>) -> Vec<NodeId> {
        let doomed: Vec<FlowLink> = self
            .links()
            .into_iter()
            .filter(|link| {
                let target = link.target_node_id == id
                    && link.target_socket == socket
                    && link.target_path.as_deref() == path;
                let source = link.source_node_id == id
                    && link.source_socket == socket
                    && link.source_path.as_deref() == path;
                target || source
            })
            .collect();

        let mut changed: Vec<NodeId> = Vec::new();
        for link in doomed {
            let Some(node) = self.nodes.get_mut(&link.target_node_id) else {
                continue;
            };
            match &link.target_path {
                None => {
                    node.inputs.remove(&link.target_socket);
                }
                Some(target_path) => {
                    if let Some(InputEntry::Paths(paths)) = node.inputs.get_mut(&link.target_socket)
                    {
                        paths.remove(target_path);
                        if paths.is_empty() {
                            node.inputs.remove(&link.target_socket);
                        }
                    }
                }
            }
            if !changed.contains(&link.target_node_id) {
                changed.push(link.target_node_id.clone());
            }
        }
        changed
    }

    pub fn to_document(&self) -> FlowDocument {
        let nodes = self
            .nodes
            .values()
            .map(|node| {
                (
                    node.id.clone(),
                    NodeDocument {
                        component: node.component.clone(),
                        name: node.name.clone(),
                        description: node.description.clone(),
                        meta: node.meta.clone(),
                        inputs: node.inputs.clone(),
                    },
                )
            })
            .collect();
        FlowDocument {
            version: DOCUMENT_VERSION.to_string(),
            nodes,
            metadata: self.metadata.clone(),
        }
    }

    pub fn from_document(document: FlowDocument) -> Result<Self, GraphError> {
        if document.version != DOCUMENT_VERSION {
            return Err(GraphError::UnsupportedVersion(document.version));
        }
        let mut graph = FlowGraph {
            nodes: BTreeMap::new(),
            metadata: document.metadata,
        };
        for (id, node) in document.nodes {
            graph.add_node(FlowNode {
                id,
                component: node.component,
                name: node.name,
                description: node.description,
                inputs: node.inputs,
                meta: node.meta,
            })?;
        }
        Ok(graph)
    }
}

fn rewire(entry: &mut InputEntry, renamed: &HashMap<NodeId, NodeId>) {
    match entry {
        InputEntry::Link(source) => {
            if let Some(id) = renamed.get(&source.id) {
                source.id = id.clone();
            }
        }
        InputEntry::Paths(paths) => {
            for nested in paths.values_mut() {
                rewire(nested, renamed);
            }
        }
        _ => {}
    }
}

/// Drops links whose source is gone. Returns whether the entry survives.
fn prune(entry: &mut InputEntry, gone: &HashSet<&str>) -> bool {
    match entry {
        InputEntry::Link(source) => !gone.contains(source.id.as_str()),
        InputEntry::Paths(paths) => {
            paths.retain(|_, nested| prune(nested, gone));
            !paths.is_empty()
        }
        _ => true,
    }
}
