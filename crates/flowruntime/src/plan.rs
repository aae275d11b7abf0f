use crate::{error::ThreadError, resolver::ComponentResolverChain};
use flowcore::{Component, ComponentSpecifier, FlowGraph, InputEntry, NodeId, Reference};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// A node with its resolved component and wiring.
pub(crate) struct PlannedNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub component: Arc<Component>,
    pub bindings: BTreeMap<String, InputEntry>,
    /// Distinct producer nodes this node waits for.
    pub upstream: Vec<NodeId>,
    /// Distinct consumer nodes, re-checked when this node settles.
    pub downstream: Vec<NodeId>,
}

/// Flow graph compiled against a component resolver chain.
pub(crate) struct ExecutionPlan {
    pub nodes: BTreeMap<NodeId, PlannedNode>,
    pub references: Vec<Reference>,
}

impl ExecutionPlan {
    pub async fn compile(
        graph: &FlowGraph,
        components: &ComponentResolverChain,
    ) -> Result<Self, ThreadError> {
        let specifiers: Vec<&ComponentSpecifier> =
            graph.nodes().map(|node| &node.component).collect();
        let resolved = components.resolve_all(specifiers).await;

        let mut nodes = BTreeMap::new();
        for node in graph.nodes() {
            let component = resolved
                .get(&node.component.to_string())
                .cloned()
                .unwrap_or_else(|| Arc::new(Component::unavailable(node.component.clone())));

            let mut bindings = node.inputs.clone();
            for entry in bindings.values_mut() {
                drop_dangling(entry, graph, &node.id);
            }
            bindings.retain(|_, entry| !matches!(entry, InputEntry::Paths(p) if p.is_empty()));

            let mut upstream: Vec<NodeId> = Vec::new();
            for entry in bindings.values() {
                for (_, source) in entry.links() {
                    if !upstream.contains(&source.id) {
                        upstream.push(source.id.clone());
                    }
                }
            }

            nodes.insert(
                node.id.clone(),
                PlannedNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    component,
                    bindings,
                    upstream,
                    downstream: Vec::new(),
                },
            );
        }

        let edges: Vec<(NodeId, NodeId)> = nodes
            .values()
            .flat_map(|n| n.upstream.iter().map(move |u| (u.clone(), n.id.clone())))
            .collect();
        for (from, to) in &edges {
            if let Some(producer) = nodes.get_mut(from) {
                producer.downstream.push(to.clone());
            }
        }

        check_acyclic(&nodes, &edges)?;

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for node in nodes.values() {
            for entry in node.bindings.values() {
                collect_references(entry, &mut seen, &mut references);
            }
        }

        Ok(Self { nodes, references })
    }
}

/// Build a dependency graph and reject cycles.
fn check_acyclic(
    nodes: &BTreeMap<NodeId, PlannedNode>,
    edges: &[(NodeId, NodeId)],
) -> Result<(), ThreadError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for id in nodes.keys() {
        index.insert(id.as_str(), graph.add_node(id.as_str()));
    }
    for (from, to) in edges {
        graph.add_edge(index[from.as_str()], index[to.as_str()], ());
    }

    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let node_id = graph[cycle.node_id()].to_string();
        tracing::error!("Cyclic dependency detected at node {}", node_id);
        ThreadError::CyclicGraph { node_id }
    })
}

/// Removes links whose source node is not part of the graph.
fn drop_dangling(entry: &mut InputEntry, graph: &FlowGraph, owner: &str) {
    match entry {
        InputEntry::Link(source) if graph.node(&source.id).is_none() => {
            tracing::warn!(
                "Ignoring link into {} from missing node {}",
                owner,
                source.id
            );
            *entry = InputEntry::Paths(BTreeMap::new());
        }
        InputEntry::Paths(paths) => {
            for nested in paths.values_mut() {
                drop_dangling(nested, graph, owner);
            }
            paths.retain(|_, nested| !matches!(nested, InputEntry::Paths(p) if p.is_empty()));
        }
        _ => {}
    }
}

fn collect_references(
    entry: &InputEntry,
    seen: &mut HashSet<Reference>,
    out: &mut Vec<Reference>,
) {
    match entry {
        InputEntry::Reference(reference) => {
            if seen.insert(reference.clone()) {
                out.push(reference.clone());
            }
        }
        InputEntry::Paths(paths) => {
            for nested in paths.values() {
                collect_references(nested, seen, out);
            }
        }
        _ => {}
    }
}
