//! Adjacency indices and readiness evaluation over a chain graph.

use std::collections::HashMap;

use crate::types::{ChainDefinition, ChainEdge, EdgeRunState, NodeType};

/// source node_id -> outgoing edges, in declaration order.
pub(super) fn build_outgoing(chain: &ChainDefinition) -> HashMap<&str, Vec<&ChainEdge>> {
    let mut outgoing: HashMap<&str, Vec<&ChainEdge>> = HashMap::new();
    for edge in &chain.edges {
        outgoing
            .entry(edge.source_node_id.as_str())
            .or_default()
            .push(edge);
    }
    outgoing
}

/// target node_id -> incoming edges, in declaration order.
pub(super) fn build_incoming(chain: &ChainDefinition) -> HashMap<&str, Vec<&ChainEdge>> {
    let mut incoming: HashMap<&str, Vec<&ChainEdge>> = HashMap::new();
    for edge in &chain.edges {
        incoming
            .entry(edge.target_node_id.as_str())
            .or_default()
            .push(edge);
    }
    incoming
}

/// Initial ready set: every node with zero incoming edges plus every
/// START node, deduplicated, in declaration order.
pub(super) fn seed_ready(
    chain: &ChainDefinition,
    incoming: &HashMap<&str, Vec<&ChainEdge>>,
) -> Vec<String> {
    let mut seed = Vec::new();
    for node in &chain.nodes {
        let no_incoming = incoming
            .get(node.node_id.as_str())
            .map_or(true, |edges| edges.is_empty());
        if (no_incoming || node.node_type == NodeType::Start)
            && !seed.contains(&node.node_id)
        {
            seed.push(node.node_id.clone());
        }
    }
    seed
}

/// Whether a pending node can run, must be skipped, or has to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Readiness {
    Ready,
    Skip,
    Wait,
}

/// A node is ready once every incoming edge is resolved and at least one
/// is active; all-resolved-all-inactive means it can never run.
pub(super) fn readiness(
    node_id: &str,
    incoming: &HashMap<&str, Vec<&ChainEdge>>,
    edge_states: &HashMap<String, EdgeRunState>,
) -> Readiness {
    let edges = incoming.get(node_id).map(Vec::as_slice).unwrap_or_default();
    if edges.is_empty() {
        return Readiness::Ready;
    }
    let mut any_active = false;
    for edge in edges {
        match edge_states
            .get(&edge.edge_id)
            .copied()
            .unwrap_or(EdgeRunState::Unresolved)
        {
            EdgeRunState::Unresolved => return Readiness::Wait,
            EdgeRunState::Active => any_active = true,
            EdgeRunState::Inactive => {}
        }
    }
    if any_active {
        Readiness::Ready
    } else {
        Readiness::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainNode, ChainStatus};
    use serde_json::json;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn chain(nodes: Vec<(&str, NodeType)>, edges: Vec<(&str, &str, &str)>) -> ChainDefinition {
        let chain_id = Uuid::new_v4();
        ChainDefinition {
            id: chain_id,
            name: "g".into(),
            status: ChainStatus::Active,
            version: 1,
            category: None,
            tags: vec![],
            input_schema: None,
            output_schema: None,
            metadata: BTreeMap::new(),
            nodes: nodes
                .into_iter()
                .map(|(id, ty)| ChainNode {
                    id: Uuid::new_v4(),
                    chain_id,
                    node_id: id.into(),
                    node_type: ty,
                    agent_id: None,
                    label: None,
                    position: None,
                    config: json!({}),
                    order_index: 0,
                })
                .collect(),
            edges: edges
                .into_iter()
                .map(|(id, from, to)| ChainEdge {
                    id: Uuid::new_v4(),
                    chain_id,
                    edge_id: id.into(),
                    source_node_id: from.into(),
                    target_node_id: to.into(),
                    condition: None,
                    label: None,
                    metadata: BTreeMap::new(),
                })
                .collect(),
            execution_count: 0,
            last_executed_at: None,
        }
    }

    #[test]
    fn seed_includes_zero_incoming_and_start_once() {
        let c = chain(
            vec![
                ("start", NodeType::Start),
                ("orphan_root", NodeType::Agent),
                ("mid", NodeType::Agent),
            ],
            vec![("e1", "start", "mid"), ("e2", "orphan_root", "mid")],
        );
        let incoming = build_incoming(&c);
        assert_eq!(seed_ready(&c, &incoming), vec!["start", "orphan_root"]);
    }

    #[test]
    fn start_with_incoming_edge_still_seeds() {
        let c = chain(
            vec![("a", NodeType::Agent), ("start", NodeType::Start)],
            vec![("e1", "a", "start")],
        );
        let incoming = build_incoming(&c);
        assert_eq!(seed_ready(&c, &incoming), vec!["a", "start"]);
    }

    #[test]
    fn readiness_transitions() {
        let c = chain(
            vec![
                ("a", NodeType::Agent),
                ("b", NodeType::Agent),
                ("join", NodeType::ParallelJoin),
            ],
            vec![("e1", "a", "join"), ("e2", "b", "join")],
        );
        let incoming = build_incoming(&c);
        let mut edge_states: HashMap<String, EdgeRunState> = HashMap::new();

        assert_eq!(readiness("join", &incoming, &edge_states), Readiness::Wait);

        edge_states.insert("e1".into(), EdgeRunState::Active);
        assert_eq!(readiness("join", &incoming, &edge_states), Readiness::Wait);

        edge_states.insert("e2".into(), EdgeRunState::Inactive);
        assert_eq!(readiness("join", &incoming, &edge_states), Readiness::Ready);

        edge_states.insert("e1".into(), EdgeRunState::Inactive);
        assert_eq!(readiness("join", &incoming, &edge_states), Readiness::Skip);
    }

    #[test]
    fn node_without_incoming_edges_is_ready() {
        let c = chain(vec![("lone", NodeType::Agent)], vec![]);
        let incoming = build_incoming(&c);
        assert_eq!(
            readiness("lone", &incoming, &HashMap::new()),
            Readiness::Ready
        );
    }
}
