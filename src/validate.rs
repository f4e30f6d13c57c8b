//! Structural validation of chain definitions.
//!
//! All problems are collected into one report rather than failing on the
//! first: callers display the whole list. Warnings never block execution;
//! `is_valid` depends on errors alone.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::DirectoryError;
use crate::traits::AgentDirectory;
use crate::types::{AgentStatus, ChainDefinition, NodeType};

/// Outcome of validating one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Validate a chain definition for structural correctness.
///
/// Checks, in order: non-empty node set (short-circuits), unique
/// node/edge ids, edge endpoint resolution, cycle detection, agent
/// references, disconnected nodes, start/end presence. The only `Err`
/// path is a directory backend failure; validation findings always come
/// back as a report.
pub async fn validate_chain(
    chain: &ChainDefinition,
    agents: &dyn AgentDirectory,
) -> Result<ValidationReport, DirectoryError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut details: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    details.insert("node_count".into(), json!(chain.nodes.len()));
    details.insert("edge_count".into(), json!(chain.edges.len()));

    // (a) A chain with no nodes has nothing else worth checking.
    if chain.nodes.is_empty() {
        errors.push("Chain has no nodes".to_string());
        return Ok(ValidationReport {
            is_valid: false,
            errors,
            warnings,
            details,
        });
    }

    // Unique node ids.
    let mut seen_ids = HashSet::new();
    for node in &chain.nodes {
        if !seen_ids.insert(node.node_id.as_str()) {
            errors.push(format!("Duplicate node ID: {}", node.node_id));
        }
    }

    // Unique edge ids.
    let mut seen_edge_ids = HashSet::new();
    for edge in &chain.edges {
        if !seen_edge_ids.insert(edge.edge_id.as_str()) {
            errors.push(format!("Duplicate edge ID: {}", edge.edge_id));
        }
    }

    // (b) Edge endpoints resolve to known node ids.
    let node_ids: HashSet<&str> = chain.nodes.iter().map(|n| n.node_id.as_str()).collect();
    for edge in &chain.edges {
        if !node_ids.contains(edge.source_node_id.as_str()) {
            errors.push(format!(
                "Edge {} references unknown source node: {}",
                edge.edge_id, edge.source_node_id
            ));
        }
        if !node_ids.contains(edge.target_node_id.as_str()) {
            errors.push(format!(
                "Edge {} references unknown target node: {}",
                edge.edge_id, edge.target_node_id
            ));
        }
    }

    // (c) Cycle detection, recording the offending path.
    if let Some(cycle) = find_cycle(chain) {
        errors.push(format!("Cycle detected: {}", cycle.join(" -> ")));
        details.insert("cycle_detected".into(), json!(true));
        details.insert("cycle_path".into(), json!(cycle));
    }

    // (d) Agent references resolve; inactive agents warn only.
    for node in &chain.nodes {
        if node.node_type != NodeType::Agent {
            continue;
        }
        let Some(agent_id) = node.agent_id.as_deref() else {
            errors.push(format!("Agent node {} has no agent_id", node.node_id));
            continue;
        };
        match agents.get(agent_id).await? {
            None => errors.push(format!(
                "Agent node {} references unknown agent: {agent_id}",
                node.node_id
            )),
            Some(agent) if agent.status != AgentStatus::Active => warnings.push(format!(
                "Agent node {} references non-active agent: {agent_id}",
                node.node_id
            )),
            Some(_) => {}
        }
    }

    // (e) Disconnected nodes (a lone START is allowed).
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &chain.edges {
        *degree.entry(edge.source_node_id.as_str()).or_default() += 1;
        *degree.entry(edge.target_node_id.as_str()).or_default() += 1;
    }
    for node in &chain.nodes {
        let connected = degree.get(node.node_id.as_str()).copied().unwrap_or(0) > 0;
        if !connected && !(node.node_type == NodeType::Start && chain.nodes.len() == 1) {
            warnings.push(format!("Node {} is not connected to any edge", node.node_id));
        }
    }

    // (f) Start/end presence. Permissive: warnings only.
    let start_count = chain
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .count();
    let end_count = chain
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::End)
        .count();
    if start_count == 0 && chain.nodes.len() > 1 {
        warnings.push("Chain has no START node".to_string());
    }
    if start_count > 1 {
        warnings.push(format!("Chain has {start_count} START nodes"));
    }
    if end_count == 0 {
        warnings.push("Chain has no END node".to_string());
    }

    Ok(ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        details,
    })
}

/// DFS with an explicit stack, so graph depth never translates into call
/// depth. Returns the first cycle found as a node_id path, closing back on
/// the revisited node.
fn find_cycle(chain: &ChainDefinition) -> Option<Vec<String>> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &chain.edges {
        outgoing
            .entry(edge.source_node_id.as_str())
            .or_default()
            .push(edge.target_node_id.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut in_stack: HashSet<&str> = HashSet::new();
    // Each frame is a node plus the index of its next unexplored successor.
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for root in &chain.nodes {
        let root = root.node_id.as_str();
        if visited.contains(root) {
            continue;
        }
        visited.insert(root);
        in_stack.insert(root);
        stack.push((root, 0));

        while let Some(&(node, next_idx)) = stack.last() {
            let successors = outgoing.get(node).map(Vec::as_slice).unwrap_or_default();
            let Some(&next) = successors.get(next_idx) else {
                in_stack.remove(node);
                stack.pop();
                continue;
            };
            if let Some((_, idx)) = stack.last_mut() {
                *idx += 1;
            }

            if in_stack.contains(next) {
                let from = stack
                    .iter()
                    .position(|&(n, _)| n == next)
                    .unwrap_or(0);
                let mut cycle: Vec<String> =
                    stack[from..].iter().map(|&(n, _)| n.to_string()).collect();
                cycle.push(next.to_string());
                return Some(cycle);
            }
            if visited.insert(next) {
                in_stack.insert(next);
                stack.push((next, 0));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticAgentDirectory;
    use crate::types::{AgentRecord, ChainEdge, ChainNode, ChainStatus};
    use serde_json::json;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn chain(nodes: Vec<(&str, NodeType, Option<&str>)>, edges: Vec<(&str, &str, &str)>) -> ChainDefinition {
        let chain_id = Uuid::new_v4();
        ChainDefinition {
            id: chain_id,
            name: "test".into(),
            status: ChainStatus::Active,
            version: 1,
            category: None,
            tags: vec![],
            input_schema: None,
            output_schema: None,
            metadata: BTreeMap::new(),
            nodes: nodes
                .into_iter()
                .map(|(id, ty, agent)| ChainNode {
                    id: Uuid::new_v4(),
                    chain_id,
                    node_id: id.into(),
                    node_type: ty,
                    agent_id: agent.map(Into::into),
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

    fn directory() -> StaticAgentDirectory {
        StaticAgentDirectory::new(vec![
            AgentRecord {
                id: "researcher".into(),
                name: "Researcher".into(),
                status: crate::types::AgentStatus::Active,
                config: json!({}),
            },
            AgentRecord {
                id: "dormant".into(),
                name: "Dormant".into(),
                status: crate::types::AgentStatus::Inactive,
                config: json!({}),
            },
        ])
    }

    #[tokio::test]
    async fn empty_chain_short_circuits() {
        let c = chain(vec![], vec![]);
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["Chain has no nodes"]);
        assert_eq!(report.details["node_count"], json!(0));
    }

    #[tokio::test]
    async fn valid_linear_chain() {
        let c = chain(
            vec![
                ("start", NodeType::Start, None),
                ("a", NodeType::Agent, Some("researcher")),
                ("end", NodeType::End, None),
            ],
            vec![("e1", "start", "a"), ("e2", "a", "end")],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(report.is_valid, "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
        assert_eq!(report.details["edge_count"], json!(2));
    }

    #[tokio::test]
    async fn dangling_edge_reported_per_edge() {
        let c = chain(
            vec![("start", NodeType::Start, None), ("end", NodeType::End, None)],
            vec![("e1", "start", "ghost"), ("e2", "phantom", "end")],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("e1") && e.contains("ghost")));
        assert!(report.errors.iter().any(|e| e.contains("e2") && e.contains("phantom")));
    }

    #[tokio::test]
    async fn cycle_detected_with_path() {
        let c = chain(
            vec![
                ("a", NodeType::Agent, Some("researcher")),
                ("b", NodeType::Agent, Some("researcher")),
            ],
            vec![("e1", "a", "b"), ("e2", "b", "a")],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("Cycle detected")));
        assert_eq!(report.details["cycle_detected"], json!(true));
        let path = report.details["cycle_path"].as_array().unwrap();
        assert_eq!(path.first(), path.last());
        assert!(path.len() >= 3);
    }

    #[tokio::test]
    async fn cycle_found_in_deep_chain() {
        // a long spine with one back edge at the far end
        let ids: Vec<String> = (0..5000).map(|i| format!("n{i}")).collect();
        let edge_ids: Vec<String> = (0..4999).map(|i| format!("e{i}")).collect();
        let nodes: Vec<(&str, NodeType, Option<&str>)> = ids
            .iter()
            .map(|id| (id.as_str(), NodeType::Aggregator, None))
            .collect();
        let mut edges: Vec<(&str, &str, &str)> = ids
            .windows(2)
            .zip(&edge_ids)
            .map(|(pair, eid)| (eid.as_str(), pair[0].as_str(), pair[1].as_str()))
            .collect();
        edges.push(("back", ids[4999].as_str(), ids[0].as_str()));

        let report = validate_chain(&chain(nodes, edges), &directory()).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.details["cycle_detected"], json!(true));
        let path = report.details["cycle_path"].as_array().unwrap();
        assert_eq!(path.len(), 5001);
        assert_eq!(path.first(), path.last());
    }

    #[tokio::test]
    async fn agent_checks() {
        let c = chain(
            vec![
                ("no_ref", NodeType::Agent, None),
                ("missing", NodeType::Agent, Some("nobody")),
                ("inactive", NodeType::Agent, Some("dormant")),
            ],
            vec![
                ("e1", "no_ref", "missing"),
                ("e2", "missing", "inactive"),
            ],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(report.errors.iter().any(|e| e.contains("no_ref") && e.contains("no agent_id")));
        assert!(report.errors.iter().any(|e| e.contains("unknown agent: nobody")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("non-active agent: dormant")));
    }

    #[tokio::test]
    async fn duplicate_ids_are_errors() {
        let c = chain(
            vec![
                ("a", NodeType::Start, None),
                ("a", NodeType::End, None),
            ],
            vec![("e1", "a", "a"), ("e1", "a", "a")],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(report.errors.iter().any(|e| e.contains("Duplicate node ID: a")));
        assert!(report.errors.iter().any(|e| e.contains("Duplicate edge ID: e1")));
    }

    #[tokio::test]
    async fn disconnected_node_warns() {
        let c = chain(
            vec![
                ("start", NodeType::Start, None),
                ("end", NodeType::End, None),
                ("island", NodeType::Aggregator, None),
            ],
            vec![("e1", "start", "end")],
        );
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("island")));
    }

    #[tokio::test]
    async fn start_end_presence_warnings() {
        let none = chain(
            vec![
                ("a", NodeType::Agent, Some("researcher")),
                ("b", NodeType::Agent, Some("researcher")),
            ],
            vec![("e1", "a", "b")],
        );
        let report = validate_chain(&none, &directory()).await.unwrap();
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("no START node")));
        assert!(report.warnings.iter().any(|w| w.contains("no END node")));

        let two_starts = chain(
            vec![
                ("s1", NodeType::Start, None),
                ("s2", NodeType::Start, None),
                ("end", NodeType::End, None),
            ],
            vec![("e1", "s1", "end"), ("e2", "s2", "end")],
        );
        let report = validate_chain(&two_starts, &directory()).await.unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("2 START nodes")));
    }

    #[tokio::test]
    async fn single_start_node_alone_is_clean() {
        let c = chain(vec![("start", NodeType::Start, None)], vec![]);
        let report = validate_chain(&c, &directory()).await.unwrap();
        assert!(report.is_valid);
        assert!(!report.warnings.iter().any(|w| w.contains("not connected")));
    }
}
