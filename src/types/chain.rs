//! Chain definition types — the contract between the authoring layer and
//! the engine.
//!
//! **Invariant**: `metadata` and other map fields use `BTreeMap`, never
//! `HashMap`, so serialized definitions have deterministic key ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle status of a chain definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChainStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// The complete definition of a chain: a directed graph of typed nodes and
/// conditional edges, reused across many executions.
///
/// The graph must be acyclic; that invariant is enforced by
/// [`validate_chain`](crate::validate::validate_chain) at validation time,
/// not at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub status: ChainStatus,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Arbitrary metadata. BTreeMap for deterministic serialization.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub nodes: Vec<ChainNode>,
    pub edges: Vec<ChainEdge>,
    /// Monotonic counter, incremented once per run start.
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    1
}

/// The seven node types the dispatcher understands.
///
/// Stored in their SCREAMING_SNAKE_CASE wire form for compatibility with
/// persisted definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum NodeType {
    Agent,
    Condition,
    Aggregator,
    ParallelSplit,
    ParallelJoin,
    Start,
    End,
}

impl NodeType {
    /// True for node types that forward their resolved input unchanged.
    pub fn is_passthrough(self) -> bool {
        matches!(
            self,
            Self::Start | Self::End | Self::ParallelSplit | Self::ParallelJoin | Self::Condition
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Agent => "AGENT",
            Self::Condition => "CONDITION",
            Self::Aggregator => "AGGREGATOR",
            Self::ParallelSplit => "PARALLEL_SPLIT",
            Self::ParallelJoin => "PARALLEL_JOIN",
            Self::Start => "START",
            Self::End => "END",
        };
        write!(f, "{s}")
    }
}

/// A typed step within a chain.
///
/// `node_id` is the human-assigned identifier edges refer to; it must be
/// unique within the chain (validator-enforced, not storage-enforced).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainNode {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub node_id: String,
    pub node_type: NodeType,
    /// Required when `node_type` is [`NodeType::Agent`]; must resolve
    /// through the agent directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Canvas coordinates — presentation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
    /// Node-specific configuration. Recognized keys: `input_map`,
    /// `aggregation_type`, `output_schema`.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Display/tie-break hint only — never authoritative for execution
    /// order.
    #[serde(default)]
    pub order_index: i32,
}

/// A directed, optionally conditional link between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainEdge {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub edge_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    /// Condition specification evaluated against the source node's output.
    /// See [`crate::condition`] for the accepted shapes. Absent means the
    /// edge is unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Agent directory view
// ---------------------------------------------------------------------------

/// Lifecycle status of an agent as reported by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AgentStatus {
    Active,
    Inactive,
    Archived,
}

/// Read-only view of an agent, as resolved through
/// [`AgentDirectory`](crate::traits::AgentDirectory).
///
/// When `config` carries `"structured_protocol": true`, the agent node
/// extracts a JSON object from the agent's textual content after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl AgentRecord {
    /// Whether this agent follows the structured-response protocol.
    pub fn structured_protocol(&self) -> bool {
        self.config
            .get("structured_protocol")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
