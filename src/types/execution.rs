//! Execution records — one per chain run, persisted through
//! [`ExecutionStore`](crate::traits::ExecutionStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle status of a chain execution.
///
/// Terminal states (`Completed`, `Failed`, `Cancelled`) are never left
/// once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Per-node result captured when a node finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NodeResult {
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

/// A single run of a chain, with full per-node traceability.
///
/// `node_results` / `completed_nodes` / `edge_results` grow monotonically
/// while the run is in flight; the scheduler checkpoints the whole record
/// after every node completion so mid-run progress is inspectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainExecution {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub status: ExecutionStatus,
    pub input_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,
    /// Run-scoped variables, e.g. `_model_override`.
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Keyed by `node_id`.
    #[serde(default)]
    pub node_results: BTreeMap<String, NodeResult>,
    /// Completion order, append-only.
    #[serde(default)]
    pub completed_nodes: Vec<String>,
    /// Most recently launched node, best effort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    /// Edge ids whose condition evaluated true.
    #[serde(default)]
    pub active_edges: Vec<String>,
    /// Every evaluated edge id, true or false.
    #[serde(default)]
    pub edge_results: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ChainExecution {
    /// Create a fresh record in `Running` state, stamped with the current
    /// time.
    pub fn new(
        chain_id: Uuid,
        input_data: serde_json::Value,
        variables: BTreeMap<String, serde_json::Value>,
        triggered_by: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chain_id,
            status: ExecutionStatus::Running,
            input_data,
            output_data: None,
            variables,
            node_results: BTreeMap::new(),
            completed_nodes: Vec::new(),
            current_node_id: None,
            active_edges: Vec::new(),
            edge_results: BTreeMap::new(),
            error_message: None,
            error_details: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
            triggered_by,
            correlation_id,
        }
    }

    /// Stamp `completed_at` and derive `duration_seconds` from
    /// `started_at`. Call once, when entering a terminal state.
    pub fn stamp_completion(&mut self) {
        let now = Utc::now();
        self.duration_seconds =
            Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.completed_at = Some(now);
    }
}

/// Scheduler-internal state of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Scheduler-internal state of an edge within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRunState {
    Unresolved,
    Active,
    Inactive,
}

// ---------------------------------------------------------------------------
// Agent dispatch results
// ---------------------------------------------------------------------------

/// Outcome reported by an [`AgentExecutor`](crate::traits::AgentExecutor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AgentRunStatus {
    Success,
    Failed,
}

/// Result of delegating one node's input to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentRunResult {
    pub status: AgentRunStatus,
    #[serde(default)]
    pub output_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Execution log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One append-only log line attached to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionLogEntry {
    pub execution_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub event_type: String,
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
    }

    #[test]
    fn new_execution_starts_running() {
        let exec = ChainExecution::new(
            Uuid::new_v4(),
            json!({"q": "hello"}),
            BTreeMap::new(),
            Some("tests".into()),
            None,
        );
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(exec.output_data.is_none());
        assert!(exec.completed_nodes.is_empty());
        assert_eq!(exec.triggered_by.as_deref(), Some("tests"));
    }

    #[test]
    fn stamp_completion_computes_duration() {
        let mut exec = ChainExecution::new(
            Uuid::new_v4(),
            json!({}),
            BTreeMap::new(),
            None,
            None,
        );
        exec.started_at = Utc::now() - chrono::Duration::milliseconds(1500);
        exec.stamp_completion();
        let secs = exec.duration_seconds.unwrap();
        assert!(secs >= 1.5 && secs < 2.5, "duration was {secs}");
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn agent_run_result_wire_form() {
        let raw = json!({
            "status": "FAILED",
            "output_data": {},
            "error_message": "boom"
        });
        let res: AgentRunResult = serde_json::from_value(raw).unwrap();
        assert_eq!(res.status, AgentRunStatus::Failed);
        assert_eq!(res.error_message.as_deref(), Some("boom"));
    }
}
