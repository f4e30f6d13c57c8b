//! Domain-level execution logging.
//!
//! Emits append-only [`ExecutionLogEntry`] records through the
//! [`LogSink`] collaborator at the scheduler's checkpoints. Sink
//! failures are reported via `tracing` and never abort the run.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::traits::LogSink;
use crate::types::{ExecutionLogEntry, LogLevel};

/// Per-execution handle over the shared log sink.
#[derive(Clone)]
pub struct ExecutionLogger {
    sink: Arc<dyn LogSink>,
    execution_id: Uuid,
}

impl ExecutionLogger {
    pub fn new(sink: Arc<dyn LogSink>, execution_id: Uuid) -> Self {
        Self { sink, execution_id }
    }

    pub async fn execution_started(&self, chain_id: Uuid) {
        self.emit(
            None,
            "execution_started",
            format!("Execution started for chain {chain_id}"),
            LogLevel::Info,
            json!({"chain_id": chain_id}),
        )
        .await;
    }

    pub async fn execution_completed(&self, duration_seconds: f64) {
        self.emit(
            None,
            "execution_completed",
            "Execution completed".to_string(),
            LogLevel::Info,
            json!({"duration_seconds": duration_seconds}),
        )
        .await;
    }

    pub async fn execution_failed(&self, message: &str, kind: &str) {
        self.emit(
            None,
            "execution_failed",
            format!("Execution failed: {message}"),
            LogLevel::Error,
            json!({"kind": kind}),
        )
        .await;
    }

    pub async fn execution_cancelled(&self) {
        self.emit(
            None,
            "execution_cancelled",
            "Execution cancelled by request".to_string(),
            LogLevel::Warning,
            json!({}),
        )
        .await;
    }

    pub async fn node_started(&self, node_id: &str) {
        self.emit(
            Some(node_id),
            "node_started",
            format!("Node {node_id} started"),
            LogLevel::Info,
            json!({}),
        )
        .await;
    }

    pub async fn node_completed(&self, node_id: &str) {
        self.emit(
            Some(node_id),
            "node_completed",
            format!("Node {node_id} completed"),
            LogLevel::Info,
            json!({}),
        )
        .await;
    }

    pub async fn node_failed(&self, node_id: &str, message: &str) {
        self.emit(
            Some(node_id),
            "node_failed",
            format!("Node {node_id} failed: {message}"),
            LogLevel::Error,
            json!({}),
        )
        .await;
    }

    pub async fn node_skipped(&self, node_id: &str) {
        self.emit(
            Some(node_id),
            "node_skipped",
            format!("Node {node_id} skipped (no active incoming edge)"),
            LogLevel::Info,
            json!({}),
        )
        .await;
    }

    async fn emit(
        &self,
        node_id: Option<&str>,
        event_type: &str,
        message: String,
        level: LogLevel,
        metadata: Value,
    ) {
        let entry = ExecutionLogEntry {
            execution_id: self.execution_id,
            node_id: node_id.map(Into::into),
            event_type: event_type.to_string(),
            message,
            level,
            timestamp: Utc::now(),
            metadata,
        };
        if let Err(err) = self.sink.append(entry).await {
            tracing::warn!(execution_id = %self.execution_id, %err, "log sink append failed");
        }
    }
}
