//! Pluggable collaborator traits.
//!
//! The engine owns orchestration only; everything with an opinion about
//! storage, agent runtimes, or log transport sits behind one of these
//! traits. In-memory implementations suitable for embedding and tests
//! live in [`crate::defaults`].

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{AgentError, DirectoryError, LogSinkError, StoreError};
use crate::types::{AgentRecord, AgentRunResult, ChainDefinition, ChainExecution, ExecutionLogEntry};

/// Runs one agent invocation on behalf of an AGENT node.
///
/// Implementations decide what an "agent" is — an LLM call, a subprocess,
/// an HTTP service. The engine only cares that delegation produces an
/// [`AgentRunResult`]. Return `Err` for transport failures only; an agent
/// that ran and failed reports `AgentRunStatus::Failed` in the result.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        agent_id: &str,
        input: Value,
        config: &Value,
    ) -> Result<AgentRunResult, AgentError>;
}

/// Resolves agent ids to directory records.
///
/// Used by the validator (existence checks) and the agent node
/// (structured-protocol flag). `Ok(None)` means the agent does not exist.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>, DirectoryError>;
}

/// Read/write access to chain definitions.
#[async_trait]
pub trait ChainStore: Send + Sync {
    async fn get(&self, chain_id: Uuid) -> Result<Option<ChainDefinition>, StoreError>;

    /// Insert or replace the whole definition.
    async fn put(&self, chain: ChainDefinition) -> Result<(), StoreError>;
}

/// Read/write access to execution records.
///
/// `put` is called once at creation and then as a checkpoint after every
/// node completion, so implementations should treat it as an upsert of
/// the whole record.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn get(&self, execution_id: Uuid) -> Result<Option<ChainExecution>, StoreError>;

    async fn put(&self, execution: ChainExecution) -> Result<(), StoreError>;
}

/// Append-only destination for execution log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<(), LogSinkError>;

    async fn entries(&self, execution_id: Uuid) -> Result<Vec<ExecutionLogEntry>, LogSinkError>;
}
