//! In-memory default implementations of the collaborator traits.
//!
//! Suitable for embedding, demos, and tests. Production deployments
//! supply their own database-backed implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::{DirectoryError, LogSinkError, StoreError};
use crate::traits::{AgentDirectory, ChainStore, ExecutionStore, LogSink};
use crate::types::{AgentRecord, ChainDefinition, ChainExecution, ExecutionLogEntry};

/// Chain definitions held in a map.
#[derive(Default)]
pub struct InMemoryChainStore {
    chains: RwLock<HashMap<Uuid, ChainDefinition>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainStore for InMemoryChainStore {
    async fn get(&self, chain_id: Uuid) -> Result<Option<ChainDefinition>, StoreError> {
        Ok(self.chains.read().get(&chain_id).cloned())
    }

    async fn put(&self, chain: ChainDefinition) -> Result<(), StoreError> {
        self.chains.write().insert(chain.id, chain);
        Ok(())
    }
}

/// Execution records held in a map; every `put` replaces the whole
/// record, which is exactly the checkpoint contract.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<Uuid, ChainExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get(&self, execution_id: Uuid) -> Result<Option<ChainExecution>, StoreError> {
        Ok(self.executions.read().get(&execution_id).cloned())
    }

    async fn put(&self, execution: ChainExecution) -> Result<(), StoreError> {
        self.executions.write().insert(execution.id, execution);
        Ok(())
    }
}

/// Append-only log buffer.
#[derive(Default)]
pub struct InMemoryLogSink {
    entries: RwLock<Vec<ExecutionLogEntry>>,
}

impl InMemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogSink for InMemoryLogSink {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<(), LogSinkError> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn entries(&self, execution_id: Uuid) -> Result<Vec<ExecutionLogEntry>, LogSinkError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

/// Fixed agent catalog, keyed by agent id.
#[derive(Default)]
pub struct StaticAgentDirectory {
    agents: HashMap<String, AgentRecord>,
}

impl StaticAgentDirectory {
    pub fn new(agents: Vec<AgentRecord>) -> Self {
        Self {
            agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>, DirectoryError> {
        Ok(self.agents.get(agent_id).cloned())
    }
}
