//! Engine builder — assembles the collaborators into a [`ChainEngine`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::ChainEngine;
use crate::defaults::{
    InMemoryChainStore, InMemoryExecutionStore, InMemoryLogSink, StaticAgentDirectory,
};
use crate::errors::AgentError;
use crate::traits::{AgentDirectory, AgentExecutor, ChainStore, ExecutionStore, LogSink};
use crate::types::AgentRunResult;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock deadline covering a whole run.
    pub execution_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(600),
        }
    }
}

/// Builder for assembling a [`ChainEngine`].
///
/// All fields are optional — in-memory defaults are applied during
/// [`build()`](ChainEngineBuilder::build). An engine built without an
/// [`AgentExecutor`] fails any AGENT node at dispatch time.
pub struct ChainEngineBuilder {
    chains: Option<Arc<dyn ChainStore>>,
    executions: Option<Arc<dyn ExecutionStore>>,
    logs: Option<Arc<dyn LogSink>>,
    directory: Option<Arc<dyn AgentDirectory>>,
    agents: Option<Arc<dyn AgentExecutor>>,
    config: EngineConfig,
}

impl ChainEngineBuilder {
    pub(super) fn new() -> Self {
        Self {
            chains: None,
            executions: None,
            logs: None,
            directory: None,
            agents: None,
            config: EngineConfig::default(),
        }
    }

    pub fn chain_store(mut self, store: impl ChainStore + 'static) -> Self {
        self.chains = Some(Arc::new(store));
        self
    }

    pub fn execution_store(mut self, store: impl ExecutionStore + 'static) -> Self {
        self.executions = Some(Arc::new(store));
        self
    }

    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.logs = Some(Arc::new(sink));
        self
    }

    pub fn agent_directory(mut self, directory: impl AgentDirectory + 'static) -> Self {
        self.directory = Some(Arc::new(directory));
        self
    }

    pub fn agent_executor(mut self, executor: impl AgentExecutor + 'static) -> Self {
        self.agents = Some(Arc::new(executor));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ChainEngine {
        ChainEngine {
            chains: self
                .chains
                .unwrap_or_else(|| Arc::new(InMemoryChainStore::new())),
            executions: self
                .executions
                .unwrap_or_else(|| Arc::new(InMemoryExecutionStore::new())),
            logs: self.logs.unwrap_or_else(|| Arc::new(InMemoryLogSink::new())),
            directory: self
                .directory
                .unwrap_or_else(|| Arc::new(StaticAgentDirectory::new(Vec::new()))),
            agents: self
                .agents
                .unwrap_or_else(|| Arc::new(UnconfiguredAgentExecutor)),
            config: self.config,
            active: Arc::new(parking_lot::Mutex::new(std::collections::HashMap::new())),
        }
    }
}

/// Placeholder executor for engines that never run AGENT nodes.
struct UnconfiguredAgentExecutor;

#[async_trait]
impl AgentExecutor for UnconfiguredAgentExecutor {
    async fn execute(
        &self,
        agent_id: &str,
        _input: Value,
        _config: &Value,
    ) -> Result<AgentRunResult, AgentError> {
        Err(AgentError::Backend(format!(
            "no agent executor configured (agent {agent_id})"
        )))
    }
}
