//! Engine — the single entry point for chain orchestration.
//!
//! [`ChainEngine`] assembles the collaborators (stores, agent directory,
//! agent executor, log sink) and exposes the caller-facing operations:
//! validate, create, run, cancel, inspect. Construct via
//! [`ChainEngine::builder()`].
//!
//! ```rust,ignore
//! let engine = ChainEngine::builder()
//!     .chain_store(my_store)
//!     .agent_directory(my_directory)
//!     .agent_executor(my_runtime)
//!     .build();
//!
//! let execution = engine
//!     .create_execution(chain_id, json!({"q": "hi"}), BTreeMap::new(), None, None)
//!     .await?;
//! let finished = engine.run(execution.id).await?;
//! ```

mod builder;
pub mod error;

pub use builder::{ChainEngineBuilder, EngineConfig};
pub use error::ChainError;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::logging::ExecutionLogger;
use crate::nodes::DispatchCtx;
use crate::scheduler::{run_chain, RunContext, RunOutcome};
use crate::traits::{AgentDirectory, AgentExecutor, ChainStore, ExecutionStore, LogSink};
use crate::types::{ChainExecution, ExecutionLogEntry, ExecutionStatus};
use crate::validate::{validate_chain, ValidationReport};

/// The assembled orchestration engine.
///
/// `Clone`-friendly — all internals are `Arc`-wrapped.
#[derive(Clone)]
pub struct ChainEngine {
    pub(super) chains: Arc<dyn ChainStore>,
    pub(super) executions: Arc<dyn ExecutionStore>,
    pub(super) logs: Arc<dyn LogSink>,
    pub(super) directory: Arc<dyn AgentDirectory>,
    pub(super) agents: Arc<dyn AgentExecutor>,
    pub(super) config: EngineConfig,
    /// Cancellation flags for in-flight runs.
    pub(super) active: Arc<parking_lot::Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl ChainEngine {
    /// Create a new [`ChainEngineBuilder`].
    pub fn builder() -> ChainEngineBuilder {
        ChainEngineBuilder::new()
    }

    /// Validate a stored chain without executing it.
    pub async fn validate(&self, chain_id: Uuid) -> Result<ValidationReport, ChainError> {
        let chain = self
            .chains
            .get(chain_id)
            .await?
            .ok_or(ChainError::ChainNotFound(chain_id))?;
        Ok(validate_chain(&chain, self.directory.as_ref()).await?)
    }

    /// Validate the chain and create a RUNNING execution record.
    ///
    /// Bumps the chain's `execution_count` and `last_executed_at`. An
    /// invalid chain raises [`ChainError::Validation`] and no record is
    /// created.
    pub async fn create_execution(
        &self,
        chain_id: Uuid,
        input_data: Value,
        variables: BTreeMap<String, Value>,
        triggered_by: Option<String>,
        correlation_id: Option<String>,
    ) -> Result<ChainExecution, ChainError> {
        let mut chain = self
            .chains
            .get(chain_id)
            .await?
            .ok_or(ChainError::ChainNotFound(chain_id))?;

        let report = validate_chain(&chain, self.directory.as_ref()).await?;
        if !report.is_valid {
            return Err(ChainError::Validation {
                errors: report.errors,
            });
        }

        chain.execution_count += 1;
        chain.last_executed_at = Some(Utc::now());
        self.chains.put(chain).await?;

        let execution =
            ChainExecution::new(chain_id, input_data, variables, triggered_by, correlation_id);
        self.executions.put(execution.clone()).await?;
        Ok(execution)
    }

    /// Drive an execution to a terminal state and return the final
    /// record.
    ///
    /// At most one `run` may drive a given execution: concurrent callers
    /// for the same id get [`ChainError::AlreadyRunning`] instead of a
    /// second scheduler loop over the same record.
    pub async fn run(&self, execution_id: Uuid) -> Result<ChainExecution, ChainError> {
        // Reserve the run slot before touching the record.
        let cancel_flag = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.active.lock();
            if active.contains_key(&execution_id) {
                return Err(ChainError::AlreadyRunning(execution_id));
            }
            active.insert(execution_id, cancel_flag.clone());
        }

        let result = self.run_reserved(execution_id, cancel_flag).await;
        self.active.lock().remove(&execution_id);
        result
    }

    async fn run_reserved(
        &self,
        execution_id: Uuid,
        cancel_flag: Arc<AtomicBool>,
    ) -> Result<ChainExecution, ChainError> {
        let execution = self
            .executions
            .get(execution_id)
            .await?
            .ok_or(ChainError::ExecutionNotFound(execution_id))?;
        if execution.status != ExecutionStatus::Running {
            return Err(ChainError::NotRunning {
                id: execution_id,
                status: execution.status,
            });
        }
        let chain = self
            .chains
            .get(execution.chain_id)
            .await?
            .ok_or(ChainError::ChainNotFound(execution.chain_id))?;

        let logger = ExecutionLogger::new(self.logs.clone(), execution_id);
        logger.execution_started(chain.id).await;

        let ctx = RunContext {
            dispatch: DispatchCtx {
                agents: self.agents.clone(),
                directory: self.directory.clone(),
                variables: execution.variables.clone(),
            },
            chain,
            execution,
            executions: self.executions.clone(),
            logger: logger.clone(),
            cancel_flag,
        };

        let timeout = self.config.execution_timeout;
        let result = tokio::time::timeout(timeout, run_chain(ctx)).await;

        match result {
            Ok((mut exec, RunOutcome::Completed { output })) => {
                exec.status = ExecutionStatus::Completed;
                exec.output_data = Some(output);
                exec.current_node_id = None;
                exec.stamp_completion();
                logger
                    .execution_completed(exec.duration_seconds.unwrap_or_default())
                    .await;
                self.executions.put(exec.clone()).await?;
                Ok(exec)
            }
            Ok((mut exec, RunOutcome::Failed { message, kind, details })) => {
                exec.status = ExecutionStatus::Failed;
                exec.error_message = Some(message.clone());
                exec.error_details = Some(json!({"kind": kind, "details": details}));
                exec.stamp_completion();
                logger.execution_failed(&message, &kind).await;
                self.executions.put(exec.clone()).await?;
                Ok(exec)
            }
            Ok((mut exec, RunOutcome::Cancelled)) => {
                // cancel() already stamped and persisted the record;
                // prefer its version if it made it to the store.
                match self.executions.get(execution_id).await? {
                    Some(stored) if stored.status.is_terminal() => Ok(stored),
                    _ => {
                        exec.status = ExecutionStatus::Cancelled;
                        exec.stamp_completion();
                        self.executions.put(exec.clone()).await?;
                        Ok(exec)
                    }
                }
            }
            Err(_) => {
                let message = format!("execution timed out after {timeout:?}");
                let mut exec = self
                    .executions
                    .get(execution_id)
                    .await?
                    .ok_or(ChainError::ExecutionNotFound(execution_id))?;
                exec.status = ExecutionStatus::Failed;
                exec.error_message = Some(message.clone());
                exec.error_details = Some(json!({"kind": "timeout"}));
                exec.stamp_completion();
                logger.execution_failed(&message, "timeout").await;
                self.executions.put(exec.clone()).await?;
                Ok(exec)
            }
        }
    }

    /// Fire-and-forget variant of [`run`](Self::run).
    pub fn run_detached(
        &self,
        execution_id: Uuid,
    ) -> tokio::task::JoinHandle<Result<ChainExecution, ChainError>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run(execution_id).await })
    }

    /// Request cancellation of a RUNNING execution.
    ///
    /// Cooperative: flips the record to CANCELLED and raises the flag the
    /// scheduler checks between launch batches. In-flight node tasks are
    /// not interrupted. Errors when the execution is not RUNNING.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<ChainExecution, ChainError> {
        let mut execution = self
            .executions
            .get(execution_id)
            .await?
            .ok_or(ChainError::ExecutionNotFound(execution_id))?;
        if execution.status != ExecutionStatus::Running {
            return Err(ChainError::NotRunning {
                id: execution_id,
                status: execution.status,
            });
        }
        if let Some(flag) = self.active.lock().get(&execution_id) {
            flag.store(true, Ordering::SeqCst);
        }
        execution.status = ExecutionStatus::Cancelled;
        execution.stamp_completion();
        self.executions.put(execution.clone()).await?;
        ExecutionLogger::new(self.logs.clone(), execution_id)
            .execution_cancelled()
            .await;
        Ok(execution)
    }

    /// Fetch an execution record.
    pub async fn execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<ChainExecution>, ChainError> {
        Ok(self.executions.get(execution_id).await?)
    }

    /// Fetch the log entries for an execution.
    pub async fn logs(&self, execution_id: Uuid) -> Result<Vec<ExecutionLogEntry>, ChainError> {
        Ok(self.logs.entries(execution_id).await?)
    }
}
