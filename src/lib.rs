//! ChainFlow — chain orchestration for multi-agent pipelines.
//!
//! Chains are directed acyclic graphs of typed nodes joined by
//! conditional edges. The engine validates a chain, creates an execution
//! record, and drives the graph with partial concurrency: independent
//! branches run in parallel, edge conditions gate successors, and dead
//! branches are skipped transitively. Agent execution itself is an
//! external capability reached through a narrow trait.
//!
//! The engine is designed to be embedded in other applications and has no
//! opinion about web servers, databases, or agent runtimes — those arrive
//! through the traits in [`traits`], with in-memory defaults in
//! [`defaults`].

pub mod condition;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod nodes;
pub mod resolver;
pub(crate) mod scheduler;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export public types at the crate level.

// condition
pub use condition::evaluate;

// defaults
pub use defaults::{
    InMemoryChainStore, InMemoryExecutionStore, InMemoryLogSink, StaticAgentDirectory,
};

// engine
pub use engine::{ChainEngine, ChainEngineBuilder, ChainError, EngineConfig};

// errors
pub use errors::{AgentError, DirectoryError, DispatchError, LogSinkError, StoreError};

// logging
pub use logging::ExecutionLogger;

// nodes
pub use nodes::{behavior_for, AgentNode, AggregatorNode, DispatchCtx, NodeBehavior, PassthroughNode};

// resolver
pub use resolver::resolve_input;

// traits
pub use traits::{AgentDirectory, AgentExecutor, ChainStore, ExecutionStore, LogSink};

// types
pub use types::{
    AgentRecord, AgentRunResult, AgentRunStatus, AgentStatus, ChainDefinition, ChainEdge,
    ChainExecution, ChainNode, ChainStatus, EdgeRunState, ExecutionLogEntry, ExecutionStatus,
    LogLevel, NodeResult, NodeRunState, NodeType,
};

// validate
pub use validate::{validate_chain, ValidationReport};
