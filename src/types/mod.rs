//! Core data model: chain definitions and execution records.

mod chain;
mod execution;

pub use chain::{
    AgentRecord, AgentStatus, ChainDefinition, ChainEdge, ChainNode, ChainStatus, NodeType,
};
pub use execution::{
    AgentRunResult, AgentRunStatus, ChainExecution, EdgeRunState, ExecutionLogEntry,
    ExecutionStatus, LogLevel, NodeResult, NodeRunState,
};
