//! Error types for the pluggable collaborator traits.
//!
//! Each trait in [`crate::traits`] gets its own error enum so implementors
//! are not forced through a catch-all type. The engine-level
//! [`ChainError`](crate::engine::ChainError) wraps all of these with
//! `#[from]` conversions.

use thiserror::Error;
use uuid::Uuid;

/// Errors from [`ChainStore`](crate::traits::ChainStore) and
/// [`ExecutionStore`](crate::traits::ExecutionStore) implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("chain not found: {0}")]
    ChainNotFound(Uuid),

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors from [`AgentDirectory`](crate::traits::AgentDirectory) lookups.
///
/// A missing agent is NOT an error here; `get` returns `Ok(None)` for
/// that. This enum covers backend failures only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DirectoryError {
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Errors from [`AgentExecutor`](crate::traits::AgentExecutor) dispatch.
///
/// These are *transport-level* failures. An agent that ran and reported
/// failure comes back as a successful `AgentRunResult` with
/// `status: Failed` instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    #[error("agent {agent_id} dispatch failed: {message}")]
    Dispatch { agent_id: String, message: String },

    #[error("agent {0} timed out")]
    Timeout(String),

    #[error("agent executor backend error: {0}")]
    Backend(String),
}

/// Errors raised while running a single node.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("node {node_id} references unknown agent {agent_id}")]
    UnknownAgent { node_id: String, agent_id: String },

    #[error("node {node_id} of type {node_type} has no agent_id")]
    MissingAgentId { node_id: String, node_type: String },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Errors from [`LogSink`](crate::traits::LogSink) appends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogSinkError {
    #[error("log sink backend error: {0}")]
    Backend(String),
}
