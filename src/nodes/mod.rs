//! Polymorphic node execution.
//!
//! Each [`NodeType`] maps to one [`NodeBehavior`] implementation via
//! [`behavior_for`]. Behaviors are stateless; everything run-scoped
//! arrives through [`DispatchCtx`].

mod agent;
mod aggregator;
mod passthrough;

pub use agent::AgentNode;
pub use aggregator::AggregatorNode;
pub use passthrough::PassthroughNode;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DispatchError;
use crate::traits::{AgentDirectory, AgentExecutor};
use crate::types::{ChainNode, NodeType};

/// Run-scoped context handed to each node task.
///
/// Cloned per spawned task; the trait objects are shared via `Arc`.
#[derive(Clone)]
pub struct DispatchCtx {
    pub agents: Arc<dyn AgentExecutor>,
    pub directory: Arc<dyn AgentDirectory>,
    /// Snapshot of `execution.variables` at launch time.
    pub variables: BTreeMap<String, Value>,
}

/// One implementation per node type.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    async fn run(
        &self,
        node: &ChainNode,
        input: Value,
        ctx: &DispatchCtx,
    ) -> Result<Value, DispatchError>;
}

/// Resolve the behavior for a node type.
pub fn behavior_for(node_type: NodeType) -> &'static dyn NodeBehavior {
    match node_type {
        NodeType::Agent => &AgentNode,
        NodeType::Aggregator => &AggregatorNode,
        NodeType::Start
        | NodeType::End
        | NodeType::Condition
        | NodeType::ParallelSplit
        | NodeType::ParallelJoin => &PassthroughNode,
    }
}
