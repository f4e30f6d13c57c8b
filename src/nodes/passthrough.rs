//! Passthrough behavior for routing and structural nodes.
//!
//! START, END, CONDITION, PARALLEL_SPLIT, and PARALLEL_JOIN perform no
//! transformation. Routing decisions live on the edges leaving a
//! CONDITION node, and PARALLEL_JOIN relies entirely on the input
//! resolver's multi-predecessor aggregation.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DispatchError;
use crate::types::ChainNode;

use super::{DispatchCtx, NodeBehavior};

pub struct PassthroughNode;

#[async_trait]
impl NodeBehavior for PassthroughNode {
    async fn run(
        &self,
        _node: &ChainNode,
        input: Value,
        _ctx: &DispatchCtx,
    ) -> Result<Value, DispatchError> {
        Ok(input)
    }
}
