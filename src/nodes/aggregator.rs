//! Fan-in aggregation over multiple predecessor outputs.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::DispatchError;
use crate::types::ChainNode;

use super::{DispatchCtx, NodeBehavior};

/// Combines the `inputs` array produced by the input resolver according
/// to the node's `aggregation_type` config:
///
/// - `merge`: shallow-merge all object items, later items win;
/// - `concat`: `{"aggregated_results": [...]}`;
/// - `first`: the first truthy item, or `{}` if none;
/// - anything else / unset: `{"results": [...]}`.
pub struct AggregatorNode;

#[async_trait]
impl NodeBehavior for AggregatorNode {
    async fn run(
        &self,
        node: &ChainNode,
        input: Value,
        _ctx: &DispatchCtx,
    ) -> Result<Value, DispatchError> {
        // Single-predecessor aggregators see the raw output, not the
        // wrapped form; normalize to a list either way.
        let inputs: Vec<Value> = match input {
            Value::Object(ref map) if map.contains_key("inputs") => map
                .get("inputs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            other => vec![other],
        };

        let strategy = node
            .config
            .get("aggregation_type")
            .and_then(Value::as_str)
            .unwrap_or("default");

        let out = match strategy {
            "merge" => {
                let mut merged = Map::new();
                for item in &inputs {
                    if let Value::Object(map) = item {
                        for (k, v) in map {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                }
                Value::Object(merged)
            }
            "concat" => json!({"aggregated_results": inputs}),
            "first" => inputs
                .into_iter()
                .find(is_truthy)
                .unwrap_or_else(|| json!({})),
            _ => json!({"results": inputs}),
        };
        Ok(out)
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}
