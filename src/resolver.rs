//! Input resolution — computes the effective input for a node from its
//! active predecessors and optional `input_map` overrides.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};

use crate::types::{ChainEdge, ChainNode};

/// Resolve a node's effective input.
///
/// Predecessors whose connecting edge is in `active_edge_ids` contribute
/// their output (no filter means every predecessor counts). Zero active
/// predecessors fall back to the chain's original `input_data`; exactly
/// one passes its output through; several are wrapped as
/// `{"inputs": [...]}` in edge-declaration order. An `input_map` in the
/// node config is applied last, merged over the base when the base is an
/// object and replacing it otherwise.
pub fn resolve_input(
    node: &ChainNode,
    incoming_edges: &[&ChainEdge],
    active_edge_ids: Option<&HashSet<String>>,
    input_data: &Value,
    node_outputs: &BTreeMap<String, Value>,
) -> Value {
    let mut predecessors: Vec<&str> = Vec::new();
    for edge in incoming_edges {
        if let Some(active) = active_edge_ids {
            if !active.contains(&edge.edge_id) {
                continue;
            }
        }
        if !predecessors.contains(&edge.source_node_id.as_str()) {
            predecessors.push(edge.source_node_id.as_str());
        }
    }

    let base = match predecessors.as_slice() {
        [] => input_data.clone(),
        [only] => node_outputs.get(*only).cloned().unwrap_or(Value::Null),
        many => json!({
            "inputs": many
                .iter()
                .map(|p| node_outputs.get(*p).cloned().unwrap_or(Value::Null))
                .collect::<Vec<_>>()
        }),
    };

    let Some(input_map) = node.config.get("input_map").and_then(Value::as_object) else {
        return base;
    };
    if input_map.is_empty() {
        return base;
    }

    let mut mapped = Map::new();
    for (key, template) in input_map {
        mapped.insert(key.clone(), resolve_mapping(template, node_outputs));
    }

    // Mapped keys win over the base input; a non-object base is replaced
    // outright.
    match base {
        Value::Object(mut obj) => {
            for (k, v) in mapped {
                obj.insert(k, v);
            }
            Value::Object(obj)
        }
        _ => Value::Object(mapped),
    }
}

/// A `"{{node_id.field.path}}"` string resolves against completed node
/// outputs; everything else is a literal.
fn resolve_mapping(template: &Value, node_outputs: &BTreeMap<String, Value>) -> Value {
    let Some(s) = template.as_str() else {
        return template.clone();
    };
    let Some(reference) = s.strip_prefix("{{").and_then(|r| r.strip_suffix("}}")) else {
        return template.clone();
    };
    let reference = reference.trim();
    let (node_id, path) = match reference.split_once('.') {
        Some((node_id, rest)) => (node_id, Some(rest)),
        None => (reference, None),
    };
    let Some(output) = node_outputs.get(node_id) else {
        return Value::Null;
    };
    match path {
        None => output.clone(),
        Some(path) => {
            let mut cur = output;
            for seg in path.split('.') {
                match cur.get(seg) {
                    Some(next) => cur = next,
                    None => return Value::Null,
                }
            }
            cur.clone()
        }
    }
}
