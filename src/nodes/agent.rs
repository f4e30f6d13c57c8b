//! Agent delegation.
//!
//! The behavior resolves the agent through the directory, prepares the
//! input and config, and hands off to the [`AgentExecutor`] collaborator.
//! A reported agent failure is converted into a structured soft-failure
//! object rather than an error, so downstream branches can route on it.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::DispatchError;
use crate::types::{AgentRunStatus, ChainNode};

use super::{DispatchCtx, NodeBehavior};

pub struct AgentNode;

#[async_trait]
impl NodeBehavior for AgentNode {
    async fn run(
        &self,
        node: &ChainNode,
        input: Value,
        ctx: &DispatchCtx,
    ) -> Result<Value, DispatchError> {
        let Some(agent_id) = node.agent_id.as_deref() else {
            return Err(DispatchError::MissingAgentId {
                node_id: node.node_id.clone(),
                node_type: node.node_type.to_string(),
            });
        };
        let Some(agent) = ctx.directory.get(agent_id).await? else {
            return Err(DispatchError::UnknownAgent {
                node_id: node.node_id.clone(),
                agent_id: agent_id.to_string(),
            });
        };

        let config = merged_config(node, ctx);
        let input = match node.config.get("output_schema") {
            Some(schema) => inject_schema_instruction(input, schema),
            None => input,
        };

        let result = ctx.agents.execute(agent_id, input, &config).await?;

        if result.status == AgentRunStatus::Failed {
            let message = result
                .error_message
                .unwrap_or_else(|| "agent reported failure".to_string());
            tracing::warn!(agent_id, node_id = %node.node_id, %message, "soft agent failure");
            return Ok(json!({
                "error": true,
                "error_message": message,
                "status": "failed"
            }));
        }

        if agent.structured_protocol() {
            return Ok(extract_structured(result.output_data));
        }
        Ok(result.output_data)
    }
}

/// Node config with any run-level `_model_override` merged in.
fn merged_config(node: &ChainNode, ctx: &DispatchCtx) -> Value {
    let mut config = match &node.config {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(model) = ctx.variables.get("_model_override") {
        config.insert("_model_override".to_string(), model.clone());
    }
    Value::Object(config)
}

/// Append an output-schema instruction to the outgoing input.
///
/// Prefers the `message` field of an object input, then a raw string
/// input; anything else carries the instruction under
/// `_system_instruction_injection`.
fn inject_schema_instruction(input: Value, schema: &Value) -> Value {
    let instruction = format!(
        "\n\nRespond with a single JSON object matching this schema: {schema}"
    );
    match input {
        Value::Object(mut map) => {
            match map.get("message").and_then(Value::as_str) {
                Some(message) => {
                    let appended = format!("{message}{instruction}");
                    map.insert("message".to_string(), Value::String(appended));
                }
                None => {
                    map.insert(
                        "_system_instruction_injection".to_string(),
                        Value::String(instruction),
                    );
                }
            }
            Value::Object(map)
        }
        Value::String(s) => Value::String(format!("{s}{instruction}")),
        other => json!({
            "data": other,
            "_system_instruction_injection": instruction
        }),
    }
}

/// Pull a JSON object out of an agent's textual content.
///
/// Tries a fenced ```json block first, then the widest brace span. When
/// neither parses, wraps the raw content instead of failing the node.
fn extract_structured(output: Value) -> Value {
    let content = match &output {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            match map
                .get("content")
                .or_else(|| map.get("message"))
                .and_then(Value::as_str)
            {
                Some(s) => s.to_string(),
                // already structured
                None => return output,
            }
        }
        _ => return output,
    };

    if let Some(parsed) = parse_candidate(&content) {
        return parsed;
    }

    let note = "Agent response was not valid structured output";
    json!({
        "thought": note,
        "status": "failure",
        "data": {"raw_output": content},
        "message": note
    })
}

fn parse_candidate(content: &str) -> Option<Value> {
    if let Some(fenced) = fenced_json_block(content) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(fenced) {
            return Some(Value::Object(map));
        }
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&content[start..=end]) {
        Ok(Value::Object(map)) => Some(Value::Object(map)),
        _ => None,
    }
}

fn fenced_json_block(content: &str) -> Option<&str> {
    let after = content.split("```json").nth(1)?;
    Some(after.split("```").next()?.trim())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx_with, ScriptedExecutor};
    use super::*;
    use crate::types::{AgentRecord, AgentRunResult, AgentStatus, NodeType};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn agent_node(agent_id: Option<&str>, config: Value) -> ChainNode {
        ChainNode {
            id: Uuid::new_v4(),
            chain_id: Uuid::new_v4(),
            node_id: "worker".into(),
            node_type: NodeType::Agent,
            agent_id: agent_id.map(Into::into),
            label: None,
            position: None,
            config,
            order_index: 0,
        }
    }

    fn record(id: &str, config: Value) -> AgentRecord {
        AgentRecord {
            id: id.into(),
            name: id.into(),
            status: AgentStatus::Active,
            config,
        }
    }

    #[tokio::test]
    async fn missing_agent_id_is_an_error() {
        let node = agent_node(None, json!({}));
        let ctx = ctx_with(ScriptedExecutor::new(vec![]), vec![], BTreeMap::new());
        let err = AgentNode.run(&node, json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingAgentId { .. }));
    }

    #[tokio::test]
    async fn unknown_agent_is_an_error() {
        let node = agent_node(Some("ghost"), json!({}));
        let ctx = ctx_with(ScriptedExecutor::new(vec![]), vec![], BTreeMap::new());
        let err = AgentNode.run(&node, json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAgent { .. }));
    }

    #[tokio::test]
    async fn success_passes_output_through() {
        let node = agent_node(Some("a1"), json!({}));
        let ctx = ctx_with(
            ScriptedExecutor::succeeding("a1", json!({"answer": 42})),
            vec![record("a1", json!({}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({"q": 1}), &ctx).await.unwrap();
        assert_eq!(out, json!({"answer": 42}));
    }

    #[tokio::test]
    async fn reported_failure_becomes_soft_object() {
        let node = agent_node(Some("a1"), json!({}));
        let ctx = ctx_with(
            ScriptedExecutor::new(vec![(
                "a1",
                AgentRunResult {
                    status: crate::types::AgentRunStatus::Failed,
                    output_data: json!({}),
                    error_message: Some("rate limited".into()),
                },
            )]),
            vec![record("a1", json!({}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(
            out,
            json!({"error": true, "error_message": "rate limited", "status": "failed"})
        );
    }

    #[tokio::test]
    async fn model_override_merged_into_config() {
        let node = agent_node(Some("a1"), json!({"temperature": 0.2}));
        let calls_handle =
            std::sync::Arc::new(ScriptedExecutor::succeeding("a1", json!({})));
        let mut variables = BTreeMap::new();
        variables.insert("_model_override".to_string(), json!("fast-model"));
        let ctx = DispatchCtx {
            agents: calls_handle.clone(),
            directory: std::sync::Arc::new(crate::defaults::StaticAgentDirectory::new(vec![
                record("a1", json!({})),
            ])),
            variables,
        };

        AgentNode.run(&node, json!({}), &ctx).await.unwrap();

        let calls = calls_handle.calls.lock();
        let sent_config = &calls[0].2;
        assert_eq!(sent_config["temperature"], json!(0.2));
        assert_eq!(sent_config["_model_override"], json!("fast-model"));
    }

    #[tokio::test]
    async fn schema_instruction_appended_to_message() {
        let node = agent_node(
            Some("a1"),
            json!({"output_schema": {"type": "object"}}),
        );
        let executor = ScriptedExecutor::succeeding("a1", json!({}));
        let calls_handle = std::sync::Arc::new(executor);
        let ctx = DispatchCtx {
            agents: calls_handle.clone(),
            directory: std::sync::Arc::new(crate::defaults::StaticAgentDirectory::new(vec![
                record("a1", json!({})),
            ])),
            variables: BTreeMap::new(),
        };

        AgentNode
            .run(&node, json!({"message": "summarize this"}), &ctx)
            .await
            .unwrap();
        let calls = calls_handle.calls.lock();
        let sent = &calls[0].1;
        let message = sent["message"].as_str().unwrap();
        assert!(message.starts_with("summarize this"));
        assert!(message.contains("matching this schema"));
    }

    #[tokio::test]
    async fn schema_instruction_stashed_when_no_message_field() {
        let node = agent_node(Some("a1"), json!({"output_schema": {}}));
        let calls_handle =
            std::sync::Arc::new(ScriptedExecutor::succeeding("a1", json!({})));
        let ctx = DispatchCtx {
            agents: calls_handle.clone(),
            directory: std::sync::Arc::new(crate::defaults::StaticAgentDirectory::new(vec![
                record("a1", json!({})),
            ])),
            variables: BTreeMap::new(),
        };
        AgentNode.run(&node, json!({"q": 1}), &ctx).await.unwrap();
        let calls = calls_handle.calls.lock();
        assert!(calls[0].1["_system_instruction_injection"]
            .as_str()
            .unwrap()
            .contains("schema"));

        drop(calls);
        AgentNode
            .run(&node, json!("plain text"), &ctx)
            .await
            .unwrap();
        let calls = calls_handle.calls.lock();
        assert!(calls[1].1.as_str().unwrap().starts_with("plain text"));
    }

    #[tokio::test]
    async fn structured_protocol_extracts_fenced_json() {
        let node = agent_node(Some("a1"), json!({}));
        let content = "Here you go:\n```json\n{\"status\": \"success\", \"data\": {\"x\": 1}}\n```";
        let ctx = ctx_with(
            ScriptedExecutor::succeeding("a1", json!({"content": content})),
            vec![record("a1", json!({"structured_protocol": true}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(out, json!({"status": "success", "data": {"x": 1}}));
    }

    #[tokio::test]
    async fn structured_protocol_falls_back_to_brace_span() {
        let node = agent_node(Some("a1"), json!({}));
        let ctx = ctx_with(
            ScriptedExecutor::succeeding("a1", json!("noise {\"k\": 7} trailing")),
            vec![record("a1", json!({"structured_protocol": true}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(out, json!({"k": 7}));
    }

    #[tokio::test]
    async fn structured_protocol_wraps_unparseable_content() {
        let node = agent_node(Some("a1"), json!({}));
        let ctx = ctx_with(
            ScriptedExecutor::succeeding("a1", json!("no json here at all")),
            vec![record("a1", json!({"structured_protocol": true}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(out["status"], json!("failure"));
        assert_eq!(out["data"]["raw_output"], json!("no json here at all"));
        assert!(out["thought"].is_string());
    }

    #[tokio::test]
    async fn structured_protocol_keeps_already_structured_output() {
        let node = agent_node(Some("a1"), json!({}));
        let ctx = ctx_with(
            ScriptedExecutor::succeeding("a1", json!({"data": {"done": true}})),
            vec![record("a1", json!({"structured_protocol": true}))],
            BTreeMap::new(),
        );
        let out = AgentNode.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(out, json!({"data": {"done": true}}));
    }
}
