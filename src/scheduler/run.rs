//! Core scheduling loop — runs one chain execution as a DAG of tokio
//! tasks.
//!
//! The loop is the sole writer of shared execution state. Node tasks
//! compute a result and hand it back through the `FuturesUnordered`
//! fan-in; edge evaluation and successor readiness for a completed node
//! happen atomically before the next completion is processed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::{json, Value};

use super::graph::{build_incoming, build_outgoing, readiness, seed_ready, Readiness};
use crate::condition;
use crate::errors::DispatchError;
use crate::logging::ExecutionLogger;
use crate::nodes::{behavior_for, DispatchCtx};
use crate::resolver::resolve_input;
use crate::traits::ExecutionStore;
use crate::types::{
    ChainDefinition, ChainExecution, ChainNode, EdgeRunState, NodeResult, NodeRunState, NodeType,
};

/// Everything one run needs, moved into the scheduler.
pub(crate) struct RunContext {
    pub chain: ChainDefinition,
    pub execution: ChainExecution,
    pub dispatch: DispatchCtx,
    pub executions: Arc<dyn ExecutionStore>,
    pub logger: ExecutionLogger,
    pub cancel_flag: Arc<AtomicBool>,
}

/// How the loop ended. Terminal-status stamping and final persistence
/// are the engine's job.
pub(crate) enum RunOutcome {
    Completed { output: Value },
    Failed { message: String, kind: String, details: Value },
    Cancelled,
}

struct NodeTaskResult {
    node_id: String,
    input: Value,
    outcome: Result<Value, DispatchError>,
}

pub(crate) async fn run_chain(ctx: RunContext) -> (ChainExecution, RunOutcome) {
    let RunContext {
        chain,
        mut execution,
        dispatch,
        executions,
        logger,
        cancel_flag,
    } = ctx;

    let outgoing = build_outgoing(&chain);
    let incoming = build_incoming(&chain);
    let nodes_by_id: HashMap<&str, &ChainNode> =
        chain.nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();

    let mut node_states: HashMap<String, NodeRunState> = chain
        .nodes
        .iter()
        .map(|n| (n.node_id.clone(), NodeRunState::Pending))
        .collect();
    let mut edge_states: HashMap<String, EdgeRunState> = chain
        .edges
        .iter()
        .map(|e| (e.edge_id.clone(), EdgeRunState::Unresolved))
        .collect();
    let mut node_outputs = std::collections::BTreeMap::new();

    let mut ready: Vec<String> = seed_ready(&chain, &incoming);
    let mut running: FuturesUnordered<tokio::task::JoinHandle<NodeTaskResult>> =
        FuturesUnordered::new();

    loop {
        // Cooperative cancellation: checked between launch batches only;
        // in-flight tasks are never pre-empted.
        if cancel_flag.load(Ordering::SeqCst) {
            return (execution, RunOutcome::Cancelled);
        }

        // Launch every currently ready node.
        for node_id in std::mem::take(&mut ready) {
            let Some(&node) = nodes_by_id.get(node_id.as_str()) else {
                continue;
            };
            if node_states.get(&node_id) != Some(&NodeRunState::Pending) {
                continue;
            }
            let active_ids: HashSet<String> = execution.active_edges.iter().cloned().collect();
            let incoming_edges = incoming
                .get(node_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let input = resolve_input(
                node,
                incoming_edges,
                Some(&active_ids),
                &execution.input_data,
                &node_outputs,
            );

            node_states.insert(node_id.clone(), NodeRunState::Running);
            execution.current_node_id = Some(node_id.clone());
            logger.node_started(&node_id).await;
            checkpoint(executions.as_ref(), &execution).await;

            let task_node = node.clone();
            let task_dispatch = dispatch.clone();
            running.push(tokio::spawn(async move {
                let behavior = behavior_for(task_node.node_type);
                let outcome = behavior
                    .run(&task_node, input.clone(), &task_dispatch)
                    .await;
                NodeTaskResult {
                    node_id: task_node.node_id,
                    input,
                    outcome,
                }
            }));
        }

        if running.is_empty() {
            break;
        }

        // First-completion wait: unrelated branches never block on each
        // other's completion order.
        let Some(join_result) = running.next().await else {
            break;
        };
        let result = match join_result {
            Ok(r) => r,
            Err(e) => {
                // Task panicked; the engine records the execution-level
                // failure.
                let message = format!("node task panicked: {e}");
                return (
                    execution,
                    RunOutcome::Failed {
                        message,
                        kind: "node_failure".to_string(),
                        details: json!({}),
                    },
                );
            }
        };

        let output = match result.outcome {
            Ok(output) => output,
            Err(err) => {
                // Fail fast: an unexpected dispatch error aborts the whole
                // run. Soft agent failures never reach this arm.
                let message = err.to_string();
                node_states.insert(result.node_id.clone(), NodeRunState::Failed);
                logger.node_failed(&result.node_id, &message).await;
                checkpoint(executions.as_ref(), &execution).await;
                return (
                    execution,
                    RunOutcome::Failed {
                        message: format!("node {} failed: {message}", result.node_id),
                        kind: "node_failure".to_string(),
                        details: json!({"node_id": result.node_id, "error": message}),
                    },
                );
            }
        };

        // Record the completion.
        node_states.insert(result.node_id.clone(), NodeRunState::Completed);
        node_outputs.insert(result.node_id.clone(), output.clone());
        execution.node_results.insert(
            result.node_id.clone(),
            NodeResult {
                input: result.input,
                output: output.clone(),
                completed_at: Utc::now(),
            },
        );
        execution.completed_nodes.push(result.node_id.clone());
        logger.node_completed(&result.node_id).await;

        // Resolve this node's outgoing edges against its output, then
        // walk successors: ready ones queue up, dead ones skip, and
        // skips propagate transitively.
        let mut to_visit: VecDeque<String> = VecDeque::new();
        for edge in outgoing
            .get(result.node_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let active = condition::evaluate(edge.condition.as_ref(), &output);
            edge_states.insert(
                edge.edge_id.clone(),
                if active {
                    EdgeRunState::Active
                } else {
                    EdgeRunState::Inactive
                },
            );
            execution.edge_results.insert(edge.edge_id.clone(), active);
            if active {
                execution.active_edges.push(edge.edge_id.clone());
            }
            to_visit.push_back(edge.target_node_id.clone());
        }

        while let Some(candidate) = to_visit.pop_front() {
            if node_states.get(&candidate) != Some(&NodeRunState::Pending) {
                continue;
            }
            match readiness(&candidate, &incoming, &edge_states) {
                Readiness::Wait => {}
                Readiness::Ready => ready.push(candidate),
                Readiness::Skip => {
                    node_states.insert(candidate.clone(), NodeRunState::Skipped);
                    logger.node_skipped(&candidate).await;
                    for edge in outgoing
                        .get(candidate.as_str())
                        .map(Vec::as_slice)
                        .unwrap_or_default()
                    {
                        edge_states.insert(edge.edge_id.clone(), EdgeRunState::Inactive);
                        execution.edge_results.insert(edge.edge_id.clone(), false);
                        to_visit.push_back(edge.target_node_id.clone());
                    }
                }
            }
        }

        checkpoint(executions.as_ref(), &execution).await;
    }

    let output = final_output(&chain, &execution, &node_outputs, &node_states);
    (execution, RunOutcome::Completed { output })
}

/// COMPLETED END node output if present, else the last completed node's
/// output, else `{}`.
fn final_output(
    chain: &ChainDefinition,
    execution: &ChainExecution,
    node_outputs: &std::collections::BTreeMap<String, Value>,
    node_states: &HashMap<String, NodeRunState>,
) -> Value {
    for node in &chain.nodes {
        if node.node_type == NodeType::End
            && node_states.get(&node.node_id) == Some(&NodeRunState::Completed)
        {
            if let Some(out) = node_outputs.get(&node.node_id) {
                return out.clone();
            }
        }
    }
    execution
        .completed_nodes
        .last()
        .and_then(|id| node_outputs.get(id))
        .cloned()
        .unwrap_or_else(|| json!({}))
}

/// Progress checkpoints are observability, not crash recovery; a failed
/// write is logged and the run continues.
async fn checkpoint(store: &dyn ExecutionStore, execution: &ChainExecution) {
    if let Err(err) = store.put(execution.clone()).await {
        tracing::warn!(execution_id = %execution.id, %err, "execution checkpoint failed");
    }
}
