//! Execution scheduling: readiness propagation, concurrent node
//! dispatch, conditional edge activation, and skip propagation.

mod graph;
mod run;

pub(crate) use run::{run_chain, RunContext, RunOutcome};
