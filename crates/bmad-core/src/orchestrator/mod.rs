//! Gate-checked pipeline execution.
//!
//! Provides `PipelineRun` (the persisted run state machine) and `Orchestrator`,
//! which drives one stage at a time: resolve the stage's agent, assemble its
//! prompt, hand it to the reasoning engine, then evaluate the stage's gates.

pub mod driver;
pub mod run;

pub use driver::{
    build_stage_context, format_orchestration_result, OrchestrationResult, Orchestrator,
};
pub use run::{PipelineRun, RunStatus, StageRecord};
