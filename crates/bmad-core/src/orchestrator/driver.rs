use super::run::{PipelineRun, RunStatus, StageRecord};
use crate::agent::AgentRegistry;
use crate::collab::{ReasoningEngine, StateStore};
use crate::error::Result;
use crate::gate::{GateReport, GateSet};
use crate::pipeline::{PipelineKind, Stage};
use crate::prompt::{build_full_agent_prompt, PromptContext};
use crate::shard::{task_query, ShardCache};
use crate::state::WorkflowState;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Engine output kept on a stage record.
const OUTPUT_EXCERPT_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a [`PipelineRun`] through its stages.
///
/// Every collaborator failure ends the step as `Blocked` with a reason; none
/// of them propagate as errors.
pub struct Orchestrator<'a> {
    registry: &'a AgentRegistry,
    gates: &'a GateSet,
    cache: &'a ShardCache,
    engine: &'a dyn ReasoningEngine,
    store: &'a dyn StateStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a AgentRegistry,
        gates: &'a GateSet,
        cache: &'a ShardCache,
        engine: &'a dyn ReasoningEngine,
        store: &'a dyn StateStore,
    ) -> Self {
        Self {
            registry,
            gates,
            cache,
            engine,
            store,
        }
    }

    /// Run the current stage once and return the new status.
    ///
    /// A run blocked after gate evaluation first has its gates re-checked
    /// against the current state and `overrides`; the stage is only executed
    /// again when they still fail.
    pub fn step(&self, run: &mut PipelineRun, overrides: &[String]) -> RunStatus {
        if run.is_completed() {
            return run.status.clone();
        }
        let pipeline = run.pipeline.pipeline();
        let Some(stage) = pipeline.stage(run.stage_index).cloned() else {
            run.set_status(RunStatus::Completed);
            return run.status.clone();
        };

        if run.gated_block_attempt().is_some() {
            if let Ok(state) = self.store.load_state(&run.project_id) {
                let report = self
                    .gates
                    .check_with_overrides(&state, &stage.required_gates, overrides);
                if report.passed {
                    tracing::info!(
                        run = %run.id,
                        stage = %stage.label,
                        "gates now pass, advancing without re-running stage"
                    );
                    let agent_id = run.history.last().and_then(|r| r.agent_id.clone());
                    let record = self.record(run, &stage, agent_id, true, Some(report), None);
                    return self.advance(run, record, pipeline.len());
                }
            }
        }

        run.set_status(RunStatus::Running);
        self.execute(run, &stage, overrides, pipeline.len())
    }

    /// Step until the run completes or blocks.
    pub fn run(&self, run: &mut PipelineRun, overrides: &[String]) -> OrchestrationResult {
        let mut steps = 0;
        loop {
            let status = self.step(run, overrides);
            steps += 1;
            if !matches!(status, RunStatus::Advanced) {
                break;
            }
        }
        OrchestrationResult::from_run(run, steps)
    }

    fn execute(
        &self,
        run: &mut PipelineRun,
        stage: &Stage,
        overrides: &[String],
        total: usize,
    ) -> RunStatus {
        let Some(agent) = self.registry.agent_for_command(&stage.command) else {
            let reason = format!("no agent handles command '/{}'", stage.command);
            return self.block(run, stage, None, None, vec![reason]);
        };
        let agent_id = Some(agent.id.clone());
        tracing::info!(
            run = %run.id,
            stage = run.stage_index,
            command = %stage.command,
            agent = %agent.id,
            "running stage"
        );

        let state = match self.store.load_state(&run.project_id) {
            Ok(state) => state,
            Err(e) => {
                let reason = format!("could not load project state: {e}");
                return self.block(run, stage, agent_id, None, vec![reason]);
            }
        };

        let ctx = match build_stage_context(
            self.cache,
            &run.project_id,
            &state,
            &stage.command,
            &stage.label,
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                let reason = format!("could not load project documents: {e}");
                return self.block(run, stage, agent_id, None, vec![reason]);
            }
        };

        let prompt = build_full_agent_prompt(self.registry, &agent.id, &ctx);
        if prompt.is_empty() {
            let reason = format!("no prompt could be built for agent '{}'", agent.id);
            return self.block(run, stage, agent_id, None, vec![reason]);
        }

        let output = match self.engine.invoke(&prompt) {
            Ok(output) => output,
            Err(e) => {
                let reason = format!("agent '{}' did not finish: {e}", agent.id);
                return self.block(run, stage, agent_id, None, vec![reason]);
            }
        };
        // The engine may have rewritten project documents.
        self.cache.invalidate_project(&run.project_id);

        let state = match self.store.load_state(&run.project_id) {
            Ok(state) => state,
            Err(e) => {
                let reason = format!("could not reload project state: {e}");
                return self.block(run, stage, agent_id, Some(output), vec![reason]);
            }
        };
        let report = self
            .gates
            .check_with_overrides(&state, &stage.required_gates, overrides);

        if report.passed {
            let record = self.record(run, stage, agent_id, true, Some(report), Some(output));
            self.advance(run, record, total)
        } else {
            let reasons = report.reasons();
            let record = self.record(run, stage, agent_id, false, Some(report), Some(output));
            run.history.push(record);
            self.blocked(run, stage, reasons)
        }
    }

    fn advance(&self, run: &mut PipelineRun, record: StageRecord, total: usize) -> RunStatus {
        if let Some(report) = &record.report {
            for outcome in report.overridden_failures() {
                tracing::warn!(run = %run.id, gate = %outcome.gate, "gate failure overridden");
            }
        }
        run.history.push(record);
        run.stage_index += 1;
        let status = if run.stage_index >= total {
            tracing::info!(run = %run.id, pipeline = %run.pipeline, "pipeline completed");
            RunStatus::Completed
        } else {
            RunStatus::Advanced
        };
        run.set_status(status);
        run.status.clone()
    }

    fn block(
        &self,
        run: &mut PipelineRun,
        stage: &Stage,
        agent_id: Option<String>,
        output: Option<String>,
        reasons: Vec<String>,
    ) -> RunStatus {
        let record = self.record(run, stage, agent_id, false, None, output);
        run.history.push(record);
        self.blocked(run, stage, reasons)
    }

    fn blocked(&self, run: &mut PipelineRun, stage: &Stage, reasons: Vec<String>) -> RunStatus {
        tracing::warn!(
            run = %run.id,
            stage = %stage.label,
            reasons = ?reasons,
            "pipeline blocked"
        );
        run.set_status(RunStatus::Blocked { reasons });
        run.status.clone()
    }

    fn record(
        &self,
        run: &PipelineRun,
        stage: &Stage,
        agent_id: Option<String>,
        passed: bool,
        report: Option<GateReport>,
        output: Option<String>,
    ) -> StageRecord {
        StageRecord {
            stage_index: run.stage_index,
            label: stage.label.clone(),
            command: stage.command.clone(),
            agent_id,
            passed,
            report,
            output: output.map(|o| excerpt(&o)),
            finished_at: Utc::now(),
        }
    }
}

/// Prompt context for `command`: the active story's fields plus the project
/// context relevant to it. Without an active story the shards are selected by
/// `fallback_query`.
pub fn build_stage_context(
    cache: &ShardCache,
    project_id: &str,
    state: &WorkflowState,
    command: &str,
    fallback_query: &str,
) -> Result<PromptContext> {
    let mut ctx = state.prompt_context(command);
    let query = match ctx.task_title.as_deref() {
        Some(title) => task_query(title, ctx.task_description.as_deref()),
        None => fallback_query.to_string(),
    };
    let context = cache.build_task_context(project_id, &query)?;
    if !context.trim().is_empty() {
        ctx.sharded_context = Some(context);
    }
    Ok(ctx)
}

fn excerpt(output: &str) -> String {
    match output.char_indices().nth(OUTPUT_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &output[..idx]),
        None => output.to_string(),
    }
}

// ---------------------------------------------------------------------------
// OrchestrationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub run_id: Uuid,
    pub pipeline: PipelineKind,
    pub project_id: String,
    pub status: RunStatus,
    pub stage_index: usize,
    pub total_stages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_command: Option<String>,
    /// Labels of stages that passed, in order.
    pub completed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden: Vec<String>,
    /// Steps taken by this invocation.
    pub steps: usize,
}

impl OrchestrationResult {
    pub fn from_run(run: &PipelineRun, steps: usize) -> Self {
        let pipeline = run.pipeline.pipeline();
        let stage = pipeline.stage(run.stage_index);
        Self {
            run_id: run.id,
            pipeline: run.pipeline,
            project_id: run.project_id.clone(),
            status: run.status.clone(),
            stage_index: run.stage_index,
            total_stages: pipeline.len(),
            stage_label: stage.map(|s| s.label.clone()),
            stage_command: stage.map(|s| s.command.clone()),
            completed: run
                .history
                .iter()
                .filter(|r| r.passed)
                .map(|r| r.label.clone())
                .collect(),
            overridden: run.overridden_gates(),
            steps,
        }
    }
}

/// Human-readable summary for notifications and the CLI.
pub fn format_orchestration_result(result: &OrchestrationResult) -> String {
    let mut out = format!(
        "Pipeline '{}' for project '{}': ",
        result.pipeline, result.project_id
    );
    let position = match (&result.stage_label, &result.stage_command) {
        (Some(label), Some(command)) => format!(
            "stage {}/{} ({label}, /{command})",
            result.stage_index + 1,
            result.total_stages
        ),
        _ => format!("stage {}/{}", result.stage_index + 1, result.total_stages),
    };

    match &result.status {
        RunStatus::Completed => {
            out.push_str(&format!(
                "completed ({}/{} stages)\n",
                result.total_stages, result.total_stages
            ));
        }
        RunStatus::Blocked { reasons } => {
            out.push_str(&format!("blocked at {position}\n"));
            if !reasons.is_empty() {
                out.push_str("Blocked by:\n");
                for reason in reasons {
                    out.push_str(&format!("  - {reason}\n"));
                }
            }
        }
        other => {
            out.push_str(&format!("{} at {position}\n", other.as_str()));
        }
    }

    if !result.completed.is_empty() {
        out.push_str(&format!("Completed stages: {}\n", result.completed.join(", ")));
    }
    if !result.overridden.is_empty() {
        out.push_str(&format!("Overridden gates: {}\n", result.overridden.join(", ")));
    }
    if result.status.is_blocked() {
        out.push_str("Satisfy the failing gates or resume with an explicit override.\n");
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
