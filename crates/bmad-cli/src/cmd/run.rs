use super::Project;
use crate::engine::{DryRunEngine, ShellEngine};
use crate::output::print_json;
use anyhow::Context;
use bmad_core::collab::ReasoningEngine;
use bmad_core::gate::GateSet;
use bmad_core::orchestrator::{
    format_orchestration_result, OrchestrationResult, Orchestrator, PipelineRun,
};
use bmad_core::pipeline::PipelineKind;
use std::path::Path;

pub struct RunOptions<'a> {
    pub pipeline: Option<&'a str>,
    pub resume: bool,
    pub overrides: &'a [String],
    pub dry_run: bool,
    pub step: bool,
}

pub fn run(root: &Path, opts: RunOptions<'_>, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    let requested: Option<PipelineKind> = opts
        .pipeline
        .map(str::parse::<PipelineKind>)
        .transpose()?;

    let mut run = if opts.resume {
        let run = PipelineRun::load(root).context("nothing to resume")?;
        if run.project_id != project.id() {
            anyhow::bail!(
                "recorded run {} belongs to project '{}', not '{}'",
                run.id,
                run.project_id,
                project.id()
            );
        }
        if let Some(kind) = requested.filter(|k| *k != run.pipeline) {
            anyhow::bail!(
                "recorded run {} uses pipeline '{}', not '{kind}'",
                run.id,
                run.pipeline
            );
        }
        run
    } else {
        let kind = requested.unwrap_or(project.config.pipeline);
        PipelineRun::new(kind, project.id())
    };

    let registry = super::registry()?;
    let gates = GateSet::with_defaults();
    let cache = project.shard_cache();
    let dry = DryRunEngine;
    let shell;
    let engine: &dyn ReasoningEngine = if opts.dry_run {
        &dry
    } else {
        shell = ShellEngine::from_config(&project.config.engine, root);
        &shell
    };

    tracing::info!(
        run = %run.id,
        pipeline = %run.pipeline,
        stage = run.stage_index,
        "starting pipeline run"
    );
    let orchestrator = Orchestrator::new(&registry, &gates, &cache, engine, &project.store);
    let result = if opts.step {
        orchestrator.step(&mut run, opts.overrides);
        OrchestrationResult::from_run(&run, 1)
    } else {
        orchestrator.run(&mut run, opts.overrides)
    };
    run.save(root).context("failed to save .bmad/run.yaml")?;

    if json {
        return print_json(&result);
    }
    print!("{}", format_orchestration_result(&result));
    Ok(())
}
