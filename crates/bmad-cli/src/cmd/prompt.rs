use super::Project;
use crate::output::print_json;
use anyhow::Context;
use bmad_core::agent::normalize_command;
use bmad_core::collab::StateStore;
use bmad_core::orchestrator::build_stage_context;
use bmad_core::pipeline::stage_for_command;
use bmad_core::prompt::{build_full_agent_prompt, enrich_prompt_with_agent};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct AssembledPrompt {
    command: String,
    agent_id: String,
    prompt: String,
}

pub fn run(root: &Path, command: &str, raw: Option<&str>, json: bool) -> anyhow::Result<()> {
    let registry = super::registry()?;
    let command = normalize_command(command);

    if let Some(raw) = raw {
        let enriched = enrich_prompt_with_agent(&registry, &command, raw);
        if json {
            return print_json(&enriched);
        }
        if enriched.agent_id.is_none() {
            eprintln!("note: no agent handles '/{command}'; prompt left unchanged");
        }
        println!("{}", enriched.prompt);
        return Ok(());
    }

    let agent = registry
        .agent_for_command(&command)
        .ok_or_else(|| anyhow::anyhow!("no agent handles command '/{command}'"))?;

    let project = Project::open(root)?;
    let state = project
        .store
        .load_state(project.id())
        .context("failed to load project state")?;
    // Same fallback query the orchestrator uses for this stage.
    let query = stage_for_command(&command)
        .map(|stage| stage.label)
        .unwrap_or_else(|| command.clone());
    let cache = project.shard_cache();
    let ctx = build_stage_context(&cache, project.id(), &state, &command, &query)
        .context("failed to load project documents")?;
    let prompt = build_full_agent_prompt(&registry, &agent.id, &ctx);

    if json {
        return print_json(&AssembledPrompt {
            command,
            agent_id: agent.id.clone(),
            prompt,
        });
    }
    println!("{prompt}");
    Ok(())
}
