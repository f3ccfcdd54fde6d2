use super::Project;
use crate::output::{print_json, print_table};
use anyhow::Context;
use bmad_core::collab::StateStore;
use bmad_core::gate::GateSet;
use std::path::Path;

pub fn run(root: &Path, names: &[String], overrides: &[String], json: bool) -> anyhow::Result<()> {
    let project = Project::open(root)?;
    let state = project
        .store
        .load_state(project.id())
        .context("failed to load project state")?;

    let gates = GateSet::with_defaults();
    let names: Vec<String> = if names.is_empty() {
        gates.gates().iter().map(|g| g.name.to_string()).collect()
    } else {
        names.to_vec()
    };
    let report = gates.check_with_overrides(&state, &names, overrides);

    if json {
        print_json(&report)?;
    } else {
        let rows = report
            .results
            .iter()
            .map(|r| {
                let result = match (r.passed, r.overridden) {
                    (true, _) => "pass",
                    (false, true) => "overridden",
                    (false, false) => "FAIL",
                };
                vec![r.gate.clone(), result.to_string(), r.reasons.join("; ")]
            })
            .collect();
        print_table(&["GATE", "RESULT", "REASONS"], rows);
    }

    if !report.passed {
        let failed = report.failures().count();
        anyhow::bail!("{failed} gate(s) failed");
    }
    Ok(())
}
