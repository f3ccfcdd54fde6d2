use crate::output::{print_json, print_table};
use bmad_core::pipeline::{Pipeline, PipelineKind};

pub fn run(json: bool) -> anyhow::Result<()> {
    let pipelines: Vec<Pipeline> = PipelineKind::all().iter().map(|k| k.pipeline()).collect();
    if json {
        return print_json(&pipelines);
    }

    let registry = super::registry()?;
    for (i, pipeline) in pipelines.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{} ({} stages)", pipeline.kind, pipeline.len());
        let rows = pipeline
            .stages
            .iter()
            .enumerate()
            .map(|(n, stage)| {
                let agent = registry
                    .agent_for_command(&stage.command)
                    .map(|a| a.id.clone())
                    .unwrap_or_else(|| "-".to_string());
                let gates = if stage.required_gates.is_empty() {
                    "-".to_string()
                } else {
                    stage.required_gates.join(", ")
                };
                vec![
                    (n + 1).to_string(),
                    stage.label.clone(),
                    format!("/{}", stage.command),
                    agent,
                    gates,
                ]
            })
            .collect();
        print_table(&["#", "STAGE", "COMMAND", "AGENT", "GATES"], rows);
    }
    Ok(())
}
