use crate::output::{print_json, print_table};
use bmad_core::agent::{format_agent_list, Agent};
use bmad_core::policy::build_isolation_instructions;
use bmad_core::types::Capability;
use serde::Serialize;

pub fn list(json: bool) -> anyhow::Result<()> {
    let registry = super::registry()?;
    if json {
        return print_json(&registry.agents());
    }
    print!("{}", format_agent_list(registry.agents()));
    Ok(())
}

#[derive(Serialize)]
struct AgentDetail<'a> {
    #[serde(flatten)]
    agent: &'a Agent,
    isolation: String,
}

pub fn show(id: &str, json: bool) -> anyhow::Result<()> {
    let registry = super::registry()?;
    let agent = registry
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("unknown agent '{id}'"))?;
    let isolation = build_isolation_instructions(&registry, &agent.id);

    if json {
        return print_json(&AgentDetail { agent, isolation });
    }

    println!("{} {} — {} ({})", agent.icon, agent.name, agent.title, agent.id);
    println!("\n{}", agent.role);
    let commands: Vec<String> = agent.commands.iter().map(|c| format!("/{c}")).collect();
    println!("\nCommands: {}", commands.join(", "));

    if !agent.critical_actions.is_empty() {
        println!("\nCritical actions:");
        for action in &agent.critical_actions {
            println!("  - {action}");
        }
    }

    println!();
    let rows = Capability::all()
        .iter()
        .map(|&cap| {
            let allowed = if agent.capabilities.has(cap) { "yes" } else { "no" };
            vec![cap.as_str().to_string(), allowed.to_string()]
        })
        .collect();
    print_table(&["CAPABILITY", "ALLOWED"], rows);

    println!("\n{isolation}");
    Ok(())
}
