//! Capability lookups and the isolation text derived from them.
//!
//! The text is advisory: it is embedded in the prompt and whoever executes
//! the agent's output is responsible for enforcing it.

use crate::agent::{AgentCapabilities, AgentRegistry};
use crate::types::Capability;

/// Capabilities for `agent_id`; unknown agents get the all-false record.
pub fn capabilities(registry: &AgentRegistry, agent_id: &str) -> AgentCapabilities {
    registry
        .get(agent_id)
        .map(|a| a.capabilities.clone())
        .unwrap_or_else(AgentCapabilities::restricted)
}

pub fn check_permission(registry: &AgentRegistry, agent_id: &str, capability: Capability) -> bool {
    capabilities(registry, agent_id).has(capability)
}

/// Restriction lines for every capability the record does not grant.
pub fn restriction_lines(caps: &AgentCapabilities) -> Vec<&'static str> {
    Capability::all()
        .iter()
        .filter(|c| !caps.has(**c))
        .map(|c| c.restriction())
        .collect()
}

/// Render the isolation block for one capability record.
pub fn render_isolation(display_name: &str, caps: &AgentCapabilities) -> String {
    let mut out = String::from("## Isolation Rules\n");
    out.push_str(&format!("You are acting strictly as {display_name}.\n"));

    let restrictions = restriction_lines(caps);
    if !restrictions.is_empty() {
        out.push_str("\nYou MUST NOT:\n");
        for line in restrictions {
            out.push_str(&format!("- {line}\n"));
        }
    }

    if caps.allowed_file_patterns.is_empty() {
        out.push_str("\nYou may not create or modify any files.\n");
    } else {
        out.push_str("\nYou may only create or modify files matching:\n");
        for pattern in &caps.allowed_file_patterns {
            out.push_str(&format!("- `{pattern}`\n"));
        }
    }

    out.push_str(
        "\nIf the request requires anything outside these rules, stop and say which agent should handle it.\n",
    );
    out
}

/// Isolation instructions for `agent_id`. Unknown agents get the fully
/// restricted block.
pub fn build_isolation_instructions(registry: &AgentRegistry, agent_id: &str) -> String {
    match registry.get(agent_id) {
        Some(agent) => render_isolation(
            &format!("{} the {}", agent.name, agent.title),
            &agent.capabilities,
        ),
        None => render_isolation("an unregistered agent", &AgentCapabilities::restricted()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
