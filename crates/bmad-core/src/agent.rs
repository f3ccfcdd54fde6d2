//! Agent personas and the command routing table.
//!
//! Six personas are registered at startup. Every command belongs to at most
//! one agent; a command claimed twice is rejected when the registry is built.

use crate::error::{BmadError, Result};
use crate::types::Capability;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// AgentCapabilities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub can_modify_code: bool,
    pub can_modify_architecture: bool,
    pub can_modify_prd: bool,
    pub can_create_tasks: bool,
    pub can_review_code: bool,
    pub can_deploy_to_production: bool,
    /// Glob patterns rendered as advisory text; nothing here enforces them.
    #[serde(default)]
    pub allowed_file_patterns: Vec<String>,
}

impl AgentCapabilities {
    /// Every flag false, no file patterns.
    pub fn restricted() -> Self {
        Self::default()
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::ModifyCode => self.can_modify_code,
            Capability::ModifyArchitecture => self.can_modify_architecture,
            Capability::ModifyPrd => self.can_modify_prd,
            Capability::CreateTasks => self.can_create_tasks,
            Capability::ReviewCode => self.can_review_code,
            Capability::DeployToProduction => self.can_deploy_to_production,
        }
    }

    fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::ModifyCode => self.can_modify_code = true,
            Capability::ModifyArchitecture => self.can_modify_architecture = true,
            Capability::ModifyPrd => self.can_modify_prd = true,
            Capability::CreateTasks => self.can_create_tasks = true,
            Capability::ReviewCode => self.can_review_code = true,
            Capability::DeployToProduction => self.can_deploy_to_production = true,
        }
        self
    }

    fn patterns(mut self, patterns: &[&str]) -> Self {
        self.allowed_file_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub title: String,
    pub icon: String,
    pub role: String,
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical_actions: Vec<String>,
    pub capabilities: AgentCapabilities,
}

/// Commands arrive as `/Exec`, `exec ` or `EXEC`; all route the same way.
pub fn normalize_command(command: &str) -> String {
    command.trim().trim_start_matches('/').to_lowercase()
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    by_id: HashMap<String, usize>,
    by_command: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Build a registry, rejecting duplicate ids and commands claimed twice.
    pub fn new(agents: Vec<Agent>) -> Result<Self> {
        let mut by_id = HashMap::new();
        let mut by_command: HashMap<String, usize> = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if by_id.insert(agent.id.clone(), idx).is_some() {
                return Err(BmadError::DuplicateAgent(agent.id.clone()));
            }
            for command in &agent.commands {
                let key = normalize_command(command);
                if let Some(&prev) = by_command.get(&key) {
                    return Err(BmadError::CommandConflict {
                        command: key,
                        first: agents[prev].id.clone(),
                        second: agent.id.clone(),
                    });
                }
                by_command.insert(key, idx);
            }
        }

        Ok(Self {
            agents,
            by_id,
            by_command,
        })
    }

    /// The six built-in personas.
    pub fn with_defaults() -> Result<Self> {
        Self::new(default_agents())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.by_id.get(id).map(|&idx| &self.agents[idx])
    }

    pub fn agent_for_command(&self, command: &str) -> Option<&Agent> {
        self.by_command
            .get(&normalize_command(command))
            .map(|&idx| &self.agents[idx])
    }
}

/// One line per agent plus its commands, for chat notifications.
pub fn format_agent_list(agents: &[Agent]) -> String {
    let mut out = String::from("Available agents:\n");
    for agent in agents {
        out.push_str(&format!(
            "\n{} {} — {} ({})\n",
            agent.icon, agent.name, agent.title, agent.id
        ));
        let commands: Vec<String> = agent.commands.iter().map(|c| format!("/{c}")).collect();
        out.push_str(&format!("   Commands: {}\n", commands.join(", ")));
    }
    out
}

// ---------------------------------------------------------------------------
// Built-in personas
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn agent(
    id: &str,
    name: &str,
    title: &str,
    icon: &str,
    role: &str,
    commands: &[&str],
    critical_actions: &[&str],
    capabilities: AgentCapabilities,
) -> Agent {
    Agent {
        id: id.to_string(),
        name: name.to_string(),
        title: title.to_string(),
        icon: icon.to_string(),
        role: role.to_string(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
        critical_actions: critical_actions.iter().map(|a| a.to_string()).collect(),
        capabilities,
    }
}

pub fn default_agents() -> Vec<Agent> {
    vec![
        agent(
            "analyst",
            "Mary",
            "Business Analyst",
            "📊",
            "Strategic analyst who turns vague ideas into researched, evidence-backed project briefs.",
            &["brief", "research", "brainstorm"],
            &["Cite the source of every market or user claim"],
            AgentCapabilities::restricted().patterns(&["docs/brief.md", "docs/research/**"]),
        ),
        agent(
            "pm",
            "John",
            "Product Manager",
            "📋",
            "Product manager who owns the PRD, defines scope and keeps requirements testable.",
            &["prd", "epics", "prioritize"],
            &[
                "Every requirement must have measurable acceptance criteria",
                "Flag scope creep instead of silently absorbing it",
            ],
            AgentCapabilities::restricted()
                .with(Capability::ModifyPrd)
                .with(Capability::CreateTasks)
                .patterns(&["docs/prd.md", "docs/prd/**", "docs/epics/**"]),
        ),
        agent(
            "architect",
            "Winston",
            "Architect",
            "🏗️",
            "System architect who makes and records technical decisions, balancing pragmatism with long-term health.",
            &["architecture", "tech-review"],
            &["Record every significant decision with its trade-offs"],
            AgentCapabilities::restricted()
                .with(Capability::ModifyArchitecture)
                .with(Capability::ReviewCode)
                .patterns(&["docs/architecture.md", "docs/architecture/**", "docs/adr/**"]),
        ),
        agent(
            "sm",
            "Bob",
            "Scrum Master",
            "🏃",
            "Scrum master who slices epics into implementable stories and runs sprint ceremonies.",
            &["stories", "plan", "sprint", "retro"],
            &[
                "Stories must be small enough to finish within one sprint",
                "Never write implementation code",
            ],
            AgentCapabilities::restricted()
                .with(Capability::CreateTasks)
                .patterns(&["docs/stories/**", "docs/sprints/**"]),
        ),
        agent(
            "dev",
            "James",
            "Developer",
            "💻",
            "Senior developer who implements stories exactly as specified, test-first.",
            &["exec", "implement", "fix"],
            &[
                "Read the full story and its acceptance criteria before writing code",
                "Mark a subtask done only when its tests pass",
                "Update dev notes with every deviation from the story",
            ],
            AgentCapabilities::restricted()
                .with(Capability::ModifyCode)
                .patterns(&["src/**", "tests/**", "lib/**", "docs/stories/**"]),
        ),
        agent(
            "qa",
            "Quinn",
            "QA Engineer",
            "🧪",
            "Quality engineer who reviews implementations against acceptance criteria and triages alerts.",
            &["review", "test", "alerts"],
            &["Check every acceptance criterion explicitly and report each verdict"],
            AgentCapabilities::restricted()
                .with(Capability::ReviewCode)
                .patterns(&["tests/**", "docs/qa/**"]),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
