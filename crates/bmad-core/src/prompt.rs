//! Role-scoped prompt assembly.
//!
//! A prompt is built from fixed sections in a fixed order; a section whose
//! source data is absent is left out entirely.

use crate::agent::{normalize_command, Agent, AgentRegistry};
use crate::policy;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PromptContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_mapping: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharded_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_notes: Option<String>,
}

impl PromptContext {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// CommandFamily
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFamily {
    Analysis,
    Requirements,
    Architecture,
    Planning,
    Execution,
    Review,
    AlertsReview,
    Retrospective,
    General,
}

impl CommandFamily {
    pub fn for_command(command: &str) -> CommandFamily {
        match normalize_command(command).as_str() {
            "brief" | "research" | "brainstorm" => CommandFamily::Analysis,
            "prd" | "prioritize" => CommandFamily::Requirements,
            "architecture" | "tech-review" => CommandFamily::Architecture,
            "stories" | "plan" | "sprint" | "epics" => CommandFamily::Planning,
            "exec" | "implement" | "fix" => CommandFamily::Execution,
            "review" | "test" => CommandFamily::Review,
            "alerts" => CommandFamily::AlertsReview,
            "retro" => CommandFamily::Retrospective,
            _ => CommandFamily::General,
        }
    }

    fn formatter(self) -> fn(&PromptContext) -> String {
        match self {
            CommandFamily::Analysis => analysis_block,
            CommandFamily::Requirements => requirements_block,
            CommandFamily::Architecture => architecture_block,
            CommandFamily::Planning => planning_block,
            CommandFamily::Execution => execution_block,
            CommandFamily::Review => review_block,
            CommandFamily::AlertsReview => alerts_block,
            CommandFamily::Retrospective => retro_block,
            CommandFamily::General => general_block,
        }
    }

    pub fn instructions(self, ctx: &PromptContext) -> String {
        (self.formatter())(ctx)
    }
}

// ---------------------------------------------------------------------------
// Command-family blocks
// ---------------------------------------------------------------------------

/// `Task:`, `Priority:` and `Sprint:` lines for whichever fields are set.
fn task_lines(ctx: &PromptContext) -> String {
    let mut out = String::new();
    if let Some(title) = present(&ctx.task_title) {
        out.push_str(&format!("Task: {title}\n"));
    }
    if let Some(p) = ctx.priority {
        out.push_str(&format!("Priority: P{p}\n"));
    }
    if let Some(sprint) = present(&ctx.sprint_id) {
        out.push_str(&format!("Sprint: {sprint}\n"));
    }
    if let Some(desc) = present(&ctx.task_description) {
        out.push_str(&format!("\n{desc}\n"));
    }
    out
}

fn block(heading: &str, intro: &str, ctx: &PromptContext, steps: &[&str]) -> String {
    let mut out = format!("## {heading}\n{intro}\n");
    let task = task_lines(ctx);
    if !task.is_empty() {
        out.push('\n');
        out.push_str(&task);
    }
    out.push_str("\nSteps:\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {step}\n", i + 1));
    }
    out
}

fn execution_block(ctx: &PromptContext) -> String {
    block(
        "Execution",
        "Implement the story below.",
        ctx,
        &[
            "Work through the subtasks in order",
            "Write or update tests for each acceptance criterion before the code",
            "Run the full test suite; do not mark a subtask done while tests fail",
            "Record deviations and decisions in the dev notes",
            "Set the story status to review when every subtask is done",
        ],
    )
}

fn planning_block(ctx: &PromptContext) -> String {
    block(
        "Planning",
        "Decompose the work below into sprint-sized stories.",
        ctx,
        &[
            "Read the PRD and architecture context",
            "Split the work into stories that fit in one sprint",
            "Give every story numbered acceptance criteria (AC-1, AC-2, ...)",
            "Break each story into subtasks mapped to the criteria they satisfy",
            "Order stories by priority and dependency",
        ],
    )
}

fn retro_block(ctx: &PromptContext) -> String {
    block(
        "Retrospective",
        "Run the retrospective for the sprint.",
        ctx,
        &[
            "Summarize what was delivered against the sprint goal",
            "List what went well and what did not",
            "Propose at most three concrete improvements with owners",
        ],
    )
}

fn alerts_block(ctx: &PromptContext) -> String {
    block(
        "Alerts Review",
        "Triage the open alerts.",
        ctx,
        &[
            "Group alerts by root cause",
            "Rate each group by user impact",
            "Recommend a follow-up task for every group that needs one",
        ],
    )
}

fn review_block(ctx: &PromptContext) -> String {
    block(
        "Review",
        "Review the implementation against its acceptance criteria.",
        ctx,
        &[
            "Check each acceptance criterion and state pass or fail with evidence",
            "Run the tests and note coverage gaps",
            "Set the story to done if everything passes, otherwise list required fixes",
        ],
    )
}

fn analysis_block(ctx: &PromptContext) -> String {
    block(
        "Analysis",
        "Produce or refine the project brief.",
        ctx,
        &[
            "State the problem, target users and constraints",
            "Summarize relevant research and competing solutions",
            "End with open questions for the product manager",
        ],
    )
}

fn requirements_block(ctx: &PromptContext) -> String {
    block(
        "Product Requirements",
        "Write or update the PRD.",
        ctx,
        &[
            "Include Goals, Requirements and Acceptance Criteria sections",
            "Keep every requirement testable",
            "Mark anything out of scope explicitly",
        ],
    )
}

fn architecture_block(ctx: &PromptContext) -> String {
    block(
        "Architecture",
        "Design or review the system architecture.",
        ctx,
        &[
            "Describe components, data flow and the tech stack",
            "Record each significant decision with its alternatives",
            "Call out risks and how the design mitigates them",
        ],
    )
}

fn general_block(ctx: &PromptContext) -> String {
    let mut out = format!("## Command: {}\n", normalize_command(&ctx.command));
    let task = task_lines(ctx);
    if !task.is_empty() {
        out.push('\n');
        out.push_str(&task);
    }
    out
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn role_header(agent: &Agent) -> String {
    format!(
        "# {} {} — {}\n\n{}\n",
        agent.icon, agent.name, agent.title, agent.role
    )
}

fn critical_actions(agent: &Agent) -> Option<String> {
    if agent.critical_actions.is_empty() {
        return None;
    }
    let mut out = String::from("## Critical Actions\n");
    for action in &agent.critical_actions {
        out.push_str(&format!("- {action}\n"));
    }
    Some(out)
}

fn subtasks_section(subtasks: &[Subtask]) -> Option<String> {
    if subtasks.is_empty() {
        return None;
    }
    let mut out = String::from("## Subtasks\n");
    for st in subtasks {
        let mark = if st.done { "x" } else { " " };
        match st.ac_mapping.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(ac) => out.push_str(&format!("- [{mark}] {} (AC: {ac})\n", st.title)),
            None => out.push_str(&format!("- [{mark}] {}\n", st.title)),
        }
    }
    Some(out)
}

/// Full instruction payload for `agent_id`; empty when the agent is unknown.
pub fn build_full_agent_prompt(
    registry: &AgentRegistry,
    agent_id: &str,
    ctx: &PromptContext,
) -> String {
    let Some(agent) = registry.get(agent_id) else {
        return String::new();
    };

    let mut sections: Vec<String> = vec![role_header(agent)];
    sections.extend(critical_actions(agent));
    sections.push(policy::build_isolation_instructions(registry, agent_id));
    sections.push(CommandFamily::for_command(&ctx.command).instructions(ctx));
    if let Some(ac) = present(&ctx.acceptance_criteria) {
        sections.push(format!("## Acceptance Criteria\n{ac}\n"));
    }
    sections.extend(subtasks_section(&ctx.subtasks));
    if let Some(docs) = present(&ctx.sharded_context) {
        sections.push(format!("## Project Context\n{docs}\n"));
    }
    if let Some(notes) = present(&ctx.dev_notes) {
        sections.push(format!("## Dev Notes\n{notes}\n"));
    }

    sections.join("\n")
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrichment {
    pub prompt: String,
    /// `None` when no agent owns the command and the prompt was passed through.
    pub agent_id: Option<String>,
}

/// Wrap a free-form prompt with the persona that owns `command`.
pub fn enrich_prompt_with_agent(registry: &AgentRegistry, command: &str, raw: &str) -> Enrichment {
    let Some(agent) = registry.agent_for_command(command) else {
        return Enrichment {
            prompt: raw.to_string(),
            agent_id: None,
        };
    };

    let mut sections: Vec<String> = vec![role_header(agent)];
    sections.extend(critical_actions(agent));
    sections.push(policy::build_isolation_instructions(registry, &agent.id));
    sections.push(format!("## Request\n{raw}\n"));

    Enrichment {
        prompt: sections.join("\n"),
        agent_id: Some(agent.id.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
