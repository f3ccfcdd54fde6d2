//! Stage exit checks.
//!
//! A gate is a pure function of a [`WorkflowState`] snapshot returning the
//! reasons it fails; no reasons means it passed.

use crate::shard::headings;
use crate::state::WorkflowState;
use crate::types::StoryStatus;
use serde::{Deserialize, Serialize};

pub const REQUIRED_PRD_SECTIONS: &[&str] = &["Goals", "Requirements", "Acceptance Criteria"];

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A fn-pointer gate, mirroring how stages name them.
#[derive(Clone, Copy)]
pub struct Gate {
    pub name: &'static str,
    pub description: &'static str,
    pub check: fn(&WorkflowState) -> Vec<String>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate: String,
    pub passed: bool,
    /// Failed, but excluded from the aggregate by an explicit override.
    #[serde(default)]
    pub overridden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub passed: bool,
    pub results: Vec<GateOutcome>,
    /// Override names that were requested for this evaluation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overridden: Vec<String>,
}

impl GateReport {
    /// Failing, non-overridden outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &GateOutcome> {
        self.results.iter().filter(|r| !r.passed && !r.overridden)
    }

    /// Every failure reason prefixed with its gate name.
    pub fn reasons(&self) -> Vec<String> {
        self.failures()
            .flat_map(|r| r.reasons.iter().map(move |reason| format!("[{}] {reason}", r.gate)))
            .collect()
    }

    /// Gates that failed but were let through.
    pub fn overridden_failures(&self) -> impl Iterator<Item = &GateOutcome> {
        self.results.iter().filter(|r| r.overridden)
    }
}

// ---------------------------------------------------------------------------
// GateSet
// ---------------------------------------------------------------------------

pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_gates())
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn get(&self, name: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.name == name)
    }

    /// Evaluate one gate. An unknown name fails.
    pub fn check(&self, state: &WorkflowState, name: &str) -> GateOutcome {
        let reasons = match self.get(name) {
            Some(gate) => (gate.check)(state),
            None => vec![format!("unknown gate '{name}'")],
        };
        GateOutcome {
            gate: name.to_string(),
            passed: reasons.is_empty(),
            overridden: false,
            reasons,
        }
    }

    pub fn check_all(&self, state: &WorkflowState, names: &[String]) -> GateReport {
        self.check_with_overrides(state, names, &[])
    }

    /// Like [`GateSet::check_all`], but failures of gates named in `overrides`
    /// do not count against the aggregate. They stay in the report, tagged.
    pub fn check_with_overrides(
        &self,
        state: &WorkflowState,
        names: &[String],
        overrides: &[String],
    ) -> GateReport {
        let results: Vec<GateOutcome> = names
            .iter()
            .map(|name| {
                let mut outcome = self.check(state, name);
                if !outcome.passed && overrides.iter().any(|o| o == name) {
                    outcome.overridden = true;
                }
                outcome
            })
            .collect();
        let passed = results.iter().all(|r| r.passed || r.overridden);
        GateReport {
            passed,
            results,
            overridden: overrides.to_vec(),
        }
    }
}

pub fn check_all_gates(state: &WorkflowState, names: &[String]) -> GateReport {
    GateSet::with_defaults().check_all(state, names)
}

pub fn check_gates_with_overrides(
    state: &WorkflowState,
    names: &[String],
    overrides: &[String],
) -> GateReport {
    GateSet::with_defaults().check_with_overrides(state, names, overrides)
}

// ---------------------------------------------------------------------------
// Built-in gates
// ---------------------------------------------------------------------------

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn check_brief_gate(state: &WorkflowState) -> Vec<String> {
    match non_blank(&state.brief) {
        Some(_) => Vec::new(),
        None => vec!["project brief is missing".to_string()],
    }
}

/// A PRD must exist and carry every section in [`REQUIRED_PRD_SECTIONS`].
pub fn check_prd_gate(state: &WorkflowState) -> Vec<String> {
    let Some(prd) = non_blank(&state.prd) else {
        return vec!["PRD is missing".to_string()];
    };
    let titles: Vec<String> = headings(prd)
        .into_iter()
        .map(|(_, t)| t.to_lowercase())
        .collect();
    REQUIRED_PRD_SECTIONS
        .iter()
        .filter(|section| {
            let wanted = section.to_lowercase();
            !titles.iter().any(|t| t.contains(&wanted))
        })
        .map(|section| format!("PRD is missing required section '{section}'"))
        .collect()
}

pub fn check_architecture_gate(state: &WorkflowState) -> Vec<String> {
    let Some(doc) = non_blank(&state.architecture) else {
        return vec!["architecture document is missing".to_string()];
    };
    if headings(doc).is_empty() {
        return vec!["architecture document has no sections".to_string()];
    }
    Vec::new()
}

pub fn check_stories_gate(state: &WorkflowState) -> Vec<String> {
    let mut reasons = Vec::new();
    if state.sprint.is_none() {
        reasons.push("no active sprint".to_string());
    }
    if state.stories.is_empty() {
        reasons.push("no stories have been written".to_string());
    }
    for story in state.stories.iter().filter(|s| !s.has_acceptance_criteria()) {
        reasons.push(format!(
            "story {} '{}' has no acceptance criteria",
            story.id, story.title
        ));
    }
    reasons
}

pub fn check_execution_gate(state: &WorkflowState) -> Vec<String> {
    if state.stories.is_empty() {
        return vec!["no stories to execute".to_string()];
    }
    let mut reasons = Vec::new();
    for story in &state.stories {
        if !story.status.is_implemented() {
            reasons.push(format!(
                "story {} '{}' is {}",
                story.id, story.title, story.status
            ));
            continue;
        }
        let open = story.subtasks.iter().filter(|t| !t.done).count();
        if open > 0 {
            reasons.push(format!(
                "story {} '{}' has {open} open subtask(s)",
                story.id, story.title
            ));
        }
    }
    reasons
}

pub fn check_review_gate(state: &WorkflowState) -> Vec<String> {
    if state.stories.is_empty() {
        return vec!["no stories to review".to_string()];
    }
    state
        .stories
        .iter()
        .filter(|s| s.status != StoryStatus::Done)
        .map(|s| format!("story {} '{}' is not approved ({})", s.id, s.title, s.status))
        .collect()
}

pub fn check_retro_gate(state: &WorkflowState) -> Vec<String> {
    match non_blank(&state.retrospective) {
        Some(_) => Vec::new(),
        None => vec!["retrospective has not been recorded".to_string()],
    }
}

pub fn default_gates() -> Vec<Gate> {
    vec![
        Gate {
            name: "brief",
            description: "Project brief exists",
            check: check_brief_gate,
        },
        Gate {
            name: "prd",
            description: "PRD exists with Goals, Requirements and Acceptance Criteria",
            check: check_prd_gate,
        },
        Gate {
            name: "architecture",
            description: "Architecture document exists and has sections",
            check: check_architecture_gate,
        },
        Gate {
            name: "stories",
            description: "Sprint has stories, each with acceptance criteria",
            check: check_stories_gate,
        },
        Gate {
            name: "execution",
            description: "Every story is implemented with all subtasks done",
            check: check_execution_gate,
        },
        Gate {
            name: "review",
            description: "Every story passed review",
            check: check_review_gate,
        },
        Gate {
            name: "retro",
            description: "Sprint retrospective recorded",
            check: check_retro_gate,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Subtask;
    use crate::state::{Sprint, Story};

    const GOOD_PRD: &str =
        "# Shop\n## Goals\nsell\n## Functional Requirements\ncart\n### Acceptance Criteria\npays";

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn done_story(id: &str) -> Story {
        let mut s = Story::new(id, format!("Story {id}"));
        s.status = StoryStatus::Done;
        s.acceptance_criteria = Some("AC-1".to_string());
        s
    }

    #[test]
    fn prd_gate_requires_document() {
        let state = WorkflowState::new("p");
        assert_eq!(check_prd_gate(&state), vec!["PRD is missing".to_string()]);
    }

    #[test]
    fn prd_gate_lists_missing_sections() {
        let mut state = WorkflowState::new("p");
        state.prd = Some("# Shop\n## Goals\nsell".to_string());
        let reasons = check_prd_gate(&state);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].contains("'Requirements'"));
        assert!(reasons[1].contains("'Acceptance Criteria'"));
    }

    #[test]
    fn prd_gate_passes_with_sections_at_any_depth() {
        let mut state = WorkflowState::new("p");
        state.prd = Some(GOOD_PRD.to_string());
        assert!(check_prd_gate(&state).is_empty());
    }

    #[test]
    fn stories_gate_flags_missing_criteria() {
        let mut state = WorkflowState::new("p");
        state.sprint = Some(Sprint {
            id: "s1".to_string(),
            goal: None,
        });
        state.stories = vec![done_story("S1"), Story::new("S2", "No AC")];
        let reasons = check_stories_gate(&state);
        assert_eq!(reasons, vec!["story S2 'No AC' has no acceptance criteria"]);
    }

    #[test]
    fn execution_gate_checks_subtasks() {
        let mut state = WorkflowState::new("p");
        let mut s = done_story("S1");
        s.status = StoryStatus::Review;
        s.subtasks.push(Subtask {
            title: "tests".to_string(),
            done: false,
            ac_mapping: None,
        });
        state.stories.push(s);
        let reasons = check_execution_gate(&state);
        assert_eq!(reasons, vec!["story S1 'Story S1' has 1 open subtask(s)"]);
    }

    #[test]
    fn aggregate_is_and_of_named_gates() {
        let mut state = WorkflowState::new("p");
        state.prd = Some(GOOD_PRD.to_string());
        let report = check_all_gates(&state, &names(&["prd", "retro"]));
        assert!(!report.passed);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].passed);
        assert_eq!(
            report.reasons(),
            vec!["[retro] retrospective has not been recorded"]
        );
    }

    #[test]
    fn empty_gate_list_passes() {
        let report = check_all_gates(&WorkflowState::new("p"), &[]);
        assert!(report.passed);
        assert!(report.results.is_empty());
    }

    #[test]
    fn unknown_gate_fails() {
        let report = check_all_gates(&WorkflowState::new("p"), &names(&["vibes"]));
        assert!(!report.passed);
        assert_eq!(report.reasons(), vec!["[vibes] unknown gate 'vibes'"]);
    }

    #[test]
    fn override_excludes_failure_but_keeps_it_visible() {
        let state = WorkflowState::new("p");
        let report =
            check_gates_with_overrides(&state, &names(&["brief", "prd"]), &names(&["prd"]));
        assert!(!report.passed, "brief still fails");

        let prd = &report.results[1];
        assert_eq!(prd.gate, "prd");
        assert!(!prd.passed);
        assert!(prd.overridden);
        assert_eq!(report.overridden, names(&["prd"]));
        assert!(report.reasons().iter().all(|r| r.starts_with("[brief]")));

        let report = check_gates_with_overrides(
            &state,
            &names(&["brief", "prd"]),
            &names(&["brief", "prd"]),
        );
        assert!(report.passed);
        assert_eq!(report.overridden_failures().count(), 2);
    }

    #[test]
    fn override_of_passing_gate_is_not_tagged() {
        let mut state = WorkflowState::new("p");
        state.brief = Some("pitch".to_string());
        let report = check_gates_with_overrides(&state, &names(&["brief"]), &names(&["brief"]));
        assert!(report.passed);
        assert!(!report.results[0].overridden);
        assert_eq!(report.overridden, names(&["brief"]));
    }

    #[test]
    fn review_gate_requires_done() {
        let mut state = WorkflowState::new("p");
        state.stories = vec![done_story("S1")];
        assert!(check_review_gate(&state).is_empty());
        state.stories[0].status = StoryStatus::Review;
        assert_eq!(check_review_gate(&state).len(), 1);
    }

    #[test]
    fn default_gate_names_are_unique() {
        let gates = default_gates();
        for (i, g) in gates.iter().enumerate() {
            assert!(gates[i + 1..].iter().all(|o| o.name != g.name), "{}", g.name);
        }
    }
}
