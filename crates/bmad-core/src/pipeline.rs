use crate::agent::normalize_command;
use crate::error::BmadError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PipelineKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    #[default]
    Default,
    Quick,
    Review,
}

impl PipelineKind {
    pub fn all() -> &'static [PipelineKind] {
        &[PipelineKind::Default, PipelineKind::Quick, PipelineKind::Review]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineKind::Default => "default",
            PipelineKind::Quick => "quick",
            PipelineKind::Review => "review",
        }
    }

    pub fn pipeline(self) -> Pipeline {
        match self {
            PipelineKind::Default => default_pipeline(),
            PipelineKind::Quick => quick_pipeline(),
            PipelineKind::Review => review_pipeline(),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineKind {
    type Err = BmadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "full" => Ok(PipelineKind::Default),
            "quick" => Ok(PipelineKind::Quick),
            "review" => Ok(PipelineKind::Review),
            _ => Err(BmadError::UnknownPipeline(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage / Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub command: String,
    pub required_gates: Vec<String>,
    pub label: String,
}

impl Stage {
    fn new(command: &str, gates: &[&str], label: &str) -> Self {
        Self {
            command: command.to_string(),
            required_gates: gates.iter().map(|g| g.to_string()).collect(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub kind: PipelineKind,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }
}

/// analysis → PRD → architecture → stories → execution → review → retro
pub fn default_pipeline() -> Pipeline {
    Pipeline {
        kind: PipelineKind::Default,
        stages: vec![
            Stage::new("brief", &["brief"], "Analysis"),
            Stage::new("prd", &["prd"], "Product Requirements"),
            Stage::new("architecture", &["architecture"], "Architecture"),
            Stage::new("stories", &["stories"], "Story Preparation"),
            Stage::new("exec", &["execution"], "Execution"),
            Stage::new("review", &["review"], "Review"),
            Stage::new("retro", &["retro"], "Retrospective"),
        ],
    }
}

/// Skips analysis, architecture and retro; story preparation is ungated.
pub fn quick_pipeline() -> Pipeline {
    Pipeline {
        kind: PipelineKind::Quick,
        stages: vec![
            Stage::new("prd", &["prd"], "Product Requirements"),
            Stage::new("stories", &[], "Story Preparation"),
            Stage::new("exec", &["execution"], "Execution"),
            Stage::new("review", &["review"], "Review"),
        ],
    }
}

pub fn review_pipeline() -> Pipeline {
    Pipeline {
        kind: PipelineKind::Review,
        stages: vec![
            Stage::new("exec", &["execution"], "Execution"),
            Stage::new("review", &["review"], "Review"),
        ],
    }
}

/// First stage running `command`, searching the pipelines in
/// [`PipelineKind::all`] order.
pub fn stage_for_command(command: &str) -> Option<Stage> {
    let wanted = normalize_command(command);
    PipelineKind::all()
        .iter()
        .flat_map(|kind| kind.pipeline().stages)
        .find(|stage| stage.command == wanted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
