//! Run data model.

use crate::error::{BmadError, Result};
use crate::gate::GateReport;
use crate::paths;
use crate::pipeline::PipelineKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a run.
///
/// Transitions: `Pending → Running → Advanced | Blocked | Completed`. An
/// `Advanced` or `Blocked` run goes back to `Running` on the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Advanced,
    Blocked { reasons: Vec<String> },
    Completed,
}

impl RunStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, RunStatus::Blocked { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Advanced => "advanced",
            RunStatus::Blocked { .. } => "blocked",
            RunStatus::Completed => "completed",
        }
    }
}

// ---------------------------------------------------------------------------
// StageRecord
// ---------------------------------------------------------------------------

/// One attempt at one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage_index: usize,
    pub label: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub passed: bool,
    /// Absent when the attempt stopped before gates were evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<GateReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub pipeline: PipelineKind,
    pub project_id: String,
    pub stage_index: usize,
    pub status: RunStatus,
    #[serde(default)]
    pub history: Vec<StageRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(pipeline: PipelineKind, project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pipeline,
            project_id: project_id.into(),
            stage_index: 0,
            status: RunStatus::Pending,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// The latest attempt at the current stage, if the run was blocked there
    /// after its gates were evaluated.
    pub fn gated_block_attempt(&self) -> Option<&StageRecord> {
        if !self.status.is_blocked() {
            return None;
        }
        self.history
            .last()
            .filter(|r| r.stage_index == self.stage_index && r.report.is_some())
    }

    /// Names of gates whose failures were overridden anywhere in this run.
    pub fn overridden_gates(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in self.history.iter().filter(|r| r.passed) {
            let Some(report) = &record.report else {
                continue;
            };
            for outcome in report.overridden_failures() {
                if !out.contains(&outcome.gate) {
                    out.push(outcome.gate.clone());
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::run_path(root);
        if !path.exists() {
            return Err(BmadError::NoActiveRun);
        }
        let data = std::fs::read_to_string(&path)?;
        let run: PipelineRun = serde_yaml::from_str(&data)?;
        Ok(run)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::run_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
