//! Boundaries to the collaborators the core drives but does not own.
//!
//! Implementations may block or fail; callers never hold a cache lock while
//! calling into them.

use crate::error::Result;
use crate::state::WorkflowState;
use serde::{Deserialize, Serialize};

/// A named project document (PRD, architecture, brief, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub name: String,
    pub content: String,
}

impl ProjectDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Executes one assembled instruction string and returns free-form output.
pub trait ReasoningEngine {
    fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Supplies the current workflow snapshot for a project.
pub trait StateStore {
    fn load_state(&self, project_id: &str) -> Result<WorkflowState>;
}

/// Supplies the current documents for a project.
pub trait DocumentSource: Send + Sync {
    fn load_documents(&self, project_id: &str) -> Result<Vec<ProjectDocument>>;
}
