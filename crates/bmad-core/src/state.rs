use crate::error::Result;
use crate::paths;
use crate::prompt::{PromptContext, Subtask};
use crate::types::StoryStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default)]
    pub status: StoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_notes: Option<String>,
}

impl Story {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            priority: None,
            status: StoryStatus::Draft,
            acceptance_criteria: None,
            subtasks: Vec::new(),
            dev_notes: None,
        }
    }

    pub fn has_acceptance_criteria(&self) -> bool {
        self.acceptance_criteria
            .as_deref()
            .is_some_and(|ac| !ac.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Snapshot of one project's delivery state. Gates read nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint: Option<Sprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default)]
    pub stories: Vec<Story>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrospective: Option<String>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl WorkflowState {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            sprint: None,
            brief: None,
            prd: None,
            architecture: None,
            stories: Vec::new(),
            retrospective: None,
            last_updated: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::state_path(root);
        if !path.exists() {
            return Err(crate::error::BmadError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: WorkflowState = serde_yaml::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::state_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Like [`save`](Self::save), but an existing state file wins.
    pub fn create(&self, root: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(self)?;
        crate::io::create_new(&paths::state_path(root), data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The story work should focus on: the first unfinished one, lowest
    /// priority number first.
    pub fn active_story(&self) -> Option<&Story> {
        self.stories
            .iter()
            .filter(|s| !s.status.is_finished())
            .min_by_key(|s| s.priority.unwrap_or(u8::MAX))
    }

    pub fn sprint_id(&self) -> Option<&str> {
        self.sprint.as_ref().map(|s| s.id.as_str())
    }

    /// Prompt context for `command`, filled from the active story.
    pub fn prompt_context(&self, command: &str) -> PromptContext {
        let mut ctx = PromptContext::new(command);
        ctx.sprint_id = self.sprint_id().map(str::to_string);
        if let Some(story) = self.active_story() {
            ctx.task_title = Some(story.title.clone());
            ctx.task_description = story.description.clone();
            ctx.priority = story.priority;
            ctx.acceptance_criteria = story.acceptance_criteria.clone();
            ctx.subtasks = story.subtasks.clone();
            ctx.dev_notes = story.dev_notes.clone();
        }
        ctx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn story(id: &str, priority: u8, status: StoryStatus) -> Story {
        let mut s = Story::new(id, format!("Story {id}"));
        s.priority = Some(priority);
        s.status = status;
        s
    }

    #[test]
    fn active_story_prefers_priority_among_unfinished() {
        let mut state = WorkflowState::new("proj");
        state.stories = vec![
            story("S1", 1, StoryStatus::Done),
            story("S2", 3, StoryStatus::Ready),
            story("S3", 2, StoryStatus::InProgress),
        ];
        assert_eq!(state.active_story().unwrap().id, "S3");
    }

    #[test]
    fn active_story_none_when_all_done() {
        let mut state = WorkflowState::new("proj");
        state.stories = vec![story("S1", 1, StoryStatus::Done)];
        assert!(state.active_story().is_none());
    }

    #[test]
    fn prompt_context_copies_story_fields() {
        let mut state = WorkflowState::new("proj");
        state.sprint = Some(Sprint {
            id: "sprint-1".to_string(),
            goal: None,
        });
        let mut s = story("S1", 2, StoryStatus::Ready);
        s.acceptance_criteria = Some("AC-1: works".to_string());
        s.subtasks.push(Subtask {
            title: "wire it".to_string(),
            done: false,
            ac_mapping: Some("AC-1".to_string()),
        });
        state.stories.push(s);

        let ctx = state.prompt_context("exec");
        assert_eq!(ctx.command, "exec");
        assert_eq!(ctx.sprint_id.as_deref(), Some("sprint-1"));
        assert_eq!(ctx.task_title.as_deref(), Some("Story S1"));
        assert_eq!(ctx.priority, Some(2));
        assert_eq!(ctx.subtasks.len(), 1);
    }

    #[test]
    fn state_yaml_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut state = WorkflowState::new("proj");
        state.prd = Some("# Goals\nship".to_string());
        state.stories.push(story("S1", 1, StoryStatus::Review));
        state.save(dir.path()).unwrap();

        let loaded = WorkflowState::load(dir.path()).unwrap();
        assert_eq!(loaded.project, "proj");
        assert_eq!(loaded.stories[0].status, StoryStatus::Review);
        assert_eq!(loaded.prd.as_deref(), Some("# Goals\nship"));
    }

    #[test]
    fn load_without_state_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkflowState::load(dir.path()),
            Err(crate::error::BmadError::NotInitialized)
        ));
    }

    #[test]
    fn create_keeps_existing_state() {
        let dir = TempDir::new().unwrap();
        let mut state = WorkflowState::new("shop");
        state.brief = Some("kept".to_string());
        state.save(dir.path()).unwrap();

        assert!(!WorkflowState::new("shop").create(dir.path()).unwrap());
        let loaded = WorkflowState::load(dir.path()).unwrap();
        assert_eq!(loaded.brief.as_deref(), Some("kept"));
    }

    #[test]
    fn minimal_yaml_parses() {
        let yaml = "project: demo\nlast_updated: 2026-01-01T00:00:00Z\nstories:\n  - id: S1\n    title: Login\n";
        let state: WorkflowState = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(state.stories[0].status, StoryStatus::Draft);
        assert!(state.sprint.is_none());
    }
}
