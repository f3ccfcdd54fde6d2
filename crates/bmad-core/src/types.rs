use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ModifyCode,
    ModifyArchitecture,
    ModifyPrd,
    CreateTasks,
    ReviewCode,
    DeployToProduction,
}

impl Capability {
    pub fn all() -> &'static [Capability] {
        &[
            Capability::ModifyCode,
            Capability::ModifyArchitecture,
            Capability::ModifyPrd,
            Capability::CreateTasks,
            Capability::ReviewCode,
            Capability::DeployToProduction,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ModifyCode => "can_modify_code",
            Capability::ModifyArchitecture => "can_modify_architecture",
            Capability::ModifyPrd => "can_modify_prd",
            Capability::CreateTasks => "can_create_tasks",
            Capability::ReviewCode => "can_review_code",
            Capability::DeployToProduction => "can_deploy_to_production",
        }
    }

    /// The line rendered into isolation instructions when the flag is false.
    pub fn restriction(self) -> &'static str {
        match self {
            Capability::ModifyCode => "Modify application source code",
            Capability::ModifyArchitecture => "Modify architecture decisions or architecture documents",
            Capability::ModifyPrd => "Modify the PRD or product requirements",
            Capability::CreateTasks => "Create, split or reprioritize tasks and stories",
            Capability::ReviewCode => "Approve or reject code reviews",
            Capability::DeployToProduction => "Deploy to production or touch production infrastructure",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = crate::error::BmadError;

    /// Accepts `can_modify_code`, `canModifyCode` and `modify_code` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        let key = normalized.strip_prefix("can").unwrap_or(&normalized);
        match key {
            "modifycode" => Ok(Capability::ModifyCode),
            "modifyarchitecture" => Ok(Capability::ModifyArchitecture),
            "modifyprd" => Ok(Capability::ModifyPrd),
            "createtasks" => Ok(Capability::CreateTasks),
            "reviewcode" => Ok(Capability::ReviewCode),
            "deploytoproduction" => Ok(Capability::DeployToProduction),
            _ => Err(crate::error::BmadError::UnknownCapability(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StoryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    #[default]
    Draft,
    Ready,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl StoryStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, StoryStatus::Done)
    }

    /// Implementation work is over; the story is in or past review.
    pub fn is_implemented(self) -> bool {
        matches!(self, StoryStatus::Review | StoryStatus::Done)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoryStatus::Draft => "draft",
            StoryStatus::Ready => "ready",
            StoryStatus::InProgress => "in_progress",
            StoryStatus::Review => "review",
            StoryStatus::Done => "done",
            StoryStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn capability_roundtrip() {
        for cap in Capability::all() {
            assert_eq!(Capability::from_str(cap.as_str()).unwrap(), *cap);
        }
    }

    #[test]
    fn capability_accepts_camel_case() {
        assert_eq!(
            Capability::from_str("canModifyArchitecture").unwrap(),
            Capability::ModifyArchitecture
        );
        assert_eq!(Capability::from_str("review_code").unwrap(), Capability::ReviewCode);
        assert!(Capability::from_str("canFly").is_err());
    }

    #[test]
    fn story_status_progress() {
        assert!(StoryStatus::Review.is_implemented());
        assert!(!StoryStatus::Review.is_finished());
        assert!(StoryStatus::Done.is_finished());
        assert!(!StoryStatus::InProgress.is_implemented());
    }
}
