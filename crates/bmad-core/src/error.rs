use thiserror::Error;

#[derive(Debug, Error)]
pub enum BmadError {
    #[error("not initialized: run 'bmad init'")]
    NotInitialized,

    #[error("duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("command '{command}' is claimed by both '{first}' and '{second}'")]
    CommandConflict {
        command: String,
        first: String,
        second: String,
    },

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("invalid project id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidProjectId(String),

    #[error("no pipeline run recorded for this project")]
    NoActiveRun,

    #[error("reasoning engine failed: {0}")]
    Engine(String),

    #[error("state unavailable: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BmadError>;
