use crate::error::{BmadError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DOCS_DIR: &str = ".bmad/docs";

pub const CONFIG_FILE: &str = ".bmad/config.yaml";
pub const STATE_FILE: &str = ".bmad/state.yaml";
pub const RUN_FILE: &str = ".bmad/run.yaml";

pub const BRIEF_DOC: &str = "brief";
pub const PRD_DOC: &str = "prd";
pub const ARCHITECTURE_DOC: &str = "architecture";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn run_path(root: &Path) -> PathBuf {
    root.join(RUN_FILE)
}

pub fn docs_dir(root: &Path) -> PathBuf {
    root.join(DOCS_DIR)
}

/// `.bmad/docs/<name>.md`
pub fn doc_path(root: &Path, name: &str) -> PathBuf {
    docs_dir(root).join(format!("{name}.md"))
}

// ---------------------------------------------------------------------------
// Project id validation
// ---------------------------------------------------------------------------

static PROJECT_ID_RE: OnceLock<Regex> = OnceLock::new();

fn project_id_re() -> &'static Regex {
    PROJECT_ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_project_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !project_id_re().is_match(id) {
        return Err(BmadError::InvalidProjectId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
