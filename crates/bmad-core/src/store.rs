//! File-backed collaborators over a `.bmad/` directory.
//!
//! State lives in `.bmad/state.yaml`; documents are the markdown files under
//! `.bmad/docs/`. The brief, PRD and architecture documents, when present on
//! disk, take precedence over the matching fields in the state file.

use crate::collab::{DocumentSource, ProjectDocument, StateStore};
use crate::error::{BmadError, Result};
use crate::paths;
use crate::state::WorkflowState;
use std::path::PathBuf;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn write_document(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = paths::doc_path(&self.root, name);
        crate::io::atomic_write(&path, content.as_bytes())?;
        Ok(path)
    }

    fn read_document(&self, name: &str) -> Result<Option<String>> {
        let path = paths::doc_path(&self.root, name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(content).filter(|c| !c.trim().is_empty()))
    }

    fn check_project(&self, state: &WorkflowState, project_id: &str) -> Result<()> {
        if state.project != project_id {
            return Err(BmadError::Store(format!(
                "{} belongs to project '{}', not '{project_id}'",
                paths::STATE_FILE,
                state.project
            )));
        }
        Ok(())
    }
}

impl StateStore for FileStore {
    fn load_state(&self, project_id: &str) -> Result<WorkflowState> {
        let mut state = WorkflowState::load(&self.root)?;
        self.check_project(&state, project_id)?;

        if let Some(brief) = self.read_document(paths::BRIEF_DOC)? {
            state.brief = Some(brief);
        }
        if let Some(prd) = self.read_document(paths::PRD_DOC)? {
            state.prd = Some(prd);
        }
        if let Some(architecture) = self.read_document(paths::ARCHITECTURE_DOC)? {
            state.architecture = Some(architecture);
        }
        Ok(state)
    }
}

impl DocumentSource for FileStore {
    fn load_documents(&self, project_id: &str) -> Result<Vec<ProjectDocument>> {
        let state = WorkflowState::load(&self.root)?;
        self.check_project(&state, project_id)?;

        let dir = paths::docs_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            documents.push(ProjectDocument::new(name, content));
        }
        Ok(documents)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::ShardCache;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        WorkflowState::new("shop").save(dir.path()).unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn documents_overlay_state_fields() {
        let (_dir, store) = setup();
        store.write_document("prd", "# Goals\nSell things").unwrap();
        store.write_document("notes", "scratch").unwrap();

        let state = store.load_state("shop").unwrap();
        assert_eq!(state.prd.as_deref(), Some("# Goals\nSell things"));
        assert!(state.brief.is_none());
    }

    #[test]
    fn blank_document_does_not_overlay() {
        let (dir, store) = setup();
        let mut state = WorkflowState::new("shop");
        state.brief = Some("kept".to_string());
        state.save(dir.path()).unwrap();
        store.write_document("brief", "  \n").unwrap();

        let loaded = store.load_state("shop").unwrap();
        assert_eq!(loaded.brief.as_deref(), Some("kept"));
    }

    #[test]
    fn documents_load_sorted_by_name() {
        let (_dir, store) = setup();
        store.write_document("prd", "# PRD").unwrap();
        store.write_document("architecture", "# Arch").unwrap();

        let docs = store.load_documents("shop").unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["architecture", "prd"]);
    }

    #[test]
    fn missing_docs_dir_is_empty() {
        let (_dir, store) = setup();
        assert!(store.load_documents("shop").unwrap().is_empty());
    }

    #[test]
    fn other_project_is_rejected() {
        let (_dir, store) = setup();
        assert!(matches!(
            store.load_state("billing"),
            Err(BmadError::Store(_))
        ));
        assert!(store.load_documents("billing").is_err());
    }

    #[test]
    fn uninitialized_root() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.load_state("shop"),
            Err(BmadError::NotInitialized)
        ));
    }

    #[test]
    fn cache_sees_edit_after_invalidation() {
        let (dir, store) = setup();
        store.write_document("prd", "# Goals\nold goal").unwrap();
        let cache = ShardCache::new(Arc::new(FileStore::new(dir.path())));

        let before = cache.get_document_shards("shop").unwrap();
        assert!(before[0].content.contains("old goal"));

        store.write_document("prd", "# Goals\nnew goal").unwrap();
        cache.invalidate_project("shop");
        let after = cache.get_document_shards("shop").unwrap();
        assert!(after[0].content.contains("new goal"));
    }
}
