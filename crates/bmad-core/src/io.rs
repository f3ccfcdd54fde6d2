//! Crash-safe writes for files under `.bmad/`.

use crate::error::Result;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Stage `data` beside `path`, creating missing parent directories, so a
/// reader only ever sees the old file or the complete new one.
fn stage(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Replace `path` with `data`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    stage(path, data)?.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `path` with `data`. An existing file is left untouched and
/// `false` returned.
pub fn create_new(path: &Path, data: &[u8]) -> Result<bool> {
    match stage(path, data)?.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_creates_docs_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".bmad/docs/prd.md");
        atomic_write(&path, b"# Goals").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Goals");
    }

    #[test]
    fn rewrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.yaml");
        atomic_write(&path, b"status: running").unwrap();
        atomic_write(&path, b"status: completed").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "status: completed"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn create_new_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".bmad/config.yaml");
        assert!(create_new(&path, b"project: first").unwrap());
        assert!(!create_new(&path, b"project: second").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "project: first");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
