pub mod agents;
pub mod gate;
pub mod init;
pub mod pipelines;
pub mod prompt;
pub mod run;
pub mod shards;

use anyhow::Context;
use bmad_core::agent::AgentRegistry;
use bmad_core::config::{Config, WarnLevel};
use bmad_core::shard::ShardCache;
use bmad_core::store::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An initialized project: its config and file-backed store.
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub store: FileStore,
}

impl Project {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load .bmad/config.yaml")?;
        for warning in config.validate() {
            match warning.level {
                WarnLevel::Error => anyhow::bail!("invalid config: {}", warning.message),
                WarnLevel::Warning => tracing::warn!("config: {}", warning.message),
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store: FileStore::new(root),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.project.id
    }

    pub fn shard_cache(&self) -> ShardCache {
        ShardCache::new(Arc::new(FileStore::new(&self.root)))
            .with_max_context_chars(self.config.context.max_chars)
    }
}

pub fn registry() -> anyhow::Result<AgentRegistry> {
    AgentRegistry::with_defaults().context("built-in agent table is inconsistent")
}
