//! Opening a project directory as a sandboxed session context
//!
//! A [`Project`] bundles the canonical sandbox root with the configuration
//! loaded from it. It is built once at startup and handed to the tool
//! dispatcher and the agent loop; nothing about it is global.

use crate::config::Config;
use crate::error::Result;
use crate::finder::FileFinder;
use crate::sandbox::SandboxRoot;
use std::path::Path;

/// A project root plus its configuration
#[derive(Debug, Clone)]
pub struct Project {
    /// Canonical sandbox root
    pub root: SandboxRoot,
    /// Configuration loaded from `.kodex/config.toml`
    pub config: Config,
}

impl Project {
    /// Open `path` as a project, loading its configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = SandboxRoot::new(path)?;
        let config = Config::load(root.path())?;

        tracing::debug!(root = %root.path().display(), "opened project");
        Ok(Self { root, config })
    }

    /// Open a project with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        Ok(Self {
            root: SandboxRoot::new(path)?,
            config,
        })
    }

    /// A finder over this project honoring the configured deny-list
    pub fn finder(&self) -> FileFinder {
        FileFinder::new(self.root.clone())
            .with_extra_ignored_dirs(self.config.finder.extra_ignored_dirs.iter().cloned())
    }

    /// Project name, taken from the root directory name
    pub fn name(&self) -> String {
        self.root
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }
}
