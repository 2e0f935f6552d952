//! System instructions for the planner
//!
//! The built-in prompt describes the available operations. A project can
//! append its own guidance in `.kodex/instructions.md`.

use kodex_core::config::CONFIG_DIR;
use std::path::{Path, PathBuf};

/// File name of project-specific instructions inside the config directory
pub const INSTRUCTIONS_FILE: &str = "instructions.md";

/// Built-in system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI coding agent with access to a project's codebase.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:
- List files and directories
- Find files by exact name or by a partial name
- Read file contents
- Execute Python files with optional arguments
- Write or overwrite files

All paths you provide should be relative to the project root directory. You do not need to specify a working directory in your function calls; it is injected automatically and any value you pass is ignored.

If you are unsure where a file lives, search for it before reading or running it. Explore the codebase to understand its structure before changing anything, and answer in plain text once you are done.";

/// Assembles the system instructions for a project
#[derive(Debug, Clone)]
pub struct DirectiveManager {
    /// Path to the project instructions file
    instructions_path: PathBuf,
}

impl DirectiveManager {
    /// Create a directive manager for a project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            instructions_path: project_root.as_ref().join(CONFIG_DIR).join(INSTRUCTIONS_FILE),
        }
    }

    /// Location of the project instructions file
    pub fn instructions_path(&self) -> &Path {
        &self.instructions_path
    }

    /// Built-in prompt followed by the project instructions, if present
    pub fn assemble_system_prompt(&self) -> String {
        match std::fs::read_to_string(&self.instructions_path) {
            Ok(extra) if !extra.trim().is_empty() => {
                tracing::debug!(path = %self.instructions_path.display(), "appending project instructions");
                format!("{}\n\n# Project instructions\n\n{}", DEFAULT_SYSTEM_PROMPT, extra.trim())
            }
            Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_SYSTEM_PROMPT.to_string(),
            Err(e) => {
                tracing::warn!(
                    path = %self.instructions_path.display(),
                    error = %e,
                    "could not read project instructions"
                );
                DEFAULT_SYSTEM_PROMPT.to_string()
            }
        }
    }
}
