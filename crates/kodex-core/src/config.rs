//! Configuration management for Kodex
//!
//! This module handles loading and saving project-specific configuration
//! stored in `.kodex/config.toml` under the project root.

use crate::file_io::DEFAULT_MAX_FILE_CHARS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-project configuration directory
pub const CONFIG_DIR: &str = ".kodex";

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error while reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Tool limits inside the sandbox
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// File search settings
    #[serde(default)]
    pub finder: FinderConfig,

    /// Path fallback policy
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Planner loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Limits applied by the sandboxed tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Character cap for `read_file`
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,

    /// Wall-clock limit for `run_script`, in seconds
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,

    /// Interpreter used to run scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extension (without the dot) a script must carry
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
}

fn default_max_file_chars() -> usize {
    DEFAULT_MAX_FILE_CHARS
}

fn default_script_timeout_secs() -> u64 {
    30
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_file_chars: default_max_file_chars(),
            script_timeout_secs: default_script_timeout_secs(),
            interpreter: default_interpreter(),
            script_extension: default_script_extension(),
        }
    }
}

/// File search configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinderConfig {
    /// Directory names skipped in addition to the built-in deny-list
    #[serde(default)]
    pub extra_ignored_dirs: Vec<String>,
}

/// When a bare file name given to `write_file` may be redirected
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WriteFallback {
    /// Always write exactly where asked
    Never,
    /// Redirect a missing bare name (no separator, at most one dot) to an
    /// existing file of the same name elsewhere in the tree
    #[default]
    BareName,
}

/// Fallback policy applied when a requested path does not exist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolverConfig {
    /// Look up missing files by name for `read_file`
    #[serde(default = "default_true")]
    pub read_fallback: bool,

    /// Look up missing scripts by name for `run_script`
    #[serde(default = "default_true")]
    pub run_fallback: bool,

    /// Redirect policy for `write_file`
    #[serde(default)]
    pub write_fallback: WriteFallback,
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            read_fallback: true,
            run_fallback: true,
            write_fallback: WriteFallback::default(),
        }
    }
}

/// Planner loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum planner round-trips per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_max_iterations() -> u32 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Config {
    /// Load configuration from the project's `.kodex` directory.
    ///
    /// A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(project_root: P) -> Result<Self, ConfigError> {
        let config_path = Self::path_for(project_root);

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the project's `.kodex` directory
    pub fn save<P: AsRef<Path>>(&self, project_root: P) -> Result<(), ConfigError> {
        let config_dir = project_root.as_ref().join(CONFIG_DIR);

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(Self::path_for(project_root), contents)?;

        Ok(())
    }

    /// Location of the config file for a project root
    pub fn path_for<P: AsRef<Path>>(project_root: P) -> PathBuf {
        project_root.as_ref().join(CONFIG_DIR).join("config.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid("agent.max_iterations must be at least 1".into()));
        }
        if self.sandbox.script_timeout_secs == 0 {
            return Err(ConfigError::Invalid("sandbox.script_timeout_secs must be at least 1".into()));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox.interpreter must not be empty".into()));
        }
        Ok(())
    }
}
