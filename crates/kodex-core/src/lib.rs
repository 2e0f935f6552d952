//! Kodex Core - sandbox, file primitives, and configuration for Kodex
//!
//! This crate provides the foundational pieces the tool layer is built on:
//! - Path containment against a project root
//! - File listing, reading, and writing primitives
//! - Recursive file search
//! - Project configuration and error handling

pub mod config;
pub mod error;
pub mod file_io;
pub mod finder;
pub mod project;
pub mod sandbox;

pub use config::{AgentConfig, Config, ConfigError, ResolverConfig, SandboxConfig, WriteFallback};
pub use error::{KodexCoreError, Result};
pub use file_io::{DirectoryEntry, FileIoError, FileText};
pub use finder::{FileFinder, FindError, FindOutcome, FindQuery, MatchKind, SearchMatch};
pub use project::Project;
pub use sandbox::{SandboxError, SandboxRoot};
