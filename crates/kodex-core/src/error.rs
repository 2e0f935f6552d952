//! Error types for Kodex Core
//!
//! This module provides a unified error type for core operations.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::file_io::FileIoError;
pub use crate::finder::FindError;
pub use crate::sandbox::SandboxError;

/// Top-level error type for Kodex Core operations
#[derive(Error, Debug)]
pub enum KodexCoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sandbox root or containment error
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// File I/O error
    #[error("File I/O error: {0}")]
    FileIo(#[from] FileIoError),

    /// File search error
    #[error("Search error: {0}")]
    Find(#[from] FindError),
}

impl From<std::io::Error> for KodexCoreError {
    fn from(err: std::io::Error) -> Self {
        KodexCoreError::FileIo(FileIoError::from(err))
    }
}

/// Result type for Kodex Core operations
pub type Result<T> = std::result::Result<T, KodexCoreError>;
