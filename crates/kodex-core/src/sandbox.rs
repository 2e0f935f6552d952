//! Path containment for the project sandbox
//!
//! Every path a tool touches is resolved through [`SandboxRoot::resolve`],
//! which rejects anything that would land outside the project root. The check
//! is purely lexical: `.` and `..` are folded without consulting the
//! filesystem, so symlinks inside the tree are not followed or verified.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while resolving sandboxed paths
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The requested path escapes the sandbox root
    #[error("\"{0}\" is outside the project root")]
    OutsideRoot(String),

    /// The root itself could not be opened
    #[error("Invalid sandbox root {path}: {source}")]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root exists but is not a directory
    #[error("Sandbox root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Absolute, canonical directory below which every tool path must resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot(PathBuf);

impl SandboxRoot {
    /// Canonicalize `root` and wrap it. The directory must already exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|source| SandboxError::InvalidRoot {
            path: root.to_path_buf(),
            source,
        })?;

        if !canonical.is_dir() {
            return Err(SandboxError::NotADirectory(canonical));
        }

        Ok(Self(canonical))
    }

    /// The absolute root path
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Resolve a caller-supplied path against the root.
    ///
    /// Returns the normalized absolute path when it equals the root or is a
    /// descendant of it. No I/O is performed.
    pub fn resolve(&self, requested: impl AsRef<Path>) -> Result<PathBuf, SandboxError> {
        let requested = requested.as_ref();
        let joined = self.0.join(requested);
        let normalized = normalize(&joined);

        // Path::starts_with compares whole components, so "/proj-evil" does
        // not count as inside "/proj".
        if normalized.starts_with(&self.0) {
            Ok(normalized)
        } else {
            tracing::warn!(
                requested = %requested.display(),
                root = %self.0.display(),
                "rejected path outside sandbox root"
            );
            Err(SandboxError::OutsideRoot(requested.display().to_string()))
        }
    }

    /// Render a contained path relative to the root with `/` separators.
    ///
    /// The root itself renders as `.`; paths outside the root render as-is.
    pub fn relative(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        match path.strip_prefix(&self.0) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => to_slash(rel),
            Err(_) => path.display().to_string(),
        }
    }
}

impl AsRef<Path> for SandboxRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Fold `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Join the normal components of a relative path with `/`
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
