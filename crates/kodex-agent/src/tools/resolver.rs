//! Path resolution with same-name fallback
//!
//! Every path a tool receives is resolved here exactly once. Containment is
//! checked first; only a contained path that does not exist may be
//! redirected to an existing file of the same name found elsewhere in the
//! project.

use super::ToolError;
use kodex_core::{FileFinder, FindQuery, ResolverConfig, SandboxRoot, WriteFallback};
use std::path::{Path, PathBuf};

/// What the caller intends to do with the path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// List a directory
    List,
    /// Read a file
    Read,
    /// Write a file
    Write,
    /// Execute a script
    Run,
}

impl Purpose {
    /// Verb used in containment errors
    fn action(&self) -> &'static str {
        match self {
            Purpose::List => "list",
            Purpose::Read => "read",
            Purpose::Write => "write to",
            Purpose::Run => "execute",
        }
    }
}

/// Where a resolved path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The path the caller asked for
    Direct,
    /// An existing file found by name after the requested path was missing
    Fallback {
        /// The path originally requested
        requested: String,
    },
}

/// A resolved, contained path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path inside the sandbox root
    pub path: PathBuf,
    /// Path relative to the root with `/` separators
    pub relative: String,
    /// How the path was obtained
    pub origin: Origin,
}

impl Candidate {
    /// Whether the path was redirected
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, Origin::Fallback { .. })
    }
}

/// Resolves tool paths against the sandbox root
#[derive(Debug, Clone)]
pub struct PathResolver {
    finder: FileFinder,
    config: ResolverConfig,
}

impl PathResolver {
    /// Create a resolver using `finder` for fallback lookups
    pub fn new(finder: FileFinder, config: ResolverConfig) -> Self {
        Self { finder, config }
    }

    /// The sandbox root
    pub fn root(&self) -> &SandboxRoot {
        self.finder.root()
    }

    /// The finder used for fallback lookups
    pub fn finder(&self) -> &FileFinder {
        &self.finder
    }

    /// Resolve `hint` for the given purpose.
    ///
    /// Returns [`ToolError::OutsideRoot`] before any filesystem access when
    /// the path escapes the root.
    pub fn resolve(&self, hint: &str, purpose: Purpose) -> Result<Candidate, ToolError> {
        let root = self.root();
        let path = root.resolve(hint).map_err(|_| ToolError::OutsideRoot {
            action: purpose.action(),
            path: hint.to_string(),
        })?;

        let direct = |path: PathBuf| Candidate {
            relative: root.relative(&path),
            path,
            origin: Origin::Direct,
        };

        match purpose {
            Purpose::List => Ok(direct(path)),
            Purpose::Read | Purpose::Run => {
                if path.is_file() {
                    return Ok(direct(path));
                }

                let enabled = match purpose {
                    Purpose::Read => self.config.read_fallback,
                    _ => self.config.run_fallback,
                };
                if !enabled {
                    return Err(ToolError::NotFound(hint.to_string()));
                }

                let name = file_name(hint).ok_or_else(|| ToolError::NotFound(hint.to_string()))?;
                self.lookup(hint, &name)?
                    .ok_or_else(|| ToolError::NotFoundAnywhere {
                        path: hint.to_string(),
                        name,
                    })
            }
            Purpose::Write => {
                let redirect = self.config.write_fallback == WriteFallback::BareName
                    && is_bare_name(hint)
                    && !path.exists();
                if !redirect {
                    return Ok(direct(path));
                }

                match self.lookup(hint, hint)? {
                    Some(candidate) => Ok(candidate),
                    None => Ok(direct(path)),
                }
            }
        }
    }

    /// Find the first exact-name match for `name`
    fn lookup(&self, requested: &str, name: &str) -> Result<Option<Candidate>, ToolError> {
        let outcome = self.finder.find(&FindQuery::by_name(name))?;
        let Some(found) = outcome.first_exact() else {
            tracing::debug!(requested, name, "no same-name file to fall back to");
            return Ok(None);
        };

        let path = self.root().resolve(&found.path).map_err(|_| ToolError::OutsideRoot {
            action: "resolve",
            path: found.path.clone(),
        })?;

        tracing::warn!(
            requested,
            resolved = %found.path,
            "requested path missing, using same-name file"
        );

        Ok(Some(Candidate {
            path,
            relative: found.path.clone(),
            origin: Origin::Fallback {
                requested: requested.to_string(),
            },
        }))
    }
}

/// Final path component of `hint`
fn file_name(hint: &str) -> Option<String> {
    Path::new(hint)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// A name with no directory separator and at most one `.`
fn is_bare_name(hint: &str) -> bool {
    !hint.is_empty()
        && !hint.contains(['/', '\\'])
        && hint.matches('.').count() <= 1
        && hint != "."
}
