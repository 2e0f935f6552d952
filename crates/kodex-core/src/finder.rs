//! Recursive file search by name or pattern
//!
//! The finder walks the whole project tree (minus infrastructure
//! directories) and returns matches shallowest first, then alphabetically.
//! Other tools take the *first* match as their fallback target, so that
//! ordering must stay stable for identical trees.

use crate::sandbox::{to_slash, SandboxRoot};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use walkdir::WalkDir;

/// Directories never descended into
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".pytest_cache",
    "__pypackages__",
    ".mypy_cache",
    "target",
    "build",
    "dist",
];

/// Errors that can occur during a search
#[derive(Error, Debug)]
pub enum FindError {
    /// Neither a filename nor a pattern was supplied
    #[error("Please provide either 'filename' or 'pattern' parameter")]
    MissingQuery,

    /// Walking the tree failed at the root
    #[error("Error searching for files: {0}")]
    Walk(#[from] walkdir::Error),
}

/// How a path matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Base name equals the requested filename (case-insensitive)
    Exact,
    /// Base name contains the requested pattern
    Pattern,
    /// Base name contains the stem of the requested filename
    Similar,
}

/// A single search hit, relative to the sandbox root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Relative path with `/` separators
    pub path: String,
    /// Number of path components
    pub depth: usize,
    /// How the path matched
    pub kind: MatchKind,
}

impl SearchMatch {
    fn ordering(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// What to search for
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    /// Exact base name to match
    pub filename: Option<String>,
    /// Substring to match inside base names
    pub pattern: Option<String>,
}

impl FindQuery {
    /// Query by exact file name
    pub fn by_name(filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            pattern: None,
        }
    }

    /// Query by substring pattern
    pub fn by_pattern(pattern: impl Into<String>) -> Self {
        Self {
            filename: None,
            pattern: Some(pattern.into()),
        }
    }
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct FindOutcome {
    /// The query that produced this outcome
    pub query: FindQuery,
    /// Matches in search order
    pub matches: Vec<SearchMatch>,
}

impl FindOutcome {
    /// First exact-name match, if any
    pub fn first_exact(&self) -> Option<&SearchMatch> {
        self.matches.iter().find(|m| m.kind == MatchKind::Exact)
    }

    /// Whether the matches came from the stem retry pass
    pub fn is_similar(&self) -> bool {
        self.matches
            .first()
            .map(|m| m.kind == MatchKind::Similar)
            .unwrap_or(false)
    }
}

impl fmt::Display for FindOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches.is_empty() {
            return match (&self.query.filename, &self.query.pattern) {
                (Some(name), _) => write!(f, "No files found with exact name \"{}\"", name),
                (None, Some(pattern)) => write!(f, "No files found matching pattern \"{}\"", pattern),
                (None, None) => write!(f, "{}", FindError::MissingQuery),
            };
        }

        if self.is_similar() {
            write!(
                f,
                "No exact match for \"{}\"; found {} similar file(s):",
                self.query.filename.as_deref().unwrap_or_default(),
                self.matches.len()
            )?;
        } else {
            write!(f, "Found {} file(s):", self.matches.len())?;
        }

        for m in &self.matches {
            write!(f, "\n  - {}", m.path)?;
        }
        Ok(())
    }
}

/// Recursive finder bound to a sandbox root
#[derive(Debug, Clone)]
pub struct FileFinder {
    root: SandboxRoot,
    ignored_dirs: Vec<String>,
}

impl FileFinder {
    /// Create a finder with the default deny-list
    pub fn new(root: SandboxRoot) -> Self {
        Self {
            root,
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add directory names to skip on top of the defaults
    pub fn with_extra_ignored_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// The root this finder searches
    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Search the tree.
    ///
    /// A filename with no exact hit (and no pattern given) is retried using
    /// its stem as a pattern; those hits are tagged [`MatchKind::Similar`].
    pub fn find(&self, query: &FindQuery) -> Result<FindOutcome, FindError> {
        let filename = query.filename.as_deref().filter(|s| !s.is_empty());
        let pattern = query.pattern.as_deref().filter(|s| !s.is_empty());

        if filename.is_none() && pattern.is_none() {
            return Err(FindError::MissingQuery);
        }

        let filename_lower = filename.map(str::to_lowercase);
        let pattern_lower = pattern.map(str::to_lowercase);

        let mut matches = self.walk(|name| {
            if filename_lower.as_deref() == Some(name) {
                Some(MatchKind::Exact)
            } else if pattern_lower.as_deref().is_some_and(|p| name.contains(p)) {
                Some(MatchKind::Pattern)
            } else {
                None
            }
        })?;

        if matches.is_empty() && pattern.is_none() {
            if let Some(stem) = filename_lower.as_deref().and_then(stem_of) {
                tracing::debug!(stem, "no exact match, retrying with stem");
                matches = self.walk(|name| name.contains(stem).then_some(MatchKind::Similar))?;
            }
        }

        Ok(FindOutcome {
            query: query.clone(),
            matches,
        })
    }

    /// Walk the tree and collect files accepted by `classify`, which is given
    /// the lowercased base name.
    fn walk<F>(&self, classify: F) -> Result<Vec<SearchMatch>, FindError>
    where
        F: Fn(&str) -> Option<MatchKind>,
    {
        let root = self.root.path();
        let mut matches = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.is_ignored(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(FindError::Walk(e)),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_lowercase();
            if let Some(kind) = classify(&name) {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                matches.push(SearchMatch {
                    path: to_slash(relative),
                    depth: entry.depth(),
                    kind,
                });
            }
        }

        matches.sort_by(SearchMatch::ordering);
        Ok(matches)
    }

    fn is_ignored(&self, dir_name: &str) -> bool {
        self.ignored_dirs.iter().any(|d| d == dir_name)
    }
}

/// Portion of a file name before its first `.`, if non-empty
fn stem_of(filename: &str) -> Option<&str> {
    let stem = filename.split('.').next().unwrap_or_default();
    (!stem.is_empty()).then_some(stem)
}
