//! File I/O primitives used by the sandboxed tools
//!
//! These functions take already-resolved absolute paths; containment is the
//! caller's job (see [`crate::sandbox`]). They return typed data, and the
//! tool layer decides how to render it for the planner.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default character cap applied when reading files
pub const DEFAULT_MAX_FILE_CHARS: usize = 10_000;

/// Errors that can occur during file I/O operations
#[derive(Error, Debug)]
pub enum FileIoError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Invalid UTF-8 in file
    #[error("Invalid UTF-8 in file: {0}")]
    InvalidUtf8(PathBuf),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Size and kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Size in bytes as reported by the filesystem
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// File name of the entry
    pub name: String,
    /// Metadata, or the error message if it could not be read
    pub metadata: Result<EntryMetadata, String>,
}

impl DirectoryEntry {
    /// Render the entry as a single listing line
    pub fn format(&self) -> String {
        match &self.metadata {
            Ok(meta) => format!(
                "- {}: file_size={} bytes, is_dir={}",
                self.name, meta.size, meta.is_dir
            ),
            Err(e) => format!("- {}: Error accessing file: {}", self.name, e),
        }
    }
}

/// Text read from a file, possibly cut at a character cap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileText {
    /// The (possibly truncated) content
    pub content: String,
    /// Whether content was cut at the cap
    pub truncated: bool,
}

/// List a directory, sorted by entry name
pub fn list_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<DirectoryEntry>, FileIoError> {
    let dir = dir.as_ref();

    if !dir.exists() {
        return Err(FileIoError::NotFound(dir.to_path_buf()));
    }

    if !dir.is_dir() {
        return Err(FileIoError::NotADirectory(dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| map_io_error(e, dir))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // fs::metadata follows symlinks so a linked directory reports as one
        let metadata = fs::metadata(entry.path())
            .map(|meta| EntryMetadata {
                size: meta.len(),
                is_dir: meta.is_dir(),
            })
            .map_err(|e| e.to_string());

        entries.push(DirectoryEntry { name, metadata });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read a UTF-8 file, keeping at most `max_chars` characters
pub fn read_text<P: AsRef<Path>>(path: P, max_chars: usize) -> Result<FileText, FileIoError> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(FileIoError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| map_io_error(e, path))?;

    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => Ok(FileText {
            content: content[..cut].to_string(),
            truncated: true,
        }),
        None => Ok(FileText {
            content,
            truncated: false,
        }),
    }
}

/// Write content to a file, creating parent directories if needed.
///
/// Existing files are overwritten. Returns the number of characters written.
pub fn write_text<P: AsRef<Path>, C: AsRef<str>>(path: P, content: C) -> Result<usize, FileIoError> {
    let path = path.as_ref();
    let content = content.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| map_io_error(e, parent))?;
        }
    }

    fs::write(path, content).map_err(|e| map_io_error(e, path))?;
    Ok(content.chars().count())
}

fn map_io_error(e: io::Error, path: &Path) -> FileIoError {
    match e.kind() {
        io::ErrorKind::NotFound => FileIoError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => FileIoError::PermissionDenied(path.to_path_buf()),
        io::ErrorKind::InvalidData => FileIoError::InvalidUtf8(path.to_path_buf()),
        _ => FileIoError::Io(e),
    }
}
