//! Tool definitions and execution for the planner
//!
//! This module defines the tools a planner can call against the sandboxed
//! project, their schemas, and the request/result types exchanged with the
//! dispatcher.

mod executor;
pub mod process;
pub mod resolver;

pub use executor::{ToolDispatcher, ToolError};
pub use process::{ProcessOutcome, ScriptRunner};
pub use resolver::{Candidate, Origin, PathResolver, Purpose};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A tool the planner can use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's input parameters
    pub input_schema: JsonValue,
}

/// The closed set of operations the dispatcher knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// List a directory
    ListFiles,
    /// Search files by name or pattern
    FindFiles,
    /// Read a text file
    ReadFile,
    /// Write a text file
    WriteFile,
    /// Run a script under the interpreter
    RunScript,
}

impl ToolKind {
    /// Every tool kind, in the order they are advertised
    pub const ALL: [ToolKind; 5] = [
        ToolKind::ListFiles,
        ToolKind::FindFiles,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::RunScript,
    ];

    /// Canonical name shown to the planner
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ListFiles => "list_files",
            ToolKind::FindFiles => "find_files",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::RunScript => "run_script",
        }
    }

    /// Look up a tool by canonical name or legacy alias
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "list_files" | "get_files_info" => Some(ToolKind::ListFiles),
            "find_files" => Some(ToolKind::FindFiles),
            "read_file" | "get_file_content" => Some(ToolKind::ReadFile),
            "write_file" => Some(ToolKind::WriteFile),
            "run_script" | "run_python_file" => Some(ToolKind::RunScript),
            _ => None,
        }
    }

    /// Schema advertised to the planner
    pub fn definition(&self) -> Tool {
        match self {
            ToolKind::ListFiles => list_files_tool(),
            ToolKind::FindFiles => find_files_tool(),
            ToolKind::ReadFile => read_file_tool(),
            ToolKind::WriteFile => write_file_tool(),
            ToolKind::RunScript => run_script_tool(),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tool call request from the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this call
    pub id: String,
    /// Name of the tool to use
    pub name: String,
    /// Input arguments for the tool
    pub arguments: JsonValue,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool call, always rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolResult {
    /// The operation succeeded
    #[serde(rename = "result")]
    Ok(String),
    /// The operation failed; text starts with `Error:`
    #[serde(rename = "error")]
    Error(String),
}

impl ToolResult {
    /// Create an error result, adding the `Error:` prefix
    pub fn error(message: impl fmt::Display) -> Self {
        ToolResult::Error(format!("Error: {}", message))
    }

    /// Whether the call failed
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// The text payload
    pub fn text(&self) -> &str {
        match self {
            ToolResult::Ok(text) | ToolResult::Error(text) => text,
        }
    }
}

/// Response envelope returned by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// ID of the call this responds to
    pub call_id: String,
    /// Tool name as the planner sent it
    pub name: String,
    /// The result
    pub result: ToolResult,
}

/// Create the list_files tool definition
pub fn list_files_tool() -> Tool {
    Tool {
        name: ToolKind::ListFiles.name().to_string(),
        description: "Lists files in the specified directory along with their sizes, constrained to the project root.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list, relative to the project root. Lists the root itself if omitted."
                }
            }
        }),
    }
}

/// Create the find_files tool definition
pub fn find_files_tool() -> Tool {
    Tool {
        name: ToolKind::FindFiles.name().to_string(),
        description: "Recursively searches the project for files by exact name or by a case-insensitive pattern. Returns paths relative to the project root.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Exact file name to look for (case-insensitive), e.g. 'README.md'"
                },
                "pattern": {
                    "type": "string",
                    "description": "Substring to match anywhere in file names (case-insensitive), e.g. 'test'"
                }
            }
        }),
    }
}

/// Create the read_file tool definition
pub fn read_file_tool() -> Tool {
    Tool {
        name: ToolKind::ReadFile.name().to_string(),
        description: "Reads and returns the contents of a file, constrained to the project root. Long files are truncated.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file to read, relative to the project root"
                }
            },
            "required": ["file_path"]
        }),
    }
}

/// Create the write_file tool definition
pub fn write_file_tool() -> Tool {
    Tool {
        name: ToolKind::WriteFile.name().to_string(),
        description: "Writes or overwrites a file, constrained to the project root. Creates the file and any missing parent directories.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file to write, relative to the project root"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        }),
    }
}

/// Create the run_script tool definition
pub fn run_script_tool() -> Tool {
    Tool {
        name: ToolKind::RunScript.name().to_string(),
        description: "Executes a Python file with optional command-line arguments, constrained to the project root.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the script to execute, relative to the project root"
                },
                "args": {
                    "type": "array",
                    "description": "Optional command-line arguments passed to the script",
                    "items": { "type": "string" }
                }
            },
            "required": ["file_path"]
        }),
    }
}

/// Get all available tools
pub fn all_tools() -> Vec<Tool> {
    ToolKind::ALL.iter().map(ToolKind::definition).collect()
}
