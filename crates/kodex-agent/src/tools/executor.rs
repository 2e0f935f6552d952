//! Tool execution engine
//!
//! This module turns planner tool calls into sandboxed operations. Every
//! failure, including a panic inside an operation, comes back as a
//! [`ToolResult::Error`] whose text starts with `Error:`.

use super::process::ScriptRunner;
use super::resolver::{PathResolver, Purpose};
use super::{ToolCall, ToolKind, ToolResponse, ToolResult};
use futures::FutureExt;
use kodex_core::file_io::{self, FileIoError};
use kodex_core::{FindError, FindQuery, Project, SandboxRoot};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;

/// Argument keys that would let a caller pick its own root
const ROOT_KEYS: &[&str] = &["working_directory", "root", "sandbox_root"];

/// Errors that can occur during tool execution
#[derive(Error, Debug)]
pub enum ToolError {
    /// Path escapes the sandbox root
    #[error("Cannot {action} \"{path}\" as it is outside the project root")]
    OutsideRoot { action: &'static str, path: String },

    /// File missing and no fallback was attempted
    #[error("File not found or is not a regular file: \"{0}\"")]
    NotFound(String),

    /// File missing and the same-name search found nothing
    #[error("File not found or is not a regular file: \"{path}\". Searched entire project but could not locate \"{name}\".")]
    NotFoundAnywhere { path: String, name: String },

    /// Directory to list does not exist
    #[error("\"{0}\" does not exist")]
    DirectoryNotFound(String),

    /// Path exists but is not a directory
    #[error("\"{0}\" is not a directory")]
    NotADirectory(String),

    /// Script does not carry the expected extension
    #[error("\"{path}\" is not a .{extension} file")]
    WrongFileType { path: String, extension: String },

    /// Script exceeded the wall-clock limit; `partial` is what it printed
    /// before being killed, empty or starting with a newline
    #[error("executing script: Process timed out after {secs} seconds{partial}")]
    TimedOut { secs: u64, partial: String },

    /// Tool not found
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Invalid tool input
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidInput { tool: &'static str, reason: String },

    /// File is not UTF-8 text
    #[error("\"{0}\" is not valid UTF-8 text")]
    InvalidUtf8(String),

    /// Permission denied
    #[error("Permission denied: \"{0}\"")]
    PermissionDenied(String),

    /// File search error
    #[error("{0}")]
    Find(#[from] FindError),

    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Interpreter could not be started or waited on
    #[error("executing script: {0}")]
    Spawn(#[source] std::io::Error),

    /// An operation panicked
    #[error("tool '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FindFilesArgs {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct RunScriptArgs {
    file_path: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Dispatches tool calls against one sandbox root
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    resolver: PathResolver,
    runner: ScriptRunner,
    max_file_chars: usize,
    script_extension: String,
}

impl ToolDispatcher {
    /// Create a dispatcher for a project, using its configured limits
    pub fn new(project: &Project) -> Self {
        let sandbox = &project.config.sandbox;
        Self {
            resolver: PathResolver::new(project.finder(), project.config.resolver.clone()),
            runner: ScriptRunner::new(
                sandbox.interpreter.clone(),
                Duration::from_secs(sandbox.script_timeout_secs),
            ),
            max_file_chars: sandbox.max_file_chars,
            script_extension: sandbox.script_extension.clone(),
        }
    }

    /// Replace the script runner
    pub fn with_runner(mut self, runner: ScriptRunner) -> Self {
        self.runner = runner;
        self
    }

    /// The sandbox root every call is confined to
    pub fn root(&self) -> &SandboxRoot {
        self.resolver.root()
    }

    /// Execute a tool call and wrap the result in a response envelope
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResponse {
        tracing::debug!(id = %call.id, tool = %call.name, "dispatching tool call");

        let result = match ToolKind::from_name(&call.name) {
            Some(kind) => {
                let arguments = strip_root_keys(call.arguments.clone());
                catch_panics(&call.name, self.execute(kind, arguments)).await
            }
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };

        let result = match result {
            Ok(text) => ToolResult::Ok(text),
            Err(e) => {
                tracing::debug!(id = %call.id, tool = %call.name, error = %e, "tool call failed");
                ToolResult::error(e)
            }
        };

        ToolResponse {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }

    async fn execute(&self, kind: ToolKind, arguments: JsonValue) -> Result<String, ToolError> {
        match kind {
            ToolKind::ListFiles => self.execute_list_files(parse_args(kind, arguments)?),
            ToolKind::FindFiles => self.execute_find_files(parse_args(kind, arguments)?),
            ToolKind::ReadFile => self.execute_read_file(parse_args(kind, arguments)?),
            ToolKind::WriteFile => self.execute_write_file(parse_args(kind, arguments)?),
            ToolKind::RunScript => self.execute_run_script(parse_args(kind, arguments)?).await,
        }
    }

    /// Execute the list_files tool
    fn execute_list_files(&self, args: ListFilesArgs) -> Result<String, ToolError> {
        let directory = args.directory.unwrap_or_else(|| ".".to_string());
        let candidate = self.resolver.resolve(&directory, Purpose::List)?;

        let entries = file_io::list_directory(&candidate.path).map_err(|e| match e {
            FileIoError::NotFound(_) => ToolError::DirectoryNotFound(directory.clone()),
            other => file_error(other, &directory),
        })?;

        if entries.is_empty() {
            return Ok("Directory is empty".to_string());
        }

        Ok(entries
            .iter()
            .map(|entry| entry.format())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Execute the find_files tool
    fn execute_find_files(&self, args: FindFilesArgs) -> Result<String, ToolError> {
        let query = FindQuery {
            filename: args.filename,
            pattern: args.pattern,
        };
        let outcome = self.resolver.finder().find(&query)?;
        Ok(outcome.to_string())
    }

    /// Execute the read_file tool
    fn execute_read_file(&self, args: ReadFileArgs) -> Result<String, ToolError> {
        let candidate = self.resolver.resolve(&args.file_path, Purpose::Read)?;
        let text = file_io::read_text(&candidate.path, self.max_file_chars)
            .map_err(|e| file_error(e, &args.file_path))?;

        if !text.truncated {
            return Ok(text.content);
        }

        Ok(format!(
            "{}\n[...File \"{}\" truncated at {} characters]",
            text.content, args.file_path, self.max_file_chars
        ))
    }

    /// Execute the write_file tool
    fn execute_write_file(&self, args: WriteFileArgs) -> Result<String, ToolError> {
        let candidate = self.resolver.resolve(&args.file_path, Purpose::Write)?;
        let written = file_io::write_text(&candidate.path, &args.content)
            .map_err(|e| file_error(e, &args.file_path))?;

        let shown = if candidate.is_fallback() {
            candidate.relative.as_str()
        } else {
            args.file_path.as_str()
        };
        Ok(format!(
            "Successfully wrote to \"{}\" ({} characters written)",
            shown, written
        ))
    }

    /// Execute the run_script tool
    async fn execute_run_script(&self, args: RunScriptArgs) -> Result<String, ToolError> {
        let candidate = self.resolver.resolve(&args.file_path, Purpose::Run)?;

        let extension_matches = candidate
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.script_extension.as_str()));
        if !extension_matches {
            return Err(ToolError::WrongFileType {
                path: args.file_path,
                extension: self.script_extension.clone(),
            });
        }

        let outcome = self
            .runner
            .run(self.root().path(), &candidate.path, &args.args)
            .await
            .map_err(ToolError::Spawn)?;

        if outcome.timed_out {
            let partial = outcome
                .output_sections()
                .into_iter()
                .map(|section| format!("\n{}", section))
                .collect();
            return Err(ToolError::TimedOut {
                secs: self.runner.timeout().as_secs(),
                partial,
            });
        }

        Ok(outcome.format())
    }
}

/// Remove keys that name a root from an argument object
fn strip_root_keys(mut arguments: JsonValue) -> JsonValue {
    if let JsonValue::Object(map) = &mut arguments {
        for key in ROOT_KEYS {
            if map.remove(*key).is_some() {
                tracing::debug!(key, "ignoring caller-supplied root argument");
            }
        }
    }
    arguments
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, arguments: JsonValue) -> Result<T, ToolError> {
    let arguments = match arguments {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidInput {
        tool: kind.name(),
        reason: e.to_string(),
    })
}

fn file_error(err: FileIoError, path: &str) -> ToolError {
    match err {
        FileIoError::NotFound(_) => ToolError::NotFound(path.to_string()),
        FileIoError::NotADirectory(_) => ToolError::NotADirectory(path.to_string()),
        FileIoError::InvalidUtf8(_) => ToolError::InvalidUtf8(path.to_string()),
        FileIoError::PermissionDenied(_) => ToolError::PermissionDenied(path.to_string()),
        FileIoError::Io(e) => ToolError::Io(e),
    }
}

/// Run an operation, turning a panic into [`ToolError::Panicked`]
async fn catch_panics<F>(name: &str, operation: F) -> Result<String, ToolError>
where
    F: Future<Output = Result<String, ToolError>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(tool = name, %message, "tool panicked");
            Err(ToolError::Panicked {
                name: name.to_string(),
                message,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kodex_core::{Config, WriteFallback};
    use tempfile::TempDir;

    fn dispatcher_with(temp_dir: &TempDir, config: Config) -> ToolDispatcher {
        let project = Project::with_config(temp_dir.path(), config).unwrap();
        ToolDispatcher::new(&project)
    }

    fn dispatcher(temp_dir: &TempDir) -> ToolDispatcher {
        dispatcher_with(temp_dir, Config::default())
    }

    fn call(name: &str, arguments: JsonValue) -> ToolCall {
        ToolCall::new("test_123", name, arguments)
    }

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_read_tool() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("test.txt"), "Hello, World!").await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("read_file", serde_json::json!({"file_path": "test.txt"})))
            .await;

        assert_eq!(response.call_id, "test_123");
        assert_eq!(response.name, "read_file");
        assert_eq!(response.result, ToolResult::Ok("Hello, World!".to_string()));
    }

    #[tokio::test]
    async fn test_read_tool_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let content = "x".repeat(50);
        tokio::fs::write(temp_dir.path().join("long.txt"), &content).await.unwrap();

        let mut config = Config::default();
        config.sandbox.max_file_chars = 20;
        let response = dispatcher_with(&temp_dir, config)
            .dispatch(&call("read_file", serde_json::json!({"file_path": "long.txt"})))
            .await;

        assert_eq!(
            response.result.text(),
            format!("{}\n[...File \"long.txt\" truncated at 20 characters]", "x".repeat(20))
        );
    }

    #[tokio::test]
    async fn test_read_tool_file_not_found() {
        let temp_dir = TempDir::new().unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("read_file", serde_json::json!({"file_path": "nonexistent.txt"})))
            .await;

        assert!(response.result.is_error());
        assert!(response.result.text().starts_with("Error: File not found"));
    }

    #[tokio::test]
    async fn test_read_tool_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("read_file", serde_json::json!({"file_path": "blob.bin"})))
            .await;

        assert_eq!(
            response.result,
            ToolResult::Error("Error: \"blob.bin\" is not valid UTF-8 text".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_tool() {
        let temp_dir = TempDir::new().unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call(
                "write_file",
                serde_json::json!({"file_path": "sub/dir/output.txt", "content": "héllo"}),
            ))
            .await;

        assert_eq!(
            response.result,
            ToolResult::Ok("Successfully wrote to \"sub/dir/output.txt\" (5 characters written)".to_string())
        );
        let written = tokio::fs::read_to_string(temp_dir.path().join("sub/dir/output.txt"))
            .await
            .unwrap();
        assert_eq!(written, "héllo");
    }

    #[tokio::test]
    async fn test_write_tool_redirects_bare_name() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::create_dir(temp_dir.path().join("pkg")).await.unwrap();
        tokio::fs::write(temp_dir.path().join("pkg/notes.txt"), "old").await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call(
                "write_file",
                serde_json::json!({"file_path": "notes.txt", "content": "new"}),
            ))
            .await;

        assert_eq!(
            response.result.text(),
            "Successfully wrote to \"pkg/notes.txt\" (3 characters written)"
        );
        assert!(!temp_dir.path().join("notes.txt").exists());

        let mut config = Config::default();
        config.resolver.write_fallback = WriteFallback::Never;
        dispatcher_with(&temp_dir, config)
            .dispatch(&call(
                "write_file",
                serde_json::json!({"file_path": "notes.txt", "content": "top"}),
            ))
            .await;
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_list_files_tool() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("main.py"), "print('hi')\n").await.unwrap();
        tokio::fs::create_dir(temp_dir.path().join("pkg")).await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("list_files", serde_json::json!({})))
            .await;

        let text = response.result.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "- main.py: file_size=12 bytes, is_dir=false");
        assert!(lines[1].starts_with("- pkg: file_size="));
        assert!(lines[1].ends_with("is_dir=true"));
    }

    #[tokio::test]
    async fn test_list_files_empty_and_errors() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::create_dir(temp_dir.path().join("empty")).await.unwrap();
        tokio::fs::write(temp_dir.path().join("file.txt"), "x").await.unwrap();
        let dispatcher = dispatcher(&temp_dir);

        let response = dispatcher
            .dispatch(&call("list_files", serde_json::json!({"directory": "empty"})))
            .await;
        assert_eq!(response.result, ToolResult::Ok("Directory is empty".to_string()));

        let response = dispatcher
            .dispatch(&call("list_files", serde_json::json!({"directory": "missing"})))
            .await;
        assert_eq!(response.result.text(), "Error: \"missing\" does not exist");

        let response = dispatcher
            .dispatch(&call("list_files", serde_json::json!({"directory": "file.txt"})))
            .await;
        assert_eq!(response.result.text(), "Error: \"file.txt\" is not a directory");
    }

    #[tokio::test]
    async fn test_find_files_tool() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::create_dir(temp_dir.path().join("pkg")).await.unwrap();
        tokio::fs::write(temp_dir.path().join("pkg/tests.py"), "").await.unwrap();

        let dispatcher = dispatcher(&temp_dir);
        let response = dispatcher
            .dispatch(&call("find_files", serde_json::json!({"pattern": "TEST"})))
            .await;
        assert_eq!(response.result.text(), "Found 1 file(s):\n  - pkg/tests.py");

        let response = dispatcher
            .dispatch(&call("find_files", serde_json::json!({})))
            .await;
        assert_eq!(
            response.result.text(),
            "Error: Please provide either 'filename' or 'pattern' parameter"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let temp_dir = TempDir::new().unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("delete_everything", serde_json::json!({})))
            .await;

        assert_eq!(
            response.result,
            ToolResult::Error("Error: Unknown tool: delete_everything".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let temp_dir = TempDir::new().unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("write_file", serde_json::json!({"file_path": 42})))
            .await;

        assert!(response
            .result
            .text()
            .starts_with("Error: Invalid arguments for write_file:"));
    }

    #[tokio::test]
    async fn test_root_arguments_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("inside.txt"), "inside").await.unwrap();
        tokio::fs::write(outside.path().join("inside.txt"), "outside").await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call(
                "read_file",
                serde_json::json!({
                    "file_path": "inside.txt",
                    "working_directory": outside.path().to_string_lossy(),
                }),
            ))
            .await;

        assert_eq!(response.result.text(), "inside");
    }

    #[tokio::test]
    async fn test_aliases_dispatch() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("a.txt"), "alias").await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("get_file_content", serde_json::json!({"file_path": "a.txt"})))
            .await;
        assert_eq!(response.result.text(), "alias");
        assert_eq!(response.name, "get_file_content");
    }

    #[tokio::test]
    async fn test_outside_root_for_every_tool() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&temp_dir);

        let calls = [
            call("list_files", serde_json::json!({"directory": "../"})),
            call("read_file", serde_json::json!({"file_path": "../secret.txt"})),
            call("write_file", serde_json::json!({"file_path": "../evil.txt", "content": "x"})),
            call("run_script", serde_json::json!({"file_path": "../evil.py"})),
        ];

        for tool_call in &calls {
            let response = dispatcher.dispatch(tool_call).await;
            assert!(response.result.is_error(), "{} escaped", tool_call.name);
            assert!(response.result.text().contains("outside the project root"));
        }
        assert!(!temp_dir.path().parent().unwrap().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_run_script_wrong_file_type() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("notes.txt"), "x").await.unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call("run_script", serde_json::json!({"file_path": "notes.txt"})))
            .await;

        assert_eq!(response.result.text(), "Error: \"notes.txt\" is not a .py file");
    }

    #[tokio::test]
    async fn test_run_script_output() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("hello.py"), "import sys\nprint('hi', sys.argv[1])\n")
            .await
            .unwrap();

        let response = dispatcher(&temp_dir)
            .dispatch(&call(
                "run_script",
                serde_json::json!({"file_path": "hello.py", "args": ["there"]}),
            ))
            .await;

        assert_eq!(response.result, ToolResult::Ok("STDOUT:\nhi there\n".to_string()));
    }

    #[tokio::test]
    async fn test_run_script_timeout() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("sleepy.py"), "import time\ntime.sleep(30)\n")
            .await
            .unwrap();

        let dispatcher = dispatcher(&temp_dir)
            .with_runner(ScriptRunner::new("python3", Duration::from_millis(300)));
        let response = dispatcher
            .dispatch(&call("run_script", serde_json::json!({"file_path": "sleepy.py"})))
            .await;

        assert!(response.result.text().starts_with("Error: executing script: Process timed out"));
    }

    #[tokio::test]
    async fn test_run_script_timeout_reports_partial_output() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(
            temp_dir.path().join("progress.py"),
            "import time\nprint('halfway', flush=True)\ntime.sleep(30)\n",
        )
        .await
        .unwrap();

        let dispatcher = dispatcher(&temp_dir)
            .with_runner(ScriptRunner::new("python3", Duration::from_secs(2)));
        let response = dispatcher
            .dispatch(&call("run_script", serde_json::json!({"file_path": "progress.py"})))
            .await;

        assert_eq!(
            response.result,
            ToolResult::Error(
                "Error: executing script: Process timed out after 2 seconds\nSTDOUT:\nhalfway\n"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_timeout_message_without_output() {
        let err = ToolError::TimedOut {
            secs: 30,
            partial: String::new(),
        };
        assert_eq!(err.to_string(), "executing script: Process timed out after 30 seconds");
    }

    #[tokio::test]
    async fn test_panics_become_errors() {
        let result = catch_panics("read_file", async {
            if true {
                panic!("disk on fire");
            }
            Ok(String::new())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "tool 'read_file' panicked: disk on fire");
        assert_eq!(
            ToolResult::error(err).text(),
            "Error: tool 'read_file' panicked: disk on fire"
        );
    }

    #[test]
    fn test_strip_root_keys() {
        let stripped = strip_root_keys(serde_json::json!({
            "file_path": "a.txt",
            "root": "/",
            "sandbox_root": "/",
            "working_directory": "/tmp",
        }));
        assert_eq!(stripped, serde_json::json!({"file_path": "a.txt"}));
    }
}
