//! Script execution under a wall-clock timeout
//!
//! Scripts run with the sandbox root as working directory and with captured
//! output. A script that outlives the timeout is killed and reaped before
//! [`ScriptRunner::run`] returns; whatever it printed until then is kept.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// How long readers may keep draining pipes after a timed-out child is killed
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Output collected so far from one pipe
type Captured = Arc<Mutex<Vec<u8>>>;

/// Captured result of a script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Standard output, decoded lossily
    pub stdout: String,
    /// Standard error, decoded lossily
    pub stderr: String,
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
    /// Whether the process was killed for exceeding the timeout
    pub timed_out: bool,
}

impl ProcessOutcome {
    /// Non-empty `STDOUT:` and `STDERR:` sections, in that order
    pub fn output_sections(&self) -> Vec<String> {
        let mut sections = Vec::new();
        if !self.stdout.is_empty() {
            sections.push(format!("STDOUT:\n{}", self.stdout));
        }
        if !self.stderr.is_empty() {
            sections.push(format!("STDERR:\n{}", self.stderr));
        }
        sections
    }

    /// Render the outcome for the planner
    pub fn format(&self) -> String {
        let mut sections = self.output_sections();
        if self.exit_code != 0 {
            sections.push(format!("Process exited with code {}", self.exit_code));
        }

        if sections.is_empty() {
            "No output produced.".to_string()
        } else {
            sections.join("\n")
        }
    }
}

/// Runs scripts with a fixed interpreter and timeout
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    timeout: Duration,
}

impl ScriptRunner {
    /// Create a runner
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    /// The configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `script` with `args`, using `root` as working directory.
    ///
    /// Only spawning and waiting can fail; a non-zero exit is reported in the
    /// outcome.
    pub async fn run(&self, root: &Path, script: &Path, args: &[String]) -> io::Result<ProcessOutcome> {
        tracing::debug!(
            interpreter = %self.interpreter,
            script = %script.display(),
            ?args,
            "spawning script"
        );

        let mut child = Command::new(&self.interpreter)
            .arg(script)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = Captured::default();
        let stderr = Captured::default();
        let mut stdout_task = tokio::spawn(read_stream(child.stdout.take(), Arc::clone(&stdout)));
        let mut stderr_task = tokio::spawn(read_stream(child.stderr.take(), Arc::clone(&stderr)));

        let finished = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await?;
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
            Ok::<_, io::Error>(status)
        })
        .await;

        match finished {
            Ok(status) => Ok(ProcessOutcome {
                stdout: drain(&stdout),
                stderr: drain(&stderr),
                exit_code: status?.code().unwrap_or(-1),
                timed_out: false,
            }),
            Err(_) => {
                tracing::warn!(
                    script = %script.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "script timed out, killing"
                );
                // kill() also waits, so the child is reaped here
                child.kill().await?;

                // Grandchildren may still hold the pipes open
                let _ = tokio::time::timeout(DRAIN_GRACE, async {
                    let _ = (&mut stdout_task).await;
                    let _ = (&mut stderr_task).await;
                })
                .await;
                stdout_task.abort();
                stderr_task.abort();

                Ok(ProcessOutcome {
                    stdout: drain(&stdout),
                    stderr: drain(&stderr),
                    exit_code: -1,
                    timed_out: true,
                })
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>, sink: Captured) {
    let Some(mut stream) = stream else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => match sink.lock() {
                Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            },
            Err(e) => {
                tracing::debug!(error = %e, "failed to read child output");
                break;
            }
        }
    }
}

fn drain(sink: &Captured) -> String {
    sink.lock()
        .map(|mut buf| String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_format_sections() {
        let outcome = ProcessOutcome {
            stdout: "hello\n".to_string(),
            stderr: "warn\n".to_string(),
            exit_code: 2,
            timed_out: false,
        };
        assert_eq!(
            outcome.format(),
            "STDOUT:\nhello\n\nSTDERR:\nwarn\n\nProcess exited with code 2"
        );
    }

    #[test]
    fn test_format_omits_empty_sections() {
        let outcome = ProcessOutcome {
            stdout: String::new(),
            stderr: "boom".to_string(),
            exit_code: 0,
            timed_out: false,
        };
        assert_eq!(outcome.format(), "STDERR:\nboom");
    }

    #[test]
    fn test_format_no_output() {
        let outcome = ProcessOutcome {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            timed_out: false,
        };
        assert_eq!(outcome.format(), "No output produced.");
    }

    #[tokio::test]
    async fn test_run_captures_output_and_args() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("echo.py");
        tokio::fs::write(
            &script,
            "import os, sys\nprint(' '.join(sys.argv[1:]))\nprint(os.getcwd(), file=sys.stderr)\nsys.exit(3)\n",
        )
        .await
        .unwrap();

        let runner = ScriptRunner::new("python3", Duration::from_secs(10));
        let outcome = runner
            .run(temp_dir.path(), &script, &["a".to_string(), "b c".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "a b c\n");
        assert!(!outcome.stderr.is_empty());
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("sleepy.py");
        tokio::fs::write(&script, "import time\ntime.sleep(30)\n").await.unwrap();

        let runner = ScriptRunner::new("python3", Duration::from_millis(300));
        let started = std::time::Instant::now();
        let outcome = runner.run(temp_dir.path(), &script, &[]).await.unwrap();

        assert!(outcome.timed_out);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        if !python_available() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("chatty.py");
        tokio::fs::write(
            &script,
            "import sys, time\nprint('step 1', flush=True)\nprint('warming up', file=sys.stderr, flush=True)\ntime.sleep(30)\n",
        )
        .await
        .unwrap();

        let runner = ScriptRunner::new("python3", Duration::from_millis(1500));
        let outcome = runner.run(temp_dir.path(), &script, &[]).await.unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.stdout, "step 1\n");
        assert_eq!(outcome.stderr, "warming up\n");
        assert_eq!(
            outcome.output_sections(),
            vec!["STDOUT:\nstep 1\n".to_string(), "STDERR:\nwarming up\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_missing_interpreter() {
        let temp_dir = TempDir::new().unwrap();
        let runner = ScriptRunner::new("kodex-no-such-interpreter", Duration::from_secs(1));
        let result = runner
            .run(temp_dir.path(), &temp_dir.path().join("x.py"), &[])
            .await;
        assert!(result.is_err());
    }
}
