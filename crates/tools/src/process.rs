//! `shell` and `python_repl` tools: run a command to completion and return
//! its captured output. A tool call here is synchronous end-to-end;
//! wall-clock enforcement lives in the worker loop, which wraps
//! `invoke()` in a timeout — `kill_on_drop` on the spawned command means
//! a caller-side timeout that drops the in-flight future kills the child
//! too.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use wk_domain::error::{Error, Result};

use crate::registry::Tool;

/// Output over this many characters is truncated, keeping the tail (where
/// errors and final results tend to live) and marking the cut.
const MAX_OUTPUT_CHARS: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Exited,
    Killed,
}

struct ProcessOutcome {
    status: ProcessStatus,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

fn truncate_tail(s: &str) -> (String, bool) {
    if s.chars().count() <= MAX_OUTPUT_CHARS {
        return (s.to_string(), false);
    }
    let total = s.chars().count();
    let keep_from = total - MAX_OUTPUT_CHARS;
    let truncated: String = s.chars().skip(keep_from).collect();
    (truncated, true)
}

async fn run_to_completion(mut cmd: Command, stdin_data: Option<&str>) -> Result<ProcessOutcome> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Tool { tool: "process".into(), message: format!("failed to spawn: {e}") })?;

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(data.as_bytes()).await;
        }
    }
    // Drop stdin so the child sees EOF even when no data was written.
    drop(child.stdin.take());

    let mut stdout_buf = String::new();
    let mut stderr_buf = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout_buf).await;
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr_buf).await;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Error::Tool { tool: "process".into(), message: format!("wait failed: {e}") })?;

    Ok(ProcessOutcome {
        status: ProcessStatus::Exited,
        exit_code: status.code(),
        stdout: stdout_buf,
        stderr: stderr_buf,
    })
}

fn outcome_to_json(outcome: ProcessOutcome) -> Value {
    let (stdout, stdout_truncated) = truncate_tail(&outcome.stdout);
    let (stderr, stderr_truncated) = truncate_tail(&outcome.stderr);
    serde_json::json!({
        "status": outcome.status,
        "exit_code": outcome.exit_code,
        "stdout": stdout,
        "stderr": stderr,
        "truncated": stdout_truncated || stderr_truncated,
    })
}

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    workdir: Option<String>,
}

pub struct ShellTool;

#[async_trait::async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }
    fn description(&self) -> &str {
        "Run a shell command and return its stdout/stderr/exit code."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "the shell command to run"},
                "workdir": {"type": "string", "description": "working directory"},
            },
            "required": ["command"],
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: ShellArgs = serde_json::from_value(arguments)?;
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&args.command);
        if let Some(ref wd) = args.workdir {
            cmd.current_dir(wd);
        }
        let outcome = run_to_completion(cmd, None).await?;
        Ok(outcome_to_json(outcome))
    }
}

#[derive(Debug, Deserialize)]
struct PythonReplArgs {
    code: String,
}

pub struct PythonReplTool;

#[async_trait::async_trait]
impl Tool for PythonReplTool {
    fn name(&self) -> &str {
        "python_repl"
    }
    fn description(&self) -> &str {
        "Run a snippet of Python code and return stdout/stderr/exit code."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "python source to execute"},
            },
            "required": ["code"],
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: PythonReplArgs = serde_json::from_value(arguments)?;
        let mut cmd = Command::new("python3");
        cmd.arg("-c").arg(&args.code);
        let outcome = run_to_completion(cmd, None).await?;
        Ok(outcome_to_json(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_echo_round_trips_stdout() {
        let tool = ShellTool;
        let out = tool
            .invoke(serde_json::json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert_eq!(out["stdout"].as_str().unwrap().trim(), "hi");
        assert_eq!(out["exit_code"].as_i64().unwrap(), 0);
    }

    #[tokio::test]
    async fn shell_nonzero_exit_is_reported_not_errored() {
        let tool = ShellTool;
        let out = tool
            .invoke(serde_json::json!({"command": "exit 3"}))
            .await
            .unwrap();
        assert_eq!(out["exit_code"].as_i64().unwrap(), 3);
    }

    #[test]
    fn truncate_tail_keeps_the_end_and_marks_it() {
        let long = "a".repeat(MAX_OUTPUT_CHARS + 100);
        let (kept, truncated) = truncate_tail(&long);
        assert!(truncated);
        assert_eq!(kept.len(), MAX_OUTPUT_CHARS);
    }

    #[test]
    fn truncate_tail_leaves_short_output_whole() {
        let (kept, truncated) = truncate_tail("short");
        assert!(!truncated);
        assert_eq!(kept, "short");
    }
}
