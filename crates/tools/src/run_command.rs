//! Run-command tool: execute a shell command on the host.
//!
//! Supports a first-word allowlist, a wall-clock timeout, and picks up a
//! local `venv` the way an activated shell would.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use capstan_core::error::ToolError;
use capstan_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

const TOOL_NAME: &str = "run_command";

pub struct RunCommandTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
    /// Directory the command runs in. `None` inherits the process cwd.
    working_dir: Option<PathBuf>,
}

impl RunCommandTool {
    pub fn new(allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            allowed_commands,
            timeout: Duration::from_secs(timeout_secs),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("");
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    fn venv_dir(&self) -> PathBuf {
        self.working_dir
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
            .join("venv")
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let venv = self.venv_dir();
        if venv.is_dir() {
            let venv = std::path::absolute(&venv).unwrap_or(venv);
            let mut paths = vec![venv.join("bin")];
            if let Some(existing) = std::env::var_os("PATH") {
                paths.extend(std::env::split_paths(&existing));
            }
            if let Ok(joined) = std::env::join_paths(paths) {
                cmd.env("PATH", joined);
            }
            cmd.env("VIRTUAL_ENV", &venv);
            debug!(venv = %venv.display(), "Using local virtualenv");
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute a shell command. Use this to run scripts, install packages, or perform system operations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: TOOL_NAME.into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "Executing command");

        let output = match tokio::time::timeout(self.timeout, self.build_command(command).output())
            .await
        {
            Ok(output) => output,
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: TOOL_NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        match output {
            Ok(output) if output.status.success() => Ok(ToolResult::success(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            )),
            Ok(output) => {
                let code = output.status.code().unwrap_or(-1);
                warn!(command = %command, exit_code = code, "Command failed");
                Ok(ToolResult::failure(format!(
                    "Error (Exit Code {code}):\n{}",
                    String::from_utf8_lossy(&output.stderr)
                )))
            }
            Err(e) => Ok(ToolResult::failure(format!("Execution Error: {e}"))),
        }
    }
}
