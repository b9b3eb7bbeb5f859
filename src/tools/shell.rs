//! 终端命令工具：白名单命令，禁止危险操作
//!
//! 仅允许配置中的命令名（首词，如 ls、grep、python）；禁止 rm -rf、wget、chmod 777 等子串；
//! 执行通过 sh -c / cmd /C，带超时与 tracing 审计。非零退出码视为执行失败。

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{required_str, Tool, ToolError};

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

/// 输出截断上限（字符）
const MAX_OUTPUT_CHARS: usize = 8000;

/// 终端命令工具
pub struct ShellTool {
    allowed_commands: HashSet<String>,
    timeout_secs: u64,
    working_dir: Option<PathBuf>,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        let allowed_commands = allowed_commands
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            allowed_commands,
            timeout_secs,
            working_dir: None,
        }
    }

    /// 命令的工作目录（通常为项目目录）
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// 解析命令：只取第一个 token 作为命令名
    fn command_name<'a>(&self, raw: &'a str) -> &'a str {
        raw.split_whitespace().next().unwrap_or("")
    }

    fn is_allowed(&self, raw: &str) -> Result<(), ToolError> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(ToolError::InvalidArguments(format!(
                    "forbidden pattern: {}",
                    forbidden
                )));
            }
        }
        let name = self.command_name(&raw_lower);
        if name.is_empty() {
            return Err(ToolError::InvalidArguments("empty command".to_string()));
        }
        if self.allowed_commands.contains(name) {
            return Ok(());
        }
        Err(ToolError::InvalidArguments(format!(
            "command '{}' not in allowlist",
            name
        )))
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }

    fn description(&self) -> &str {
        "Run an allow-listed terminal command and return its output."
    }

    fn parameters_schema(&self) -> Value {
        let mut allowed: Vec<&String> = self.allowed_commands.iter().collect();
        allowed.sort();
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": format!("Command line; the first word must be one of: {}",
                        allowed.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let command = required_str(&args, "command")?.trim();
        self.is_allowed(command)?;

        tracing::info!(command = %command, "run_terminal_command tool execute");

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
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| ToolError::Timeout(self.timeout_secs))?
        .map_err(|e| ToolError::Failed(format!("execution failed: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(ToolError::Failed(format!(
                "exit {:?}\nstderr: {}",
                output.status.code(),
                truncate(stderr.trim())
            )));
        }
        let text = if stderr.trim().is_empty() {
            stdout
        } else {
            format!("{}\nstderr: {}", stdout.trim(), stderr.trim())
        };
        Ok(truncate(&text))
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_OUTPUT_CHARS {
        s.chars().take(MAX_OUTPUT_CHARS).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ShellTool {
        ShellTool::new(vec!["echo".into(), "ls".into(), "false".into()], 5)
    }

    #[test]
    fn test_allowlist() {
        let t = tool();
        assert!(t.is_allowed("echo hi").is_ok());
        assert!(t.is_allowed("python x.py").unwrap_err().is_invalid_call());
        assert!(t.is_allowed("ls; rm -rf /").unwrap_err().is_invalid_call());
        assert!(t.is_allowed("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_runs() {
        let out = tool()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_execution_failure() {
        let err = tool()
            .execute(serde_json::json!({"command": "false"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
    }
}
