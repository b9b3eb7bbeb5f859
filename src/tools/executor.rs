//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时转为 ToolError::Timeout；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::{ToolError, ToolRegistry};

/// 工具执行器：对每次调用施加超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<String, ToolError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = match timeout(self.timeout, self.registry.execute(tool_name, args)).await {
            Ok(r) => r,
            Err(_) => Err(ToolError::Timeout(self.timeout.as_secs())),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_invalid_call() => "invalid_call",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// prompt 中的工具列表
    pub fn list_descriptions(&self) -> String {
        self.registry.list_descriptions()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::tools::Tool;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("woke".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_execution_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 1);
        let err = executor
            .execute("sleepy", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Timeout(1));
        assert!(!err.is_invalid_call());
    }
}
