//! 工具分发适配器
//!
//! 把 Action 中的 ToolCall 依次交给 ToolExecutor 执行，并把两类可恢复失败
//! （无效调用 / 执行失败）转成 observation 文本，而不是向上抛错。
//! 多个调用按顺序执行，每个调用在观察结果中占一个块。

use crate::core::AgentError;
use crate::react::ToolCall;
use crate::tools::{ToolError, ToolExecutor};

/// 单个调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Ok(String),
    /// 未知工具或参数不合法，模型可自行纠正
    InvalidCall(String),
    /// 工具已运行但失败
    ExecutionFailure(String),
}

impl CallOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Ok(_) => "ok",
            CallOutcome::InvalidCall(_) => "invalid call",
            CallOutcome::ExecutionFailure(_) => "execution failed",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            CallOutcome::Ok(s)
            | CallOutcome::InvalidCall(s)
            | CallOutcome::ExecutionFailure(s) => s,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CallOutcome::Ok(_))
    }
}

/// 一次调用与其结果
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub tool: String,
    pub outcome: CallOutcome,
}

pub struct ToolDispatch<'a> {
    executor: &'a ToolExecutor,
}

impl<'a> ToolDispatch<'a> {
    pub fn new(executor: &'a ToolExecutor) -> Self {
        Self { executor }
    }

    /// 执行全部调用并渲染为一段 observation 文本
    pub async fn invoke(&self, calls: &[ToolCall]) -> Result<String, AgentError> {
        let records = self.invoke_each(calls).await?;
        Ok(render_observation(&records))
    }

    /// 逐个执行，返回每个调用的结果；空调用列表是循环内部契约被破坏
    pub async fn invoke_each(&self, calls: &[ToolCall]) -> Result<Vec<DispatchRecord>, AgentError> {
        if calls.is_empty() {
            return Err(AgentError::Internal(
                "tool dispatch called with no tool calls".to_string(),
            ));
        }

        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            let outcome = match self.executor.execute(&call.tool, call.arguments()).await {
                Ok(text) => CallOutcome::Ok(text),
                Err(e) if e.is_invalid_call() => {
                    CallOutcome::InvalidCall(invalid_call_hint(&e, self.executor))
                }
                Err(e) => CallOutcome::ExecutionFailure(e.to_string()),
            };
            if !outcome.is_ok() {
                tracing::warn!(
                    tool = %call.tool,
                    outcome = outcome.label(),
                    detail = %outcome.text(),
                    "tool call failed"
                );
            }
            records.push(DispatchRecord {
                tool: call.tool.clone(),
                outcome,
            });
        }
        Ok(records)
    }
}

fn invalid_call_hint(err: &ToolError, executor: &ToolExecutor) -> String {
    match err {
        ToolError::UnknownTool(_) => format!(
            "{}. Available tools: {}",
            err,
            executor.tool_names().join(", ")
        ),
        _ => err.to_string(),
    }
}

/// 每个调用一块：`[tool] ok: ...` / `[tool] invalid call: ...` / `[tool] execution failed: ...`
pub fn render_observation(records: &[DispatchRecord]) -> String {
    records
        .iter()
        .map(|r| format!("[{}] {}: {}", r.tool, r.outcome.label(), r.outcome.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use super::*;
    use crate::tools::{required_str, Tool, ToolRegistry};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text"
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            Ok(required_str(&args, "text")?.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Failed("disk on fire".to_string()))
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        registry.register(Broken);
        ToolExecutor::new(registry, 5)
    }

    fn call(tool: &str, params: Value) -> ToolCall {
        let parameters = match params {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        ToolCall::new(tool, parameters)
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_invalid_call() {
        let executor = executor();
        let dispatch = ToolDispatch::new(&executor);
        let text = dispatch
            .invoke(&[call("search_web", serde_json::json!({"query": "x"}))])
            .await
            .unwrap();
        assert!(text.starts_with("[search_web] invalid call:"));
        assert!(text.contains("unknown tool"));
        assert!(text.contains("echo"));
    }

    #[tokio::test]
    async fn test_outcomes_in_order() {
        let executor = executor();
        let dispatch = ToolDispatch::new(&executor);
        let records = dispatch
            .invoke_each(&[
                call("echo", serde_json::json!({"text": "hi"})),
                call("echo", serde_json::json!({})),
                call("broken", serde_json::json!({})),
            ])
            .await
            .unwrap();
        assert_eq!(records[0].outcome, CallOutcome::Ok("hi".to_string()));
        assert!(matches!(records[1].outcome, CallOutcome::InvalidCall(_)));
        assert_eq!(
            records[2].outcome,
            CallOutcome::ExecutionFailure("disk on fire".to_string())
        );
        let text = render_observation(&records);
        assert_eq!(text.matches("\n\n").count(), 2);
        assert!(text.contains("[broken] execution failed: disk on fire"));
    }

    #[tokio::test]
    async fn test_empty_calls_is_internal_error() {
        let executor = executor();
        let dispatch = ToolDispatch::new(&executor);
        let err = dispatch.invoke(&[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Internal(_)));
    }
}
