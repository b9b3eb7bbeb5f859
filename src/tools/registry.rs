//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；ToolRegistry 即 agent 循环所依赖的「工具管理器」：
//! 提供渲染进 prompt 的工具描述，并在执行时区分「无效调用」与「执行失败」。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 工具错误：UnknownTool / InvalidArguments 归因于模型（无效调用），其余为执行失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl ToolError {
    /// 是否为模型可自行纠正的无效调用
    pub fn is_invalid_call(&self) -> bool {
        matches!(self, ToolError::UnknownTool(_) | ToolError::InvalidArguments(_))
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 action 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// 取必填字符串参数，缺失或类型不对时为 InvalidArguments
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string parameter `{key}`")))
}

/// 取可选无符号整数参数；存在但类型不对时为 InvalidArguments
pub fn optional_u64(args: &Value, key: &str) -> Result<Option<u64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!("`{key}` must be a non-negative integer"))
            }),
    }
}

/// 工具注册表：按名称有序存储，描述渲染顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        if !args.is_object() {
            return Err(ToolError::InvalidArguments("parameters must be an object".to_string()));
        }
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 渲染 prompt 中的 `${tool_list}`：每个工具一段（名称、描述、参数 schema）
    pub fn list_descriptions(&self) -> String {
        self.tools
            .iter()
            .map(|(name, tool)| {
                let schema = serde_json::to_string(&tool.parameters_schema())
                    .unwrap_or_else(|_| "{}".to_string());
                format!("- {}: {}\n  parameters: {}", name, tool.description(), schema)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
