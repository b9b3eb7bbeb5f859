//! 回复格式 JSON Schema（schemars 生成）
//!
//! 注入 system prompt 的 `${response_schema}`，让模型看到与 parser 一致的结构约束。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 模型每轮回复的结构（仅用于 Schema 生成，解析走 parser::parse）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ResponseFormat {
    /// 用户问题的回显
    pub question: Option<String>,
    /// 对当前任务的思考，每次回复都应给出
    pub thought: String,
    /// 要执行的工具调用；给出 action 时不要给 final_answer
    pub action: Option<Vec<ToolCallFormat>>,
    /// 最终答案；得出结论前不要给出
    pub final_answer: Option<String>,
}

/// 单个工具调用：`tool` 为工具名，其余字段为该工具的参数
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    pub tool: String,
    #[serde(flatten)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// 返回回复格式的 JSON Schema 字符串
pub fn response_schema_json() -> String {
    let schema = schema_for!(ResponseFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
