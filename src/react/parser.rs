//! 结构化回复解析
//!
//! 将（已修复的）文本解码为 JSON 对象并分类：含 `final_answer` 为 FinalAnswer，
//! 否则含 `action` 为 Action（必须是非空数组，每项是带非空 `tool` 字符串的对象），
//! 其余一律为 Malformed。两个键同时出现时 final_answer 优先。parse 永不失败。

use serde_json::{Map, Value};
use thiserror::Error;

/// 单次工具调用：工具名 + 其余字段作为参数
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            parameters,
        }
    }

    /// 参数作为 JSON 对象（交给 Tool::execute）
    pub fn arguments(&self) -> Value {
        Value::Object(self.parameters.clone())
    }
}

/// 回复无法满足格式约束的具体原因；不同原因给模型不同的纠正提示
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("the reply was empty")]
    Empty,

    #[error("the reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("the reply must be a JSON object, not {0}")]
    NotAnObject(&'static str),

    #[error("the reply contains neither `action` nor `final_answer`")]
    MissingKeys,

    #[error("`action` must be an array of tool calls")]
    ActionNotArray,

    #[error("`action` must contain at least one tool call")]
    EmptyAction,

    #[error("`action[{0}]` must be an object")]
    ActionEntryNotObject(usize),

    #[error("`action[{0}]` is missing a non-empty string `tool` field")]
    MissingTool(usize),
}

/// 模型回复的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResponse {
    FinalAnswer {
        question: Option<String>,
        thought: Option<String>,
        final_answer: String,
    },
    Action {
        question: Option<String>,
        thought: Option<String>,
        action: Vec<ToolCall>,
    },
    Malformed {
        raw_text: String,
        reason: MalformedReason,
    },
}

impl StructuredResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            StructuredResponse::FinalAnswer { .. } => "final_answer",
            StructuredResponse::Action { .. } => "action",
            StructuredResponse::Malformed { .. } => "malformed",
        }
    }
}

/// 解析并分类
pub fn parse(text: &str) -> StructuredResponse {
    match classify(text) {
        Ok(resp) => resp,
        Err(reason) => StructuredResponse::Malformed {
            raw_text: text.to_string(),
            reason,
        },
    }
}

fn classify(text: &str) -> Result<StructuredResponse, MalformedReason> {
    if text.trim().is_empty() {
        return Err(MalformedReason::Empty);
    }
    let value: Value =
        serde_json::from_str(text).map_err(|e| MalformedReason::InvalidJson(e.to_string()))?;
    let record = match value {
        Value::Object(record) => record,
        other => return Err(MalformedReason::NotAnObject(json_type_name(&other))),
    };

    let question = optional_text(&record, "question");
    let thought = optional_text(&record, "thought");

    if let Some(answer) = record.get("final_answer") {
        return Ok(StructuredResponse::FinalAnswer {
            question,
            thought,
            final_answer: value_to_text(answer),
        });
    }

    if let Some(action) = record.get("action") {
        return Ok(StructuredResponse::Action {
            question,
            thought,
            action: parse_action(action)?,
        });
    }

    Err(MalformedReason::MissingKeys)
}

fn parse_action(action: &Value) -> Result<Vec<ToolCall>, MalformedReason> {
    let entries = action.as_array().ok_or(MalformedReason::ActionNotArray)?;
    if entries.is_empty() {
        return Err(MalformedReason::EmptyAction);
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let obj = entry
                .as_object()
                .ok_or(MalformedReason::ActionEntryNotObject(index))?;
            let tool = obj
                .get("tool")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(MalformedReason::MissingTool(index))?;
            let mut parameters = obj.clone();
            parameters.remove("tool");
            Ok(ToolCall::new(tool, parameters))
        })
        .collect()
}

fn optional_text(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::Null => None,
        v => Some(value_to_text(v)),
    }
}

/// 字符串原样返回，其它类型转为紧凑 JSON 文本
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer() {
        let resp = parse(r#"{"final_answer": "42"}"#);
        assert_eq!(
            resp,
            StructuredResponse::FinalAnswer {
                question: None,
                thought: None,
                final_answer: "42".to_string(),
            }
        );
    }

    #[test]
    fn test_final_answer_wins_over_action() {
        let resp = parse(r#"{"thought": "t", "action": [{"tool": "x"}], "final_answer": "done"}"#);
        assert_eq!(resp.kind(), "final_answer");
    }

    #[test]
    fn test_non_string_final_answer_rendered() {
        match parse(r#"{"final_answer": 42}"#) {
            StructuredResponse::FinalAnswer { final_answer, .. } => assert_eq!(final_answer, "42"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_action_parameters_flattened() {
        let resp = parse(
            r#"{"question": "q", "thought": "t", "action": [{"tool": "search_web", "query": "x", "limit": 3}]}"#,
        );
        match resp {
            StructuredResponse::Action { question, thought, action } => {
                assert_eq!(question.as_deref(), Some("q"));
                assert_eq!(thought.as_deref(), Some("t"));
                assert_eq!(action.len(), 1);
                assert_eq!(action[0].tool, "search_web");
                assert_eq!(action[0].parameters.len(), 2);
                assert_eq!(action[0].parameters["limit"], 3);
                assert!(!action[0].parameters.contains_key("tool"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_action_order_preserved() {
        let resp = parse(r#"{"action": [{"tool": "a"}, {"tool": "b"}, {"tool": "c"}]}"#);
        let StructuredResponse::Action { action, .. } = resp else {
            panic!("expected action");
        };
        let names: Vec<&str> = action.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    fn reason(text: &str) -> MalformedReason {
        match parse(text) {
            StructuredResponse::Malformed { reason, raw_text } => {
                assert_eq!(raw_text, text);
                reason
            }
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_reasons_distinguishable() {
        assert_eq!(reason("   "), MalformedReason::Empty);
        assert!(matches!(reason("{oops"), MalformedReason::InvalidJson(_)));
        assert_eq!(reason("[1, 2]"), MalformedReason::NotAnObject("an array"));
        assert_eq!(reason(r#"{"thought": "hmm"}"#), MalformedReason::MissingKeys);
        assert_eq!(reason(r#"{"action": "search"}"#), MalformedReason::ActionNotArray);
        assert_eq!(reason(r#"{"action": []}"#), MalformedReason::EmptyAction);
        assert_eq!(
            reason(r#"{"action": [{"tool": "a"}, "b"]}"#),
            MalformedReason::ActionEntryNotObject(1)
        );
        assert_eq!(
            reason(r#"{"action": [{"query": "x"}]}"#),
            MalformedReason::MissingTool(0)
        );
        assert_eq!(
            reason(r#"{"action": [{"tool": "  "}]}"#),
            MalformedReason::MissingTool(0)
        );
    }
}
