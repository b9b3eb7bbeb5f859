//! Mock LLM 客户端（无需 API）
//!
//! MockLlmClient 取最后一条 User 消息，回显为 final_answer，便于本地跑通循环；
//! ScriptedLlmClient 按脚本依次返回预设回复，并记录每次调用看到的转录，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Role, Turn};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmError> {
        let last_user = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.trim_start_matches("question: "))
            .unwrap_or("(no input)");

        let reply = serde_json::json!({
            "thought": "No model is configured; echoing the question.",
            "final_answer": format!("Echo from Mock: {}", last_user),
        });
        Ok(reply.to_string())
    }
}

/// 脚本客户端：依次弹出预设结果；脚本耗尽后返回 fallback（未设置则报 EmptyResponse）
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 全部为成功回复的脚本
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// 每次调用时传入的转录快照
    pub fn transcripts(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(turns.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(result) => result,
            None => self.fallback.clone().ok_or(LlmError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_question() {
        let turns = vec![Turn::system("SYS"), Turn::user("question: hello")];
        let text = MockLlmClient.complete(&turns).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["final_answer"], "Echo from Mock: hello");
    }

    #[tokio::test]
    async fn test_scripted_then_fallback() {
        let client = ScriptedLlmClient::from_replies(["a"]).with_fallback("z");
        assert_eq!(client.complete(&[]).await.unwrap(), "a");
        assert_eq!(client.complete(&[]).await.unwrap(), "z");
        assert_eq!(client.calls(), 2);
    }
}
