//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / DeepSeek / Mock）实现 LlmClient::complete：
//! 输入有序转录，返回模型原始文本。RetryingLlmClient 为任意客户端加上有界重试与单次超时。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Turn;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("model returned no content")]
    EmptyResponse,

    /// 所有重试均失败，携带最后一次错误
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 重试配置：max_retries 为首次之外的额外尝试次数，退避线性增长
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: Duration,
    /// 单次尝试超时；None 表示不限
    pub request_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// 带重试的客户端包装
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn attempt(&self, turns: &[Turn]) -> Result<String, LlmError> {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(turns))
                .await
                .map_err(|_| LlmError::Timeout(limit.as_millis() as u64))?,
            None => self.inner.complete(turns).await,
        }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmError> {
        let attempts = self.config.max_retries + 1;
        let mut last = LlmError::EmptyResponse;
        for attempt in 1..=attempts {
            match self.attempt(turns).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(attempt, max = attempts, error = %e, "LLM call failed");
                    let wait = match &e {
                        LlmError::RateLimited { retry_after_ms } => {
                            Duration::from_millis(*retry_after_ms).max(self.config.backoff)
                        }
                        _ => self.config.backoff * attempt,
                    };
                    last = e;
                    if attempt < attempts {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(LlmError::RetriesExhausted {
            attempts,
            last: Box::new(last),
        })
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff: Duration::from_millis(10),
            request_timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let inner = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Request("503".into())),
            Ok(r#"{"final_answer": "ok"}"#.to_string()),
        ]));
        let client = RetryingLlmClient::new(inner.clone(), config(2));
        let text = client.complete(&[]).await.unwrap();
        assert!(text.contains("ok"));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted() {
        let inner = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Request("a".into())),
            Err(LlmError::Request("b".into())),
        ]));
        let client = RetryingLlmClient::new(inner.clone(), config(1));
        let err = client.complete(&[]).await.unwrap_err();
        match err {
            LlmError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(*last, LlmError::Request("b".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(inner.calls(), 2);
    }
}
