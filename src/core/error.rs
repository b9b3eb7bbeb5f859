//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / AskUser / Abort。
//! 可恢复的错误写回对话交给模型纠正，只有内部故障会从循环中传播出去。

use thiserror::Error;

use crate::llm::LlmError;
use crate::react::MalformedReason;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 修复后仍不满足回复格式
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] MalformedReason),

    /// 模型调用失败（重试耗尽）
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Prompt error: {0}")]
    PromptError(String),

    /// 循环内部契约被破坏
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将纠正信号写入对话，让模型在下一步重试（消耗步数）
    RetryWithPrompt(String),
    /// 放弃当前推理链，把控制权交还给用户
    AskUser(String),
    /// 终止运行
    Abort,
}
