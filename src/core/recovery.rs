//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 agent 循环决定是重试、询问用户还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::MalformedResponse(reason) => {
                RecoveryAction::RetryWithPrompt(reason.to_string())
            }
            AgentError::LlmError(e) => RecoveryAction::AskUser(format!(
                "The model could not be reached ({e}). Please ask again or rephrase."
            )),
            AgentError::ConfigError(_) | AgentError::PromptError(_) | AgentError::Internal(_) => {
                RecoveryAction::Abort
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::react::MalformedReason;

    #[test]
    fn test_recovery_malformed() {
        let engine = RecoveryEngine::new();
        let err = AgentError::from(MalformedReason::EmptyAction);
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => assert!(msg.contains("at least one")),
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_llm_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::from(LlmError::RateLimited { retry_after_ms: 1000 });
        assert!(matches!(engine.handle(&err), RecoveryAction::AskUser(_)));
    }

    #[test]
    fn test_recovery_internal() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Internal("dispatch with no calls".to_string());
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
    }
}
