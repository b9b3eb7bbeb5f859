//! ReAct 主循环
//!
//! 状态机：AwaitingUserInput -> AwaitingModel -> (Dispatching -> AwaitingModel)* -> AwaitingUserInput ...
//! 每次调用模型计一步，步数达到上限时整个运行以「任务未完成」结束；
//! 回到 AwaitingUserInput 取新问题时步数清零。格式违规、工具失败写回对话由模型自行纠正，
//! 模型调用失败放弃当前交互交还给用户，只有内部故障向外传播。
//! 可选 event_tx：推送 StepUpdate / ModelOutput / ToolCall / Observation 等诊断事件。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::LlmClient;
use crate::memory::ConversationManager;
use crate::react::{
    parse, render_observation, repair, PromptRenderer, ReactEvent, StructuredResponse, ToolCall,
    ToolDispatch, UserChannel,
};
use crate::tools::ToolExecutor;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 步数耗尽时交给用户的提示
pub const TASK_INCOMPLETE_MESSAGE: &str = "Task incomplete: the maximum number of steps was reached.";

/// 循环参数（来自配置 [agent]）
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_steps: usize,
    pub refresh_interval: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            refresh_interval: 3,
        }
    }
}

/// 循环所处状态
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingUserInput,
    AwaitingModel,
    Dispatching(Vec<ToolCall>),
    Done,
}

/// 运行结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 用户结束会话
    Done { interactions: u64 },
    /// 自上次取问题以来的模型调用次数达到上限
    StepBudgetExhausted { steps: usize, interactions: u64 },
}

pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    renderer: PromptRenderer,
    recovery: RecoveryEngine,
    conversation: ConversationManager,
    settings: LoopSettings,
    state: LoopState,
    step_count: usize,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl AgentLoop {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        renderer: PromptRenderer,
        settings: LoopSettings,
    ) -> Self {
        Self {
            llm,
            executor,
            renderer,
            recovery: RecoveryEngine::new(),
            conversation: ConversationManager::new(settings.refresh_interval),
            settings: LoopSettings {
                max_steps: settings.max_steps.max(1),
                ..settings
            },
            state: LoopState::AwaitingUserInput,
            step_count: 0,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn conversation(&self) -> &ConversationManager {
        &self.conversation
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    fn emit(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn log_token_usage(&self) {
        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");
    }

    /// 运行到用户结束会话或步数耗尽
    pub async fn run(&mut self, channel: &mut dyn UserChannel) -> Result<RunOutcome, AgentError> {
        loop {
            let state = std::mem::replace(&mut self.state, LoopState::Done);
            self.state = match state {
                LoopState::AwaitingUserInput => match channel.next_question().await {
                    Some(question) => {
                        self.begin_interaction(&question);
                        LoopState::AwaitingModel
                    }
                    None => LoopState::Done,
                },
                LoopState::AwaitingModel => {
                    if self.step_count >= self.settings.max_steps {
                        tracing::warn!(steps = self.step_count, "step budget exhausted");
                        self.emit(ReactEvent::BudgetExhausted {
                            steps: self.step_count,
                        });
                        channel.notify(TASK_INCOMPLETE_MESSAGE).await;
                        self.log_token_usage();
                        return Ok(RunOutcome::StepBudgetExhausted {
                            steps: self.step_count,
                            interactions: self.conversation.interaction_count(),
                        });
                    }
                    self.step_count += 1;
                    self.emit(ReactEvent::StepUpdate {
                        step: self.step_count,
                        max_steps: self.settings.max_steps,
                    });
                    self.model_step(channel).await?
                }
                LoopState::Dispatching(calls) => self.dispatch(&calls, channel).await?,
                LoopState::Done => {
                    let interactions = self.conversation.interaction_count();
                    tracing::info!(interactions, "agent loop finished");
                    self.log_token_usage();
                    return Ok(RunOutcome::Done { interactions });
                }
            };
        }
    }

    /// 新问题进入对话：首次 seed；达到刷新周期时 refresh（丢弃历史）；否则追加
    fn begin_interaction(&mut self, question: &str) {
        self.step_count = 0;
        self.emit(ReactEvent::Question {
            text: question.to_string(),
        });

        if self.conversation.is_empty() {
            let prompt = self.renderer.render();
            self.conversation.seed(question, &prompt);
            tracing::info!(prompt_chars = prompt.len(), "conversation seeded");
        } else if self.conversation.should_refresh() {
            let prompt = self.renderer.render();
            self.conversation.refresh(question, &prompt);
            let interactions = self.conversation.interaction_count();
            tracing::info!(interactions, "system prompt refreshed");
            self.emit(ReactEvent::PromptRefreshed { interactions });
        } else {
            self.conversation.append_user_question(question);
        }
    }

    async fn model_step(&mut self, channel: &mut dyn UserChannel) -> Result<LoopState, AgentError> {
        tracing::debug!(
            step = self.step_count,
            turns = self.conversation.len(),
            "calling model"
        );
        let reply = self.llm.complete(self.conversation.turns()).await;
        let text = match reply {
            Ok(text) => text,
            Err(e) => return self.recover(AgentError::from(e), channel).await,
        };
        self.conversation.append_model_turn(&text);
        self.emit(ReactEvent::ModelOutput { text: text.clone() });

        match parse(&repair(&text)) {
            StructuredResponse::FinalAnswer { final_answer, .. } => {
                channel.send_answer(&final_answer).await;
                let interactions = self.conversation.complete_interaction();
                tracing::info!(interactions, steps = self.step_count, "final answer");
                self.emit(ReactEvent::FinalAnswer {
                    text: final_answer,
                    interactions,
                });
                Ok(LoopState::AwaitingUserInput)
            }
            StructuredResponse::Action { action, .. } => Ok(LoopState::Dispatching(action)),
            StructuredResponse::Malformed { reason, .. } => {
                self.recover(AgentError::from(reason), channel).await
            }
        }
    }

    async fn dispatch(
        &mut self,
        calls: &[ToolCall],
        channel: &mut dyn UserChannel,
    ) -> Result<LoopState, AgentError> {
        for call in calls {
            self.emit(ReactEvent::ToolCall {
                tool: call.tool.clone(),
                args: call.arguments(),
            });
        }
        let dispatched = ToolDispatch::new(&self.executor).invoke_each(calls).await;
        let records = match dispatched {
            Ok(records) => records,
            Err(e) => return self.recover(e, channel).await,
        };
        let observation = render_observation(&records);
        self.emit(ReactEvent::Observation {
            preview: preview(&observation),
        });
        self.conversation.append_observation(&observation);
        Ok(LoopState::AwaitingModel)
    }

    /// 按 RecoveryEngine 的建议处理错误，返回下一状态
    async fn recover(
        &mut self,
        err: AgentError,
        channel: &mut dyn UserChannel,
    ) -> Result<LoopState, AgentError> {
        match self.recovery.handle(&err) {
            RecoveryAction::RetryWithPrompt(detail) => {
                tracing::warn!(step = self.step_count, detail = %detail, "malformed model reply");
                self.conversation.append_error_observation(&detail);
                self.emit(ReactEvent::FormatViolation { detail });
                Ok(LoopState::AwaitingModel)
            }
            RecoveryAction::AskUser(message) => {
                tracing::warn!(error = %err, "model call failed, abandoning interaction");
                self.emit(ReactEvent::TransportFailure {
                    text: err.to_string(),
                });
                channel.notify(&message).await;
                Ok(LoopState::AwaitingUserInput)
            }
            RecoveryAction::Abort => {
                tracing::error!(error = %err, "agent loop aborted");
                Err(err)
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::react::ScriptedChannel;
    use crate::tools::ToolRegistry;

    fn agent(llm: Arc<ScriptedLlmClient>, settings: LoopSettings) -> AgentLoop {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let renderer = PromptRenderer::new(".", "").with_template("SYS ${tool_list}");
        AgentLoop::new(llm, executor, renderer, settings)
    }

    #[tokio::test]
    async fn test_final_answer_then_done() {
        let llm = Arc::new(ScriptedLlmClient::from_replies([r#"{"final_answer": "42"}"#]));
        let mut agent = agent(llm.clone(), LoopSettings::default());
        let mut channel = ScriptedChannel::new(["what is 6*7?"]);
        let outcome = agent.run(&mut channel).await.unwrap();
        assert_eq!(outcome, RunOutcome::Done { interactions: 1 });
        assert_eq!(channel.answers, vec!["42"]);
        assert_eq!(agent.conversation().len(), 3);
        assert_eq!(agent.state(), &LoopState::Done);
    }

    #[tokio::test]
    async fn test_no_question_is_done() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let mut agent = agent(llm.clone(), LoopSettings::default());
        let mut channel = ScriptedChannel::new(Vec::<String>::new());
        let outcome = agent.run(&mut channel).await.unwrap();
        assert_eq!(outcome, RunOutcome::Done { interactions: 0 });
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).chars().count(), OBSERVATION_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
