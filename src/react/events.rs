//! ReAct 过程事件：用于诊断输出（show_system_messages）展示模型回复、工具调用、观察与刷新

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 新问题进入循环
    Question { text: String },
    /// ReAct 步数更新（当前第几步）
    StepUpdate { step: usize, max_steps: usize },
    /// 模型原始回复
    ModelOutput { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { preview: String },
    /// 回复不满足格式，已回送纠正信号
    FormatViolation { detail: String },
    /// 最终回复
    FinalAnswer { text: String, interactions: u64 },
    /// 系统提示已重新下发（历史被丢弃）
    PromptRefreshed { interactions: u64 },
    /// 模型调用失败，本次交互放弃
    TransportFailure { text: String },
    /// 步数耗尽
    BudgetExhausted { steps: usize },
}

impl ReactEvent {
    /// 单行可读形式，供终端诊断输出
    pub fn summary(&self) -> String {
        match self {
            ReactEvent::Question { text } => format!("question: {}", text),
            ReactEvent::StepUpdate { step, max_steps } => format!("step {}/{}", step, max_steps),
            ReactEvent::ModelOutput { text } => format!("model: {}", text),
            ReactEvent::ToolCall { tool, args } => format!("tool call: {} {}", tool, args),
            ReactEvent::Observation { preview } => format!("observation: {}", preview),
            ReactEvent::FormatViolation { detail } => format!("format violation: {}", detail),
            ReactEvent::FinalAnswer { interactions, .. } => {
                format!("final answer (interaction #{})", interactions)
            }
            ReactEvent::PromptRefreshed { interactions } => {
                format!("system prompt refreshed after {} interactions", interactions)
            }
            ReactEvent::TransportFailure { text } => format!("model call failed: {}", text),
            ReactEvent::BudgetExhausted { steps } => {
                format!("step budget exhausted after {} steps", steps)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_tagged() {
        let ev = ReactEvent::StepUpdate { step: 2, max_steps: 10 };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "step_update");
        assert_eq!(v["step"], 2);
        assert_eq!(ev.summary(), "step 2/10");
    }
}
