//! 对话记录与会话管理
//!
//! Turn 为转录中的单条消息（按角色标记）；ConversationManager 独占整段转录，
//! 维护已完成交互计数，并决定何时重新下发系统提示（刷新会丢弃历史，是有损操作）。

use serde::{Deserialize, Serialize};

/// 格式违规时回送给模型的恢复信号键名
pub const FORMAT_RECOVERY_KEY: &str = "Incorrect_answer_format";

const FORMAT_RECOVERY_MESSAGE: &str = "Your previous reply could not be parsed. \
Resend it as a single valid JSON object (check both the overall structure and any \
characters inside string values that break it).";

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Model,
    Observation,
}

/// 单条转录消息；创建后不再修改
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }

    pub fn observation(content: impl Into<String>) -> Self {
        Self {
            role: Role::Observation,
            content: content.into(),
        }
    }
}

/// 会话管理器：只追加的转录 + 交互计数 + 刷新策略
///
/// `refresh` 与 `seed` 等价，会整体替换转录：之前的所有轮次都会丢失，
/// 换取上下文长度可控、模型周期性地重新看到完整系统提示。
#[derive(Clone, Debug)]
pub struct ConversationManager {
    turns: Vec<Turn>,
    interaction_count: u64,
    refresh_interval: u64,
    /// 上一次刷新时的交互计数，同一计数值只刷新一次
    last_refresh_at: Option<u64>,
}

impl ConversationManager {
    /// refresh_interval 为 0 时按 1 处理
    pub fn new(refresh_interval: u64) -> Self {
        Self {
            turns: Vec::new(),
            interaction_count: 0,
            refresh_interval: refresh_interval.max(1),
            last_refresh_at: None,
        }
    }

    /// 用 [system, user] 两条消息替换整段转录
    pub fn seed(&mut self, user_question: &str, system_prompt: &str) {
        self.turns = vec![
            Turn::system(system_prompt),
            Turn::user(format_question(user_question)),
        ];
    }

    /// 有损：丢弃全部历史后重新 seed
    pub fn refresh(&mut self, user_question: &str, system_prompt: &str) {
        let dropped = self.turns.len();
        self.seed(user_question, system_prompt);
        self.last_refresh_at = Some(self.interaction_count);
        tracing::debug!(
            dropped_turns = dropped,
            interactions = self.interaction_count,
            "conversation refreshed with system prompt"
        );
    }

    pub fn append_model_turn(&mut self, text: &str) {
        self.turns.push(Turn::model(text));
    }

    /// 工具执行结果，以 {"observation": ...} 形式写入
    pub fn append_observation(&mut self, text: &str) {
        let body = serde_json::json!({ "observation": text });
        self.turns.push(Turn::observation(body.to_string()));
    }

    pub fn append_user_question(&mut self, text: &str) {
        self.turns.push(Turn::user(format_question(text)));
    }

    /// 格式违规恢复信号：单键 JSON 对象，值中附带分类细节
    pub fn append_error_observation(&mut self, detail: &str) {
        let message = if detail.is_empty() {
            FORMAT_RECOVERY_MESSAGE.to_string()
        } else {
            format!("{} Problem: {}", FORMAT_RECOVERY_MESSAGE, detail)
        };
        let mut body = serde_json::Map::new();
        body.insert(FORMAT_RECOVERY_KEY.to_string(), message.into());
        self.turns
            .push(Turn::observation(serde_json::Value::Object(body).to_string()));
    }

    /// 每产出一次 final_answer 调用一次，返回新的计数
    pub fn complete_interaction(&mut self) -> u64 {
        self.interaction_count += 1;
        self.interaction_count
    }

    /// 计数为 refresh_interval 的正整数倍，且该计数值尚未刷新过
    pub fn should_refresh(&self) -> bool {
        self.interaction_count > 0
            && self.interaction_count % self.refresh_interval == 0
            && self.last_refresh_at != Some(self.interaction_count)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn interaction_count(&self) -> u64 {
        self.interaction_count
    }

    pub fn refresh_interval(&self) -> u64 {
        self.refresh_interval
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

fn format_question(text: &str) -> String {
    format!("question: {}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_replaces_transcript() {
        let mut conv = ConversationManager::new(3);
        conv.seed("first", "SYS");
        conv.append_model_turn("{}");
        conv.seed("second", "SYS2");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.turns()[0], Turn::system("SYS2"));
        assert_eq!(conv.turns()[1], Turn::user("question: second"));
    }

    #[test]
    fn test_append_only_order() {
        let mut conv = ConversationManager::new(3);
        conv.seed("q", "SYS");
        conv.append_model_turn("m");
        conv.append_observation("result");
        conv.append_user_question("q2");
        let roles: Vec<Role> = conv.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Model, Role::Observation, Role::User]
        );
        let obs: serde_json::Value = serde_json::from_str(&conv.turns()[3].content).unwrap();
        assert_eq!(obs["observation"], "result");
    }

    #[test]
    fn test_error_observation_is_single_key_json() {
        let mut conv = ConversationManager::new(3);
        conv.seed("q", "SYS");
        conv.append_error_observation("missing both `action` and `final_answer`");
        let last = conv.turns().last().unwrap();
        assert_eq!(last.role, Role::Observation);
        let v: serde_json::Value = serde_json::from_str(&last.content).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj[FORMAT_RECOVERY_KEY].as_str().unwrap().contains("final_answer"));
    }

    #[test]
    fn test_should_refresh_cadence() {
        let mut conv = ConversationManager::new(3);
        assert!(!conv.should_refresh());
        conv.complete_interaction();
        conv.complete_interaction();
        assert!(!conv.should_refresh());
        assert_eq!(conv.complete_interaction(), 3);
        assert!(conv.should_refresh());
        conv.refresh("next", "SYS");
        assert!(!conv.should_refresh(), "same count must not refresh twice");
        conv.complete_interaction();
        conv.complete_interaction();
        conv.complete_interaction();
        assert!(conv.should_refresh());
    }

    #[test]
    fn test_zero_interval_clamped() {
        let mut conv = ConversationManager::new(0);
        assert_eq!(conv.refresh_interval(), 1);
        conv.complete_interaction();
        assert!(conv.should_refresh());
    }
}
