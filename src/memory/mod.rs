//! 记忆层：短期对话转录（含周期性刷新）

pub mod conversation;

pub use conversation::{ConversationManager, Role, Turn, FORMAT_RECOVERY_KEY};
