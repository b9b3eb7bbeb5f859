//! 认知层：回复修复与解析、工具分发、系统提示、输入通道、ReAct 主循环

pub mod channel;
pub mod dispatch;
pub mod events;
pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod repair;
pub mod schema;

pub use channel::{ScriptedChannel, StdinChannel, UserChannel};
pub use dispatch::{render_observation, CallOutcome, DispatchRecord, ToolDispatch};
pub use events::ReactEvent;
pub use loop_::{AgentLoop, LoopSettings, LoopState, RunOutcome, TASK_INCOMPLETE_MESSAGE};
pub use parser::{parse, MalformedReason, StructuredResponse, ToolCall};
pub use prompt::{file_list, operating_system_name, PromptRenderer, DEFAULT_TEMPLATE};
pub use repair::repair;
pub use schema::response_schema_json;
