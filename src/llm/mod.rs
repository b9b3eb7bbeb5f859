//! LLM 层：传输抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{create_llm_from_config, Provider};
pub use traits::{LlmClient, LlmError, RetryConfig, RetryingLlmClient};
