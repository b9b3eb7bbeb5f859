//! 兼容端点预设与按配置创建客户端
//!
//! Gemini 与 DeepSeek 都提供 OpenAI 兼容接口：
//! - Gemini: https://generativelanguage.googleapis.com/v1beta/openai/ （GOOGLE_API_KEY / GEMINI_API_KEY）
//! - DeepSeek: https://api.deepseek.com （DEEPSEEK_API_KEY）
//!
//! 找不到对应 API Key 时退回 Mock 客户端并告警。

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.5-flash";

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    DeepSeek,
    OpenAi,
    Mock,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "deepseek" => Some(Provider::DeepSeek),
            "openai" => Some(Provider::OpenAi),
            "mock" => Some(Provider::Mock),
            _ => None,
        }
    }

    /// 依次查找的环境变量
    fn key_vars(self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Provider::DeepSeek => &["DEEPSEEK_API_KEY"],
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Mock => &[],
        }
    }

    fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::Gemini => Some(GEMINI_BASE_URL),
            Provider::DeepSeek => Some(DEEPSEEK_BASE_URL),
            Provider::OpenAi | Provider::Mock => None,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => GEMINI_FLASH,
            Provider::DeepSeek => DEEPSEEK_CHAT,
            Provider::OpenAi | Provider::Mock => OPENAI_DEFAULT_MODEL,
        }
    }
}

fn api_key_for(provider: Provider) -> Option<String> {
    provider
        .key_vars()
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
}

/// 配置未指定模型时取后端预设
fn resolve_model(provider: Provider, configured: &str) -> String {
    match configured.trim() {
        "" => provider.default_model().to_string(),
        model => model.to_string(),
    }
}

/// 按 [llm] 配置创建传输客户端（未加重试包装）
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = Provider::parse(&cfg.provider).unwrap_or_else(|| {
        tracing::warn!(provider = %cfg.provider, "Unknown LLM provider, using Mock LLM");
        Provider::Mock
    });
    if provider == Provider::Mock {
        return Arc::new(MockLlmClient);
    }

    let Some(api_key) = api_key_for(provider) else {
        tracing::warn!(
            ?provider,
            vars = ?provider.key_vars(),
            "No API key set for provider, using Mock LLM"
        );
        return Arc::new(MockLlmClient);
    };

    let model = resolve_model(provider, &cfg.model);
    let base_url = cfg.base_url.as_deref().or(provider.default_base_url());
    tracing::info!(?provider, model = %model, "Using LLM");
    Arc::new(OpenAiClient::new(base_url, &model, Some(api_key.as_str())))
}
