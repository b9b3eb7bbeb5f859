//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `REAGENT__*` 覆盖（双下划线表示嵌套，如 `REAGENT__LLM__PROVIDER=deepseek`）。
//! API Key 只从环境变量读取（见 llm::providers），不进配置文件。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::RetryConfig;
use crate::react::LoopSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [agent] 段：步数上限、刷新周期、工作目录、诊断输出
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 单次交互内最多调用模型的次数
    pub max_steps: usize,
    /// 每完成多少次交互重新下发系统提示（丢弃历史）
    pub refresh_interval: u64,
    /// 文件列表来源目录，也是 shell 工具的工作目录
    pub project_directory: PathBuf,
    /// 在 stderr 打印模型回复、工具调用等诊断信息
    pub show_system_messages: bool,
    /// 覆盖内置系统提示模板的文件
    pub prompt_template: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: 10,
            refresh_interval: 3,
            project_directory: PathBuf::from("."),
            show_system_messages: false,
            prompt_template: None,
        }
    }
}

impl AgentSection {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_steps: self.max_steps,
            refresh_interval: self.refresh_interval,
        }
    }
}

/// [llm] 段：后端选择、重试与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / deepseek / openai / mock
    pub provider: String,
    /// 为空时用后端默认模型
    pub model: String,
    pub base_url: Option<String>,
    pub retry: LlmRetrySection,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: String::new(),
            base_url: None,
            retry: LlmRetrySection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            backoff: Duration::from_millis(self.retry.backoff_ms),
            request_timeout: (self.timeouts.request > 0)
                .then(|| Duration::from_secs(self.timeouts.request)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmRetrySection {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），0 表示不限
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：文件系统根、工具超时、Shell 白名单、Search
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 文件工具的沙箱根；未设置时不限制
    pub filesystem_root: Option<PathBuf>,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub shell: ShellSection,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            filesystem_root: None,
            tool_timeout_secs: 30,
            shell: ShellSection::default(),
            search: SearchSection::default(),
        }
    }
}

/// [tools.shell] 段：允许执行的命令名（仅首词，如 ls、grep、python）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub allowed_commands: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: [
                "ls", "pwd", "echo", "cat", "head", "tail", "wc", "grep", "find", "date", "python",
                "python3", "cargo", "git",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// [tools.search] 段：请求超时、结果最大字符数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_result_chars: 4000,
        }
    }
}

impl AppConfig {
    /// 加载后校验取值范围
    pub fn validate(&self) -> Result<(), String> {
        if self.agent.max_steps == 0 {
            return Err("agent.max_steps must be greater than 0".to_string());
        }
        if self.agent.refresh_interval == 0 {
            return Err("agent.refresh_interval must be greater than 0".to_string());
        }
        if self.tools.tool_timeout_secs == 0 {
            return Err("tools.tool_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 REAGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 REAGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("REAGENT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate().map_err(config::ConfigError::Message)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_steps, 10);
        assert_eq!(cfg.agent.refresh_interval, 3);
        assert_eq!(cfg.llm.provider, "gemini");
        assert!(cfg.llm.model.is_empty());
        assert!(cfg.validate().is_ok());
        let retry = cfg.llm.retry_config();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.request_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "[agent]\nmax_steps = 4\nshow_system_messages = true\n\n[llm]\nprovider = \"mock\"\n\n[llm.timeouts]\nrequest = 0\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.agent.max_steps, 4);
        assert!(cfg.agent.show_system_messages);
        assert_eq!(cfg.agent.refresh_interval, 3);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.retry_config().request_timeout, None);
    }

    #[test]
    fn test_provider_switch_leaves_model_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deepseek.toml");
        std::fs::write(&path, "[llm]\nprovider = \"deepseek\"\n").unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "deepseek");
        assert!(cfg.llm.model.trim().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 0\n").unwrap();
        let err = load_config(Some(path)).unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(PathBuf::from("/no/such/agent.toml"))).is_err());
    }
}
