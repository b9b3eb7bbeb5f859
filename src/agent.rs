//! Agent 装配
//!
//! 按 AppConfig 构建 ReAct 循环：LLM（带重试）、工具注册表（文件 / 终端 / 搜索）、
//! 执行器超时、系统提示渲染器与循环参数。create_agent_with_llm 供测试与嵌入方注入自定义传输。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, LlmClient, RetryingLlmClient};
use crate::react::{AgentLoop, PromptRenderer};
use crate::tools::{
    ListDirectoryTool, ReadFileTool, SafeFs, SearchTool, ShellTool, ToolExecutor, ToolRegistry,
    WriteFileTool,
};

/// 内置工具：read_file / list_directory / write_to_file / run_terminal_command / search_web
pub fn build_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let fs = SafeFs::new(cfg.tools.filesystem_root.as_deref());

    let mut tools = ToolRegistry::new();
    tools.register(ReadFileTool::new(fs.clone()));
    tools.register(ListDirectoryTool::new(fs.clone()));
    tools.register(WriteFileTool::new(fs));
    tools.register(
        ShellTool::new(
            cfg.tools.shell.allowed_commands.clone(),
            cfg.tools.tool_timeout_secs,
        )
        .with_working_dir(cfg.agent.project_directory.clone()),
    );
    tools.register(SearchTool::new(
        cfg.tools.search.timeout_secs,
        cfg.tools.search.max_result_chars,
    ));
    tools
}

/// 从配置创建 Agent：后端由 [llm] 决定，外层包一层重试
pub fn create_agent(cfg: &AppConfig) -> Result<AgentLoop, AgentError> {
    let transport = create_llm_from_config(&cfg.llm);
    let llm: Arc<dyn LlmClient> =
        Arc::new(RetryingLlmClient::new(transport, cfg.llm.retry_config()));
    create_agent_with_llm(cfg, llm)
}

/// 使用给定传输创建 Agent（不再额外包装重试）
pub fn create_agent_with_llm(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
) -> Result<AgentLoop, AgentError> {
    cfg.validate().map_err(AgentError::ConfigError)?;

    let registry = build_tool_registry(cfg);
    let mut renderer = PromptRenderer::new(
        cfg.agent.project_directory.clone(),
        registry.list_descriptions(),
    );
    if let Some(path) = &cfg.agent.prompt_template {
        renderer = renderer.with_template_file(path)?;
    }
    tracing::info!(
        tools = ?registry.tool_names(),
        max_steps = cfg.agent.max_steps,
        refresh_interval = cfg.agent.refresh_interval,
        "agent assembled"
    );

    let executor = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);
    Ok(AgentLoop::new(llm, executor, renderer, cfg.agent.loop_settings()))
}
