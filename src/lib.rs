//! ReAgent - 单会话 ReAct 智能体
//!
//! 模块划分：
//! - **agent**: 按配置装配 Agent 循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复策略
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock），带重试
//! - **memory**: 对话转录与系统提示刷新
//! - **observability**: 日志初始化
//! - **react**: 回复修复与解析、工具分发、系统提示、ReAct 主循环
//! - **tools**: 工具箱（文件、终端、搜索）与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
