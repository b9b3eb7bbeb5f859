//! 工具箱：注册表（工具管理器）、执行器与内置工具

pub mod executor;
pub mod filesystem;
pub mod registry;
pub mod search;
pub mod shell;

pub use executor::ToolExecutor;
pub use filesystem::{ListDirectoryTool, ReadFileTool, SafeFs, WriteFileTool};
pub use registry::{optional_u64, required_str, Tool, ToolError, ToolRegistry};
pub use search::SearchTool;
pub use shell::ShellTool;
