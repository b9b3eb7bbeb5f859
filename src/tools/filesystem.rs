//! 文件系统工具
//!
//! SafeFs 可选绑定沙箱根目录：设置了根时，所有路径（相对路径按根解析）必须落在根下，
//! 禁止 ../ 逃逸；未设置时按原样访问（相对路径按进程工作目录解析）。
//! ReadFileTool / ListDirectoryTool / WriteFileTool 基于 SafeFs。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{required_str, Tool, ToolError};

/// 单文件读取上限
const MAX_READ_BYTES: u64 = 2 * 1024 * 1024;

/// 文件系统访问守卫
#[derive(Debug, Clone, Default)]
pub struct SafeFs {
    root_dir: Option<PathBuf>,
}

impl SafeFs {
    pub fn new(root_dir: Option<&Path>) -> Self {
        let root_dir = root_dir.map(|r| r.canonicalize().unwrap_or_else(|_| r.to_path_buf()));
        Self { root_dir }
    }

    /// 解析路径并做沙箱校验；目标可以尚不存在（写文件场景）
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ToolError::InvalidArguments("empty path".to_string()));
        }
        let raw = Path::new(path);
        let Some(root) = &self.root_dir else {
            return Ok(raw.to_path_buf());
        };
        let full = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            root.join(raw)
        };
        let normalized = normalize(&full);
        // 存在的路径再 canonicalize 一次，防止符号链接逃逸
        let checked = normalized.canonicalize().unwrap_or_else(|_| normalized.clone());
        if checked.starts_with(root) {
            Ok(checked)
        } else {
            Err(ToolError::InvalidArguments(format!(
                "path '{}' is outside the allowed root {}",
                path,
                root.display()
            )))
        }
    }

    pub fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        let meta = std::fs::metadata(&resolved)
            .map_err(|e| ToolError::Failed(format!("cannot stat {}: {}", resolved.display(), e)))?;
        if meta.len() > MAX_READ_BYTES {
            return Err(ToolError::Failed(format!(
                "{} is too large ({} bytes)",
                resolved.display(),
                meta.len()
            )));
        }
        std::fs::read_to_string(&resolved)
            .map_err(|e| ToolError::Failed(format!("read failed: {}", e)))
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, ToolError> {
        let base = self.resolve(path)?;
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base)
            .map_err(|e| ToolError::Failed(format!("list failed: {}", e)))?
        {
            let e = e.map_err(|e| ToolError::Failed(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            let ty = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                "/"
            } else {
                ""
            };
            entries.push(format!("{}{}", name, ty));
        }
        entries.sort();
        Ok(entries)
    }

    pub fn write_file(
        &self,
        path: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<PathBuf, ToolError> {
        let resolved = self.resolve(path)?;
        if resolved.exists() && !overwrite {
            return Err(ToolError::InvalidArguments(format!(
                "{} already exists; pass \"overwrite\": true to replace it",
                resolved.display()
            )));
        }
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::Failed(format!("cannot create parent directory: {}", e)))?;
        }
        std::fs::write(&resolved, content)
            .map_err(|e| ToolError::Failed(format!("write failed: {}", e)))?;
        Ok(resolved)
    }
}

/// 词法上消去 `.` 与 `..`
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 读取文件内容
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file. Use an absolute path."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Absolute path of the file" }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "file_path")?;
        tracing::info!(path = %path, "read_file tool execute");
        self.fs.read_file(path)
    }
}

/// 列出目录
pub struct ListDirectoryTool {
    fs: SafeFs,
}

impl ListDirectoryTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory (directories end with '/')."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute path of the directory" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "path")?;
        tracing::info!(path = %path, "list_directory tool execute");
        Ok(self.fs.list_dir(path)?.join("\n"))
    }
}

/// 写入文件：自动创建父目录，默认不覆盖已存在文件
pub struct WriteFileTool {
    fs: SafeFs,
    max_file_size: usize,
}

impl WriteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self {
            fs,
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_to_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories. Existing files are only replaced when overwrite is true. Use \\n for line breaks inside content."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Absolute path of the file" },
                "content": { "type": "string", "description": "Full file content" },
                "overwrite": { "type": "boolean", "description": "Replace an existing file (default false)" }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let path = required_str(&args, "file_path")?;
        let content = required_str(&args, "content")?;
        let overwrite = match args.get("overwrite") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ToolError::InvalidArguments("`overwrite` must be a boolean".to_string()))
            }
        };
        if content.len() > self.max_file_size {
            return Err(ToolError::InvalidArguments(format!(
                "content exceeds {} bytes",
                self.max_file_size
            )));
        }
        tracing::info!(path = %path, bytes = content.len(), "write_to_file tool execute");
        let written = self.fs.write_file(path, content, overwrite)?;
        Ok(format!("Wrote {} bytes to {}", content.len(), written.display()))
    }
}
