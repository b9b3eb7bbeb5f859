//! 可观测性：tracing 日志初始化（输出到 stderr，stdout 留给问答）

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认 info，verbose 时 debug；RUST_LOG 优先
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
