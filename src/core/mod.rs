//! 核心层：错误分类与恢复动作

pub mod error;
pub mod recovery;

pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
