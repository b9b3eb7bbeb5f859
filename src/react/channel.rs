//! 人类输入通道
//!
//! 循环通过 UserChannel 拉取下一个问题并交付最终回复，不直接读写终端；
//! StdinChannel 为交互式终端实现，ScriptedChannel 按预设问题驱动，用于测试与批处理。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// 拉取式输入 + 回复输出
#[async_trait]
pub trait UserChannel: Send {
    /// 下一个问题；None 表示用户结束会话
    async fn next_question(&mut self) -> Option<String>;

    /// 交付最终回复
    async fn send_answer(&mut self, answer: &str);

    /// 非回复类通知（如模型不可用、步数耗尽）；默认与回复相同
    async fn notify(&mut self, message: &str) {
        self.send_answer(message).await;
    }
}

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];
const QUESTION_PROMPT: &str = "Question: ";

/// 终端通道：从 stdin 逐行读取问题，回复写到 stdout
pub struct StdinChannel {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinChannel {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserChannel for StdinChannel {
    async fn next_question(&mut self) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        loop {
            let _ = stdout.write_all(QUESTION_PROMPT.as_bytes()).await;
            let _ = stdout.flush().await;
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read from stdin");
                    return None;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if EXIT_WORDS.iter().any(|w| line.eq_ignore_ascii_case(w)) {
                return None;
            }
            return Some(line.to_string());
        }
    }

    async fn send_answer(&mut self, answer: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(format!("Answer: {}\n", answer).as_bytes()).await;
        let _ = stdout.flush().await;
    }

    async fn notify(&mut self, message: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(format!("{}\n", message).as_bytes()).await;
        let _ = stdout.flush().await;
    }
}

/// 脚本通道：依次弹出预设问题，记录收到的回复与通知
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    questions: VecDeque<String>,
    pub answers: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedChannel {
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            questions: questions.into_iter().map(Into::into).collect(),
            answers: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// 尚未被取走的问题数
    pub fn remaining(&self) -> usize {
        self.questions.len()
    }
}

#[async_trait]
impl UserChannel for ScriptedChannel {
    async fn next_question(&mut self) -> Option<String> {
        self.questions.pop_front()
    }

    async fn send_answer(&mut self, answer: &str) {
        self.answers.push(answer.to_string());
    }

    async fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
