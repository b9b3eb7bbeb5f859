//! 网页搜索工具：DuckDuckGo HTML 端点、超时、结果大小限制
//!
//! GET 请求带超时与 User-Agent；从结果页提取标题 / 链接 / 摘要，
//! 提取不到结构化结果时退回 html2text 全文；超过 max_result_chars 时截断并追加 ...[truncated]。

use std::sync::OnceLock;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use crate::tools::{optional_u64, required_str, Tool, ToolError};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 10;

static RESULT_LINK_RE: OnceLock<Regex> = OnceLock::new();
static RESULT_SNIPPET_RE: OnceLock<Regex> = OnceLock::new();

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// 搜索工具
pub struct SearchTool {
    client: Client,
    endpoint: String,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签并折叠空白
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    let out = out
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 从 DuckDuckGo 结果页提取结果（标题链接与摘要按出现顺序配对）
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let link_re = RESULT_LINK_RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
            .expect("static regex")
    });
    let snippet_re = RESULT_SNIPPET_RE.get_or_init(|| {
        Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#).expect("static regex")
    });

    let snippets: Vec<String> = snippet_re
        .captures_iter(html)
        .map(|c| strip_html_tags(&c[1]))
        .collect();

    link_re
        .captures_iter(html)
        .enumerate()
        .take(limit)
        .map(|(i, c)| SearchHit {
            title: strip_html_tags(&c[2]),
            url: c[1].replace("&amp;", "&"),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {}\n   {}\n   {}", i + 1, h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

impl SearchTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: SEARCH_ENDPOINT.to_string(),
            max_result_chars,
        }
    }

    /// 替换搜索端点（自建代理等）
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn truncate(&self, body: String) -> String {
        if body.chars().count() > self.max_result_chars {
            body.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]"
        } else {
            body
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<String, ToolError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ToolError::Failed(format!("HTTP {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("read body: {}", e)))?;

        let hits = parse_results(&body, limit);
        let text = if hits.is_empty() {
            match from_read(body.as_bytes(), 120) {
                Ok(text) if !text.trim().is_empty() => text,
                _ => strip_html_tags(&body),
            }
        } else {
            render_hits(&hits)
        };
        Ok(self.truncate(text))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, links and snippets of the top results."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Number of results (1-10, default 5)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("empty query".to_string()));
        }
        let limit = optional_u64(&args, "limit")?
            .map(|n| (n as usize).clamp(1, MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);
        tracing::info!(query = %query, limit, "search_web tool execute");
        self.search(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/a?x=1&amp;y=2">Example <b>A</b></a>
  <a class="result__snippet" href="https://example.com/a">First &amp; best <b>snippet</b></a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.org/b">Example B</a>
  <a class="result__snippet" href="https://example.org/b">Second snippet</a>
</div>
"#;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(PAGE, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Example A");
        assert_eq!(hits[0].url, "https://example.com/a?x=1&y=2");
        assert_eq!(hits[0].snippet, "First & best snippet");
        assert_eq!(hits[1].title, "Example B");
    }

    #[test]
    fn test_parse_results_limit() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid_call() {
        let tool = SearchTool::new(5, 1000);
        let err = tool.execute(serde_json::json!({"limit": 3})).await.unwrap_err();
        assert!(err.is_invalid_call());
        let err = tool
            .execute(serde_json::json!({"query": "x", "limit": "three"}))
            .await
            .unwrap_err();
        assert!(err.is_invalid_call());
    }
}
