//! 模型回复的尽力修复
//!
//! 输入应为单个 JSON 对象，但模型常在字符串值里留下未转义的引号、原始换行/制表符、
//! 孤立反斜杠，或包一层 Markdown 代码围栏。repair 只做文本层面的修复，不解析结构：
//! 1. 去掉首尾代码围栏（大小写不敏感，可带语言标记）；
//! 2. 逐个扫描 `"key": "value"` 字段，值单独放进 `{"test": "<value>"}` 无法解析时才转义；
//! 3. 最多重扫 3 遍，某遍无变化即停止。
//!
//! 纯函数，永不失败；无可修复之处时原样返回（去掉首尾空白）。

use std::sync::OnceLock;

use regex::Regex;

/// 重扫上限
const MAX_PASSES: usize = 3;

static FIELD_OPEN_RE: OnceLock<Regex> = OnceLock::new();
static FENCE_OPEN_RE: OnceLock<Regex> = OnceLock::new();
static FENCE_CLOSE_RE: OnceLock<Regex> = OnceLock::new();

fn field_open_re() -> &'static Regex {
    FIELD_OPEN_RE.get_or_init(|| Regex::new(r#""[\w\-]+"\s*:\s*""#).expect("static regex"))
}

fn fence_open_re() -> &'static Regex {
    FENCE_OPEN_RE.get_or_init(|| {
        Regex::new(r"(?i)\A```[a-z0-9_+\-]*[ \t]*\r?\n?").expect("static regex")
    })
}

fn fence_close_re() -> &'static Regex {
    FENCE_CLOSE_RE.get_or_init(|| Regex::new(r"\s*```\z").expect("static regex"))
}

/// 修复模型输出，返回尽力修正后的文本
pub fn repair(text: &str) -> String {
    let mut content = strip_code_fence(text);

    for pass in 1..=MAX_PASSES {
        let next = repair_pass(&content);
        if next == content {
            break;
        }
        tracing::debug!(pass, "response repair pass changed content");
        content = next;
    }
    content
}

/// 反复去除首尾围栏直到没有为止
fn strip_code_fence(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let opened = fence_open_re().replace(&current, "");
        let closed = fence_close_re().replace(&opened, "");
        let next = closed.trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// 单遍扫描：只改写非法的字符串值，已合法的字段原样保留
fn repair_pass(content: &str) -> String {
    let re = field_open_re();
    let mut out = String::with_capacity(content.len() + 16);
    let mut cursor = 0;

    while let Some(m) = re.find_at(content, cursor) {
        let value_start = m.end();
        let Some(value_end) = find_value_end(content, value_start) else {
            // 找不到可信的结束引号：跳过这个字段头继续扫描
            out.push_str(&content[cursor..value_start]);
            cursor = value_start;
            continue;
        };

        out.push_str(&content[cursor..value_start]);
        let value = &content[value_start..value_end];
        if is_legal_json_string(value) {
            out.push_str(value);
        } else {
            let fixed = escape_value(value);
            tracing::debug!(
                before = %preview(value),
                after = %preview(&fixed),
                "repaired string value"
            );
            out.push_str(&fixed);
        }
        out.push('"');
        cursor = value_end + 1;
    }
    out.push_str(&content[cursor..]);
    out
}

/// 字段值的结束引号：第一个未被转义、且其后（跳过空白）为 `}`、`,"`、`,}` 或文本结尾的引号
fn find_value_end(content: &str, start: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' if is_structural_terminator(&content[i + 1..]) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_structural_terminator(rest: &str) -> bool {
    let rest = rest.trim_start();
    match rest.as_bytes().first() {
        None | Some(b'}') => true,
        Some(b',') => matches!(rest[1..].trim_start().as_bytes().first(), Some(b'"') | Some(b'}')),
        _ => false,
    }
}

/// 用合成的单字段对象检验值本身是否是合法 JSON 字符串内容
fn is_legal_json_string(value: &str) -> bool {
    let probe = format!("{{\"test\": \"{}\"}}", value);
    serde_json::from_str::<serde_json::Value>(&probe).is_ok()
}

/// 转义优先级：裸双引号 → 控制字符 → 不属于合法转义序列的反斜杠
fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if let Some(len) = recognized_escape_len(&chars[i..]) {
                    out.extend(&chars[i..i + len]);
                    i += len;
                    continue;
                }
                out.push_str("\\\\");
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// `\"` `\\` `\/` `\b` `\f` `\n` `\r` `\t` 为 2 个字符，`\uXXXX` 为 6 个字符
fn recognized_escape_len(chars: &[char]) -> Option<usize> {
    match chars.get(1)? {
        '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' => Some(2),
        'u' if chars.len() >= 6 && chars[2..6].iter().all(|c| c.is_ascii_hexdigit()) => Some(6),
        _ => None,
    }
}

fn preview(s: &str) -> String {
    let head: String = s.chars().take(30).collect();
    if s.chars().count() > 30 {
        format!("{}...", head)
    } else {
        head
    }
}
