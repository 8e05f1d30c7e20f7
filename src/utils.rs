use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseJsonError {
    #[error("No JSON found in response: {0}")]
    NoJsonFound(String),
    #[error("Failed to parse JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(\w*)[ \t]*\r?\n([\s\S]*?)\r?\n[ \t]*```").expect("static regex")
    })
}

/// Returns the body of the last fenced code block tagged `language`, or of the
/// first untagged block when `language` is `None`.
pub fn parse_markdown_code_block(content: &str, language: Option<&str>) -> Option<String> {
    let mut last_match = None;
    for cap in code_block_regex().captures_iter(content) {
        let block_language = cap.get(1).map_or("", |m| m.as_str());
        let body = cap.get(2).map_or("", |m| m.as_str()).trim();
        match language {
            None => return Some(body.to_string()),
            Some(language) if block_language.eq_ignore_ascii_case(language) => {
                last_match = Some(body.to_string());
            }
            Some(_) => {}
        }
    }
    last_match
}

/// Parses a model answer that should be JSON. Accepts a bare document or one
/// wrapped in a ```json fence.
pub fn parse_json_response<T: DeserializeOwned>(completion: &str) -> Result<T, ParseJsonError> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    let block = parse_markdown_code_block(trimmed, Some("json"))
        .or_else(|| parse_markdown_code_block(trimmed, None));
    match block {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Err(ParseJsonError::NoJsonFound(display_content_preview(trimmed, 40))),
    }
}

/// Truncates to at most `max_bytes` bytes without splitting a character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn display_content_preview(content: &str, words: usize) -> String {
    let preview = content
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}...", preview)
}
