use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:rhai|rust|js|javascript)?[ \t]*\r?\n(.*?)```").expect("valid regex literal")
});

/// Pull the script out of a model reply: the first fenced block, or the
/// whole reply when there is none
pub fn extract_code(reply: &str) -> String {
    FENCE_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim()
        .to_string()
}
