//! Cleanup of free-form oracle responses

use regex::Regex;
use std::sync::OnceLock;

/// Largest number of suggestions kept from one response
pub const MAX_SUGGESTIONS: usize = 10;

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
    })
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*+•·]\s*|\(?\d{1,2}[.):]\s*)+").expect("list marker pattern is valid")
    })
}

/// Remove markdown code fences around synthesized code.
///
/// When the response holds a fenced block, its body is returned and any
/// surrounding prose is dropped. A dangling opening or closing fence is
/// stripped on its own.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(body) = fenced_block().captures(trimmed).and_then(|c| c.get(1)) {
        return body.as_str().trim().to_string();
    }
    let mut code = trimmed;
    if let Some(rest) = code.strip_prefix("```") {
        // drop the language tag on the fence line
        code = rest
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '-');
    }
    if let Some(rest) = code.trim_end().strip_suffix("```") {
        code = rest;
    }
    code.trim().to_string()
}

/// Split a suggestion response into clean suggestion strings.
///
/// Bullets, numbering and bold markers are removed; headings, blank lines and
/// lines ending in `:` (list introductions) are skipped. At most
/// [`MAX_SUGGESTIONS`] are kept.
#[must_use]
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .map(|line| list_marker().replace(line, "").replace("**", "").trim().to_string())
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .take(MAX_SUGGESTIONS)
        .collect()
}
