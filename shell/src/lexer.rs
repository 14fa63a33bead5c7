//! Lexical analysis: splitting a command line into word tokens.
//!
//! A token is one of:
//! - a run of characters that are neither whitespace nor quotes,
//! - a double-quoted span `"..."` (no escape processing inside),
//! - a single-quoted span `'...'`,
//! - a quote with no closing partner, together with the plain characters
//!   following it.
//!
//! Quoted spans are emitted without their delimiters. An unmatched quote is
//! kept as a literal character. Tokenizing never fails.

use regex::Regex;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\s"']+|"([^"]*)"|'([^']*)'|["'][^\s"']*"#).expect("token pattern is valid")
});

/// Split `line` into tokens, preserving their order.
pub fn tokenize(line: &str) -> Vec<String> {
    TOKEN
        .captures_iter(line)
        .map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .collect()
}
