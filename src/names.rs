//! Name Normalization
//!
//! Derives type and field identifiers from model names. Model names come in
//! every casing (`snake_case`, `dash-case`, `PascalCase`, `camelCase`); Avro
//! record names and OpenAPI operation ids need a single canonical form.

use regex::Regex;
use std::sync::OnceLock;

fn pascal_words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z][a-z0-9_]*\.?").unwrap())
}

fn camel_words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+\.?|[A-Z][a-z0-9_]*\.?").unwrap())
}

/// Split a name into words according to its casing convention.
fn words(input: &str) -> Vec<&str> {
    if input.contains('_') {
        input.split('_').collect()
    } else if input.contains('-') {
        input.split('-').collect()
    } else if input.chars().next().map(char::is_uppercase).unwrap_or(false) {
        pascal_words().find_iter(input).map(|m| m.as_str()).collect()
    } else {
        camel_words().find_iter(input).map(|m| m.as_str()).collect()
    }
}

/// Upper-case the first letter, lower-case the rest
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    }
}

/// Convert a name to PascalCase.
///
/// `message_group`, `message-group` and `messageGroup` all become
/// `MessageGroup`.
pub fn pascal(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    words(input).into_iter().map(capitalize).collect()
}

/// Convert a name to camelCase (PascalCase with a lower-case first letter).
pub fn camel(input: &str) -> String {
    let pascal = pascal(input);
    let mut chars = pascal.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

/// Fold every non-alphanumeric character to `_`.
pub fn sanitize_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
