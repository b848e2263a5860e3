//! Cell value normalization

use serde_json::Value;
use std::collections::HashSet;

use super::literal::parse_literal;
use crate::config::default_null_tokens;

/// Turns raw cell text into JSON values.
///
/// Text is trimmed. Null tokens (matched case-insensitively) become `null`.
/// Text wrapped in `[...]` or `{...}` is parsed as JSON, then as a Python
/// literal, and kept as a list or object when either succeeds. Everything
/// else stays a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNormalizer {
    null_tokens: HashSet<String>,
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self::new(default_null_tokens())
    }
}

impl ValueNormalizer {
    /// Create a normalizer with a custom null-token set
    pub fn new<I, S>(null_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            null_tokens: null_tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether trimmed text counts as NULL
    pub fn is_null_token(&self, text: &str) -> bool {
        self.null_tokens.contains(&text.trim().to_lowercase())
    }

    /// Normalize a raw cell; an absent cell is `null`
    pub fn normalize(&self, raw: Option<&str>) -> Value {
        match raw {
            None => Value::Null,
            Some(text) => self.normalize_text(text),
        }
    }

    /// Normalize an already-typed value. Only strings are affected, so
    /// applying this to a normalized value returns it unchanged.
    pub fn normalize_value(&self, value: Value) -> Value {
        match value {
            Value::String(text) => self.normalize_text(&text),
            other => other,
        }
    }

    fn normalize_text(&self, text: &str) -> Value {
        let trimmed = text.trim();
        if self.is_null_token(trimmed) {
            return Value::Null;
        }
        parse_composite(trimmed).unwrap_or_else(|| Value::String(trimmed.to_string()))
    }
}

/// Parse bracketed text into a list or object, `None` when it is not one
fn parse_composite(text: &str) -> Option<Value> {
    let bracketed = (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('{') && text.ends_with('}'));
    if !bracketed {
        return None;
    }

    serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| parse_literal(text).ok())
        .filter(|v| v.is_array() || v.is_object())
}
