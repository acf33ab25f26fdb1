//! Output sanitization.
//!
//! Applied to every answer before it leaves the gateway:
//! 1. literal echoes of the configured prompts are removed
//! 2. lines containing a deny-listed keyword (case-insensitive) are dropped
//! 3. if the result is a JSON object, step 2 is applied to every string at
//!    every depth, and a `response` field is lifted out
//!
//! Line redaction is idempotent: clean input comes back borrowed and
//! byte-for-byte unchanged.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::types::ChatReply;

/// Remove every literal occurrence of each prompt text, then trim.
pub fn strip_prompts(text: &str, prompts: &[String]) -> String {
    let mut out = text.to_string();
    for prompt in prompts.iter().filter(|p| !p.trim().is_empty()) {
        if out.contains(prompt.as_str()) {
            out = out.replace(prompt.as_str(), "");
        }
    }
    out.trim().to_string()
}

/// Drop every line containing any keyword, preserving the order of the rest.
pub fn filter_lines<'a>(text: &'a str, keywords: &[String]) -> Cow<'a, str> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if needles.is_empty() {
        return Cow::Borrowed(text);
    }

    let is_flagged = |line: &str| {
        let lower = line.to_lowercase();
        needles.iter().any(|n| lower.contains(n.as_str()))
    };

    if !text.lines().any(is_flagged) {
        return Cow::Borrowed(text);
    }

    let kept: Vec<&str> = text.lines().filter(|line| !is_flagged(*line)).collect();
    Cow::Owned(kept.join("\n"))
}

/// Apply [`filter_lines`] to every string value at every nesting level.
pub fn filter_json_strings(value: Value, keywords: &[String]) -> Value {
    match value {
        Value::String(s) => Value::String(filter_lines(&s, keywords).into_owned()),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| filter_json_strings(item, keywords))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, filter_json_strings(v, keywords)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Shape cleaned text into the final reply.
///
/// - JSON object with `response`: that field (trimmed), reusing an embedded
///   `correlationId` when present
/// - any other JSON object: its serialized form
/// - plain text: the text itself
pub fn shape_reply(cleaned: &str, keywords: &[String]) -> ChatReply {
    let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(cleaned) else {
        return ChatReply::fresh(cleaned);
    };

    let Value::Object(mut filtered) = filter_json_strings(Value::Object(parsed), keywords) else {
        return ChatReply::fresh(cleaned);
    };

    match filtered.remove("response") {
        Some(response) => {
            let response = value_text(&response).trim().to_string();
            match filtered.get("correlationId").map(value_text) {
                Some(corr) if !corr.trim().is_empty() => ChatReply {
                    response,
                    correlation_id: corr,
                },
                _ => ChatReply::fresh(response),
            }
        }
        None => ChatReply::fresh(Value::Object(filtered).to_string()),
    }
}

/// Full pipeline: strip prompt echoes, redact lines, shape the reply.
pub fn sanitize(raw: &str, prompts: &[String], keywords: &[String]) -> ChatReply {
    let stripped = strip_prompts(raw, prompts);
    let filtered = filter_lines(&stripped, keywords);
    shape_reply(filtered.trim(), keywords)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
