//! Pulling JSON out of model replies.
//!
//! Models wrap JSON in code fences, prepend prose, or run out of tokens
//! mid-array. Extraction tries, in order: the fenced block, the first
//! balanced `[...]` / `{...}` span (closing a truncated array after its
//! last complete object), and the whole text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").unwrap());

/// Best-effort JSON value from a model reply.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    let body = FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);

    for start in opening_positions(body) {
        let value = match balanced_end(body, start) {
            Some(end) => serde_json::from_str(&body[start..=end]).ok(),
            None if body.as_bytes()[start] == b'[' => recover_truncated_array(&body[start..]),
            None => None,
        };
        if value.is_some() {
            return value;
        }
    }
    serde_json::from_str(body).ok()
}

/// Accepts `true` / `false` and their string forms.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// First `[` and first `{`, earliest first.
fn opening_positions(text: &str) -> Vec<usize> {
    let mut positions: Vec<usize> = [text.find('['), text.find('{')]
        .into_iter()
        .flatten()
        .collect();
    positions.sort_unstable();
    positions
}

/// Byte index of the bracket closing the one at `start`, skipping string contents.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes[start] {
        b'[' => (b'[', b']'),
        _ => (b'{', b'}'),
    };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Close an array cut off mid-element: keep everything up to the last `}`.
fn recover_truncated_array(text: &str) -> Option<Value> {
    let last = text.rfind('}')?;
    let candidate = format!("{}]", &text[..=last]);
    serde_json::from_str(&candidate).ok()
}
