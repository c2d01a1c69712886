//! Turn a raw completion back into a JSON value.
//!
//! The prompt ends with an opening fence and `{`, so the model's continuation
//! is the *rest* of a JSON object, usually followed by a closing fence and
//! sometimes by chatter. Reconstruction: keep everything before the first
//! fence, and put the opening brace back unless the model repeated it.

use crate::prompts::{CODE_FENCE, JSON_OPENER};
use serde_json::Value;
use tracing::debug;

/// Rebuild the JSON text from a completion that continues the prompt.
pub fn reconstruct_json(completion: &str) -> String {
    let body = completion
        .split(CODE_FENCE)
        .next()
        .unwrap_or_default()
        .trim();
    if body.starts_with(JSON_OPENER) {
        body.to_string()
    } else {
        format!("{JSON_OPENER}{body}")
    }
}

/// Parse a completion into JSON, or `None` when it is not valid JSON.
pub fn parse_response(completion: &str) -> Option<Value> {
    let json = reconstruct_json(completion);
    match serde_json::from_str::<Value>(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Completion is not valid JSON: {}", e);
            None
        }
    }
}

/// Remove an echoed `prompt` from the front of `response`.
pub fn strip_echo<'a>(response: &'a str, prompt: &str) -> &'a str {
    response.strip_prefix(prompt).unwrap_or(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn continuation_gets_opening_brace() {
        let v = parse_response("\"organization\": \"Acme\", \"affected\": 12}\n```").unwrap();
        assert_eq!(v, json!({"organization": "Acme", "affected": 12}));
    }

    #[test]
    fn repeated_brace_is_not_doubled() {
        assert_eq!(reconstruct_json("  {\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn text_after_fence_is_ignored() {
        let v = parse_response("\"a\": [1, 2]}\n```\nHere is another example:\n```{").unwrap();
        assert_eq!(v, json!({"a": [1, 2]}));
    }

    #[test]
    fn truncated_completion_is_none() {
        assert!(parse_response("\"a\": \"unterminated").is_none());
    }

    #[test]
    fn empty_completion_is_none() {
        assert_eq!(reconstruct_json(""), "{");
        assert!(parse_response("").is_none());
    }

    #[test]
    fn echo_is_stripped_only_when_present() {
        assert_eq!(strip_echo("PROMPT{\"a\":1}", "PROMPT{"), "\"a\":1}");
        assert_eq!(strip_echo("\"a\":1}", "PROMPT{"), "\"a\":1}");
    }
}
