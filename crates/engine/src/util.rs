//! Small shared helpers for model-output parsing and token estimation.

use serde::de::DeserializeOwned;

use av_domain::error::{Error, Result};

/// Approximate chars-per-token multiplier for budget math.
pub(crate) const CHARS_PER_TOKEN: usize = 4;

pub(crate) fn approx_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Extract the first JSON document from model output that may wrap it in
/// code fences or surrounding prose. Returns the JSON slice, not a
/// parsed value.
pub(crate) fn extract_json(text: &str) -> Option<&str> {
    let text = text.trim();

    // Fenced block.
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    // Outermost object or array, whichever opens first.
    let obj = text
        .find('{')
        .and_then(|s| text.rfind('}').filter(|e| *e > s).map(|e| (s, e)));
    let arr = text
        .find('[')
        .and_then(|s| text.rfind(']').filter(|e| *e > s).map(|e| (s, e)));

    let span = match (obj, arr) {
        (Some(o), Some(a)) => {
            if o.0 < a.0 {
                Some(o)
            } else {
                Some(a)
            }
        }
        (Some(o), None) => Some(o),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    };
    span.map(|(s, e)| &text[s..=e])
}

/// Parse model output into `T`, tolerating code fences and prose around
/// the JSON. Failures surface as [`Error::Schema`].
pub(crate) fn parse_lenient<T: DeserializeOwned>(text: &str) -> Result<T> {
    match serde_json::from_str::<T>(text.trim()) {
        Ok(value) => Ok(value),
        Err(direct_err) => {
            if let Some(json) = extract_json(text) {
                if let Ok(value) = serde_json::from_str::<T>(json) {
                    return Ok(value);
                }
            }
            Err(Error::Schema(direct_err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn parses_bare_json() {
        let doc: Doc = parse_lenient(r#"{"value": 7}"#).unwrap();
        assert_eq!(doc, Doc { value: 7 });
    }

    #[test]
    fn parses_fenced_json() {
        let doc: Doc = parse_lenient("```json\n{\"value\": 7}\n```").unwrap();
        assert_eq!(doc.value, 7);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let doc: Doc = parse_lenient("Sure! Here you go: {\"value\": 7} Hope that helps.").unwrap();
        assert_eq!(doc.value, 7);
    }

    #[test]
    fn picks_array_when_it_opens_first() {
        let json = extract_json("the list: [1, 2, 3] and an object {\"a\": 1}").unwrap();
        assert_eq!(json, "[1, 2, 3]");
    }

    #[test]
    fn garbage_is_a_schema_error() {
        let result: Result<Doc> = parse_lenient("I couldn't produce JSON, sorry.");
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn truncated_json_is_a_schema_error() {
        let result: Result<Doc> = parse_lenient("{\"value\": ");
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn approx_tokens_rounds_up() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("abcd"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
    }
}
