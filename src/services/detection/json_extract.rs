// JSON Extraction
// Oracles are asked for JSON but reply in free-form text: prose preambles,
// markdown fences, trailing commentary. This module pulls the first balanced
// `{...}` or `[...]` span out of a completion and parses it, reporting every
// failure as a typed value rather than an exception.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("no parsable JSON in oracle output: {reason}")]
pub struct ParseFailure {
    reason: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Find the first balanced JSON object or array embedded in free-form text.
/// Honors string literals and escape sequences, so braces inside reasoning
/// strings do not end the span early.
pub fn extract_json(content: &str) -> Result<&str, ParseFailure> {
    let start = content
        .find(['{', '['])
        .ok_or_else(|| ParseFailure::new("no opening brace or bracket"))?;

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(ParseFailure::new("unbalanced brackets"))
}

/// Extract the first JSON span and deserialize it into `T`.
pub fn parse_payload<T: DeserializeOwned>(content: &str) -> Result<T, ParseFailure> {
    let span = extract_json(content)?;
    serde_json::from_str(span).map_err(|e| ParseFailure::new(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Scores {
        a: f64,
        b: f64,
    }

    #[test]
    fn test_extract_plain_object() {
        let span = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(span, r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_embedded_in_prose() {
        let content = "Sure! Here is the result:\n```json\n{\"a\": 1, \"b\": 2}\n```\nHope that helps.";
        let span = extract_json(content).unwrap();
        assert_eq!(span, r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn test_extract_array() {
        let content = "verdicts follow [\n {\"x\": 1}, {\"x\": 2}\n] done";
        let span = extract_json(content).unwrap();
        assert!(span.starts_with('['));
        assert!(span.ends_with(']'));
    }

    #[test]
    fn test_extract_braces_inside_strings() {
        let content = r#"note {"reasoning": "uses {curly} and \"quoted\" text", "n": 1} trailing"#;
        let span = extract_json(content).unwrap();
        let value: serde_json::Value = serde_json::from_str(span).unwrap();
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_extract_takes_first_span_only() {
        let content = r#"{"first": 1} {"second": 2}"#;
        assert_eq!(extract_json(content).unwrap(), r#"{"first": 1}"#);
    }

    #[test]
    fn test_extract_no_json() {
        assert!(extract_json("nothing to see here").is_err());
    }

    #[test]
    fn test_extract_unbalanced() {
        assert!(extract_json(r#"{"a": [1, 2"#).is_err());
    }

    #[test]
    fn test_parse_payload_typed() {
        let scores: Scores = parse_payload("result: {\"a\": 0.5, \"b\": 0.25}").unwrap();
        assert!((scores.a - 0.5).abs() < f64::EPSILON);
        assert!((scores.b - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_payload_wrong_shape_fails() {
        assert!(parse_payload::<Scores>(r#"{"a": "not a number"}"#).is_err());
    }
}
