use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON object scraped from a model reply.
pub type ParsedRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no balanced object found")]
    NoBalancedObject,
    #[error("malformed JSON: {detail}")]
    Malformed { detail: String },
}

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"```[A-Za-z0-9_+-]*").unwrap();
}

/// Strips code fences, isolates the first balanced `{...}` run and parses it.
///
/// Never panics: every failure comes back as a [`NormalizeError`], which callers
/// replace with their own fallback record. An empty object `{}` is a success.
pub fn extract_json(text: &str) -> Result<ParsedRecord, NormalizeError> {
    let unfenced = FENCE_RE.replace_all(text, "");
    let candidate =
        first_balanced_object(unfenced.trim()).ok_or(NormalizeError::NoBalancedObject)?;
    serde_json::from_str::<ParsedRecord>(candidate).map_err(|e| NormalizeError::Malformed {
        detail: e.to_string(),
    })
}

/// Scans left to right and returns the first top-level object whose braces
/// balance. Braces inside string literals do not count.
fn first_balanced_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        let Some(begin) = start else {
            if ch == '{' {
                start = Some(i);
                depth = 1;
            }
            continue;
        };

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
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[begin..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod normalize_tests {
    use super::*;
    use serde_json::json;

    fn as_value(record: ParsedRecord) -> Value {
        Value::Object(record)
    }

    #[test]
    fn parses_plain_object() {
        let parsed = extract_json(r#"{"a": 1, "b": [1, 2]}"#).unwrap();
        assert_eq!(as_value(parsed), json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn strips_fences_and_surrounding_prose() {
        let original = json!({
            "items": [{"name": "Idli", "calories": 120}],
            "need_clarification": false
        });
        let text = format!(
            "Sure! Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&original).unwrap()
        );
        let parsed = extract_json(&text).unwrap();
        assert_eq!(as_value(parsed), original);
    }

    #[test]
    fn bare_fences_are_removed() {
        let parsed = extract_json("```\n{\"ok\": true}\n```").unwrap();
        assert_eq!(as_value(parsed), json!({"ok": true}));
    }

    #[test]
    fn returns_first_of_two_objects() {
        let parsed = extract_json(r#"{"first": 1} and then {"second": 2}"#).unwrap();
        assert_eq!(as_value(parsed), json!({"first": 1}));
    }

    #[test]
    fn nested_objects_stay_whole() {
        let parsed = extract_json(r#"noise {"a": {"b": {"c": 3}}, "d": 4} tail }"#).unwrap();
        assert_eq!(as_value(parsed), json!({"a": {"b": {"c": 3}}, "d": 4}));
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let original = json!({"note": "use {curly} braces }", "quote": "say \"hi\" {"});
        let text = format!("prefix {} suffix", original);
        let parsed = extract_json(&text).unwrap();
        assert_eq!(as_value(parsed), original);
    }

    #[test]
    fn unterminated_object_is_a_failure() {
        assert_eq!(
            extract_json("{ \"a\": 1").unwrap_err(),
            NormalizeError::NoBalancedObject
        );
    }

    #[test]
    fn text_without_braces_is_a_failure() {
        assert_eq!(
            extract_json("I could not see any food in this picture.").unwrap_err(),
            NormalizeError::NoBalancedObject
        );
        assert_eq!(extract_json("").unwrap_err(), NormalizeError::NoBalancedObject);
    }

    #[test]
    fn stray_closing_brace_before_object_is_ignored() {
        let parsed = extract_json(r#"} oops {"x": 1}"#).unwrap();
        assert_eq!(as_value(parsed), json!({"x": 1}));
    }

    #[test]
    fn malformed_json_reports_parser_detail() {
        match extract_json("{calories: 100}").unwrap_err() {
            NormalizeError::Malformed { detail } => assert!(!detail.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_object_is_a_success() {
        let parsed = extract_json("```json {} ```").unwrap();
        assert!(parsed.is_empty());
    }
}
