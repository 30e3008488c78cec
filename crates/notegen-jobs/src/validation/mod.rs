//! Lenient response validation.
//!
//! A raw model reply goes through three steps:
//!
//! 1. [`clean_response`](crate::cleaner::clean_response) recovers the JSON span.
//! 2. [`parse_lenient`] parses it, accepting near-JSON (unquoted keys, single
//!    quotes, trailing commas, comments) and classifying an input that ends
//!    mid-structure as truncation.
//! 3. A [`ResponseValidator`] checks the parsed tree against the rules of
//!    one content kind, collecting every violation rather than stopping at
//!    the first.
//!
//! Each content kind has its own validator type; callers pick one at compile
//! time through [`validate_response`].

pub mod narration;
pub mod quiz;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use notegen_core::defaults;

use crate::cleaner::clean_response;

pub use narration::{NarrationValidator, ValidatedScript};
pub use quiz::{QuizValidator, ValidatedQuiz};

/// Message stored on a job whose reply was cut off.
pub const TRUNCATED_MESSAGE: &str = "Response was cut off before it was complete (too long). \
     Try again with fewer questions or a shorter narration size.";

// =============================================================================
// FAILURE TYPES
// =============================================================================

/// How a reply failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed JSON or a broken content rule.
    Invalid,
    /// The reply ended in the middle of a JSON structure.
    Truncated,
}

/// A reply that could not be turned into a typed result.
///
/// Carries every violation found and the raw reply for diagnostics. The raw
/// reply is never part of the user-facing message.
#[derive(Debug, Clone, Error)]
#[error("{}", self.message())]
pub struct ValidationFailure {
    pub kind: FailureKind,
    pub errors: Vec<String>,
    pub raw_response: String,
}

impl ValidationFailure {
    pub fn invalid(errors: Vec<String>, raw_response: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Invalid,
            errors,
            raw_response: raw_response.into(),
        }
    }

    pub fn truncated(detail: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Truncated,
            errors: vec![detail.into()],
            raw_response: raw_response.into(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.kind == FailureKind::Truncated
    }

    /// User-facing summary stored as the job's error message.
    pub fn message(&self) -> String {
        match self.kind {
            FailureKind::Truncated => TRUNCATED_MESSAGE.to_string(),
            FailureKind::Invalid => format!("Validation failed: {}", self.errors.join("; ")),
        }
    }
}

// =============================================================================
// LENIENT PARSING
// =============================================================================

/// Why a cleaned reply could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Input ended inside an object, array, string, or comment.
    Truncated(String),
    /// Input is not JSON or near-JSON.
    Malformed(String),
}

/// Parse strict JSON, falling back to JSON5 for near-JSON.
pub fn parse_lenient(text: &str) -> Result<Value, ParseFailure> {
    if text.trim().is_empty() {
        return Err(ParseFailure::Malformed("Response was empty".to_string()));
    }

    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    if strict_err.classify() == serde_json::error::Category::Eof {
        return Err(ParseFailure::Truncated(format!(
            "Response ended unexpectedly: {}",
            strict_err
        )));
    }

    match json5::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(e) => {
            if ends_inside_structure(text) {
                Err(ParseFailure::Truncated(format!(
                    "Response ended unexpectedly: {}",
                    e
                )))
            } else {
                Err(ParseFailure::Malformed(format!("Malformed JSON: {}", e)))
            }
        }
    }
}

/// Whether `text` stops before closing every object, array, string, or
/// block comment it opened. Tracks JSON5 quoting and comment syntax.
fn ends_inside_structure(text: &str) -> bool {
    if !text.trim_start().starts_with(['{', '[']) {
        return false;
    }
    let mut depth: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth.push('}'),
            '[' => depth.push(']'),
            '}' | ']' => {
                if depth.last() == Some(&c) {
                    depth.pop();
                }
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut closed = false;
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            closed = true;
                            break;
                        }
                        prev = next;
                    }
                    if !closed {
                        return true;
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    quote.is_some() || !depth.is_empty()
}

// =============================================================================
// VALIDATOR CAPABILITY
// =============================================================================

/// Content-kind rules applied to a parsed reply.
pub trait ResponseValidator {
    /// Typed result of a reply that passes every rule.
    type Output;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check `root`, returning the typed result or every violation found.
    fn check(&self, root: &Value) -> Result<Self::Output, Vec<String>>;
}

/// Clean, parse, and check a raw reply.
pub fn validate_response<V: ResponseValidator>(
    validator: &V,
    raw: &str,
) -> Result<V::Output, ValidationFailure> {
    let cleaned = clean_response(raw);
    debug!(
        subsystem = "jobs",
        component = "validator",
        validator = validator.name(),
        response_len = raw.len(),
        cleaned_len = cleaned.len(),
        "Validating model response"
    );

    let root = match parse_lenient(&cleaned) {
        Ok(root) => root,
        Err(ParseFailure::Truncated(detail)) => {
            warn!(
                subsystem = "jobs",
                component = "validator",
                validator = validator.name(),
                detail = %detail,
                tail = %tail(raw, defaults::RAW_RESPONSE_LOG_CHARS),
                "Model response was truncated"
            );
            return Err(ValidationFailure::truncated(detail, raw));
        }
        Err(ParseFailure::Malformed(detail)) => {
            warn!(
                subsystem = "jobs",
                component = "validator",
                validator = validator.name(),
                detail = %detail,
                head = %head(raw, defaults::RAW_RESPONSE_LOG_CHARS),
                "Model response is not JSON"
            );
            return Err(ValidationFailure::invalid(vec![detail], raw));
        }
    };

    validator.check(&root).map_err(|errors| {
        warn!(
            subsystem = "jobs",
            component = "validator",
            validator = validator.name(),
            error_count = errors.len(),
            "Model response failed validation"
        );
        ValidationFailure::invalid(errors, raw)
    })
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

// =============================================================================
// FIELD HELPERS
// =============================================================================

/// Reads required and optional fields of one JSON object, recording
/// violations with a location prefix such as `"Question 3: "`.
pub(crate) struct FieldReader<'a> {
    node: &'a Value,
    prefix: String,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(node: &'a Value, prefix: impl Into<String>) -> Self {
        Self {
            node,
            prefix: prefix.into(),
        }
    }

    /// Field value, treating `null` as missing.
    pub(crate) fn get(&self, field: &str) -> Option<&'a Value> {
        self.node.get(field).filter(|v| !v.is_null())
    }

    pub(crate) fn missing(&self, field: &str, errors: &mut Vec<String>) {
        errors.push(format!("{}missing field '{}'", self.prefix, field));
    }

    pub(crate) fn error(&self, message: impl AsRef<str>, errors: &mut Vec<String>) {
        errors.push(format!("{}{}", self.prefix, message.as_ref()));
    }

    /// Required non-empty text, returned trimmed.
    pub(crate) fn text(&self, field: &str, errors: &mut Vec<String>) -> Option<&'a str> {
        let Some(value) = self.get(field) else {
            self.missing(field, errors);
            return None;
        };
        let Some(text) = value.as_str() else {
            self.error(format!("field '{}' must be text", field), errors);
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            self.error(format!("field '{}' must not be empty", field), errors);
            return None;
        }
        Some(text)
    }

    /// Optional text; absent, blank, or non-text values read as `None`.
    pub(crate) fn optional_text(&self, field: &str) -> Option<&'a str> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Required non-empty array.
    pub(crate) fn array(&self, field: &str, errors: &mut Vec<String>) -> Option<&'a Vec<Value>> {
        let Some(value) = self.get(field) else {
            self.missing(field, errors);
            return None;
        };
        let Some(items) = value.as_array() else {
            self.error(format!("field '{}' must be an array", field), errors);
            return None;
        };
        if items.is_empty() {
            self.error(format!("field '{}' must not be empty", field), errors);
            return None;
        }
        Some(items)
    }

    /// Required integer. Integral floats (`12.0`) are accepted.
    pub(crate) fn integer(&self, field: &str, errors: &mut Vec<String>) -> Option<i64> {
        let Some(value) = self.get(field) else {
            self.missing(field, errors);
            return None;
        };
        match as_integer(value) {
            Some(n) => Some(n),
            None => {
                self.error(format!("field '{}' must be an integer", field), errors);
                None
            }
        }
    }

    /// Proposed tag names. Tags are optional and never a validation error;
    /// non-text entries are ignored.
    pub(crate) fn tag_names(&self, field: &str) -> Vec<String> {
        self.get(field)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct KeysValidator;

    impl ResponseValidator for KeysValidator {
        type Output = String;

        fn name(&self) -> &'static str {
            "keys"
        }

        fn check(&self, root: &Value) -> Result<String, Vec<String>> {
            let mut errors = Vec::new();
            let reader = FieldReader::new(root, "");
            let name = reader.text("name", &mut errors);
            reader.integer("count", &mut errors);
            match name {
                Some(name) if errors.is_empty() => Ok(name.to_string()),
                _ => Err(errors),
            }
        }
    }

    #[test]
    fn test_parse_strict_json() {
        assert_eq!(parse_lenient(r#"{"a": [1, 2]}"#).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_parse_near_json() {
        let text = "{\n  // generated\n  name: 'quiz',\n  items: [1, 2,],\n}";
        let value = parse_lenient(text).unwrap();
        assert_eq!(value["name"], "quiz");
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_truncated_strict_json() {
        let text = r#"{"questions": [{"id":1,"type":"FLASHCARD""#;
        assert!(matches!(parse_lenient(text), Err(ParseFailure::Truncated(_))));
    }

    #[test]
    fn test_parse_truncated_near_json() {
        for text in [
            "{questions: [{id: 1, type: 'FLASH",
            "{a: 1, b: [1, 2",
            "{a: 1 /* unfinished comment",
        ] {
            assert!(
                matches!(parse_lenient(text), Err(ParseFailure::Truncated(_))),
                "expected truncation for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_parse_malformed() {
        for text in ["I can't help with that.", r#"{"a" 1}"#, "{a: }"] {
            assert!(
                matches!(parse_lenient(text), Err(ParseFailure::Malformed(_))),
                "expected malformed for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_parse_empty_is_malformed() {
        assert!(matches!(parse_lenient("   "), Err(ParseFailure::Malformed(_))));
    }

    #[test]
    fn test_brackets_inside_strings_do_not_count() {
        assert!(!ends_inside_structure(r#"{"a": "[{"}"#));
        assert!(!ends_inside_structure("{a: 'it\\'s [ok'}"));
        assert!(ends_inside_structure(r#"{"a": "unterminated"#));
    }

    #[test]
    fn test_line_comment_brackets_ignored() {
        assert!(!ends_inside_structure("{a: 1 // trailing {\n}"));
    }

    #[test]
    fn test_validate_response_success() {
        let raw = "```json\n{\"name\": \"x\", \"count\": 3}\n```";
        assert_eq!(validate_response(&KeysValidator, raw).unwrap(), "x");
    }

    #[test]
    fn test_validate_response_collects_all_errors() {
        let failure = validate_response(&KeysValidator, r#"{"name": 5, "count": "many"}"#)
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Invalid);
        assert_eq!(
            failure.errors,
            vec![
                "field 'name' must be text".to_string(),
                "field 'count' must be an integer".to_string(),
            ]
        );
        assert_eq!(
            failure.message(),
            "Validation failed: field 'name' must be text; field 'count' must be an integer"
        );
    }

    #[test]
    fn test_validate_response_truncation() {
        let raw = r#"Here you go: {"name": "x", "count": "#;
        let failure = validate_response(&KeysValidator, raw).unwrap_err();
        assert!(failure.is_truncated());
        assert_eq!(failure.message(), TRUNCATED_MESSAGE);
        assert_eq!(failure.raw_response, raw);
    }

    #[test]
    fn test_validate_response_malformed_is_not_truncation() {
        let failure = validate_response(&KeysValidator, "no json here").unwrap_err();
        assert_eq!(failure.kind, FailureKind::Invalid);
        assert!(failure.errors[0].starts_with("Malformed JSON"));
    }

    #[test]
    fn test_field_reader_missing_and_empty() {
        let node = json!({"blank": "  ", "list": [], "nothing": null});
        let reader = FieldReader::new(&node, "Item 1: ");
        let mut errors = Vec::new();
        assert!(reader.text("absent", &mut errors).is_none());
        assert!(reader.text("blank", &mut errors).is_none());
        assert!(reader.array("list", &mut errors).is_none());
        assert!(reader.text("nothing", &mut errors).is_none());
        assert_eq!(
            errors,
            vec![
                "Item 1: missing field 'absent'",
                "Item 1: field 'blank' must not be empty",
                "Item 1: field 'list' must not be empty",
                "Item 1: missing field 'nothing'",
            ]
        );
    }

    #[test]
    fn test_integer_accepts_integral_float() {
        assert_eq!(as_integer(&json!(12)), Some(12));
        assert_eq!(as_integer(&json!(12.0)), Some(12));
        assert_eq!(as_integer(&json!(12.5)), None);
        assert_eq!(as_integer(&json!("12")), None);
    }

    #[test]
    fn test_tag_names_ignores_non_text() {
        let node = json!({"tags": ["Biology", 3, "", " Cells "]});
        let reader = FieldReader::new(&node, "");
        assert_eq!(reader.tag_names("tags"), vec!["Biology", "Cells"]);
        assert!(reader.tag_names("missing").is_empty());
    }
}
