//! Response cleaner.
//!
//! Generative models wrap JSON in conversational prose or markdown fences.
//! [`clean_response`] recovers the JSON-looking span with a few cheap
//! heuristics. It is not a parser: it never fails, and text it cannot repair
//! is handed to the parser unchanged so the parse error can be reported.

/// Strip fences and surrounding prose from a raw model reply.
///
/// 1. Trim whitespace.
/// 2. If the whole text is one fenced block (optionally tagged, e.g.
///    `json`), keep only the interior.
/// 3. If the text does not start with `{` or `[`, slice from the first
///    opener to the last matching closer.
///
/// Already-clean JSON is returned unchanged.
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = strip_fence(trimmed).unwrap_or(trimmed);
    extract_json_span(unfenced).to_string()
}

/// Interior of a text that is entirely one fenced block.
fn strip_fence(text: &str) -> Option<&str> {
    const FENCE: &str = "```";
    if text.len() < FENCE.len() * 2 || !text.starts_with(FENCE) || !text.ends_with(FENCE) {
        return None;
    }
    let inner = &text[FENCE.len()..text.len() - FENCE.len()];

    // Drop a language tag on the opening line (```json, ```JSON, ```json5).
    let inner = match inner.find('\n') {
        Some(newline) => {
            let tag = inner[..newline].trim();
            if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                &inner[newline + 1..]
            } else {
                inner
            }
        }
        None => inner,
    };
    Some(inner.trim())
}

/// Slice `text` down to its first `{`/`[` and the last matching closer.
fn extract_json_span(text: &str) -> &str {
    if text.starts_with('{') || text.starts_with('[') {
        return text;
    }
    let Some(start) = text.find(['{', '[']) else {
        return text;
    };
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    match text.rfind(closer) {
        Some(end) if end > start => &text[start..=end],
        // An opener with no closer is most likely a truncated reply; keep the
        // tail so the parser can classify it.
        _ => &text[start..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_unchanged() {
        let json = r#"{"questions": []}"#;
        assert_eq!(clean_response(json), json);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "```json\n{\"a\": 1}\n```",
            "Here you go: [1, 2, 3] Enjoy!",
            "no json at all",
            "  {\"a\": {\"b\": [1]}}  ",
            "prefix {\"open\": ",
        ];
        for input in inputs {
            let once = clean_response(input);
            assert_eq!(clean_response(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_strips_whitespace() {
        assert_eq!(clean_response("\n\t {\"a\": 1} \n"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_strips_tagged_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_response(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_strips_uppercase_and_json5_tags() {
        assert_eq!(clean_response("```JSON\n[1]\n```"), "[1]");
        assert_eq!(clean_response("```json5\n{a: 1}\n```"), "{a: 1}");
    }

    #[test]
    fn test_strips_untagged_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(clean_response(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extracts_object_from_prose() {
        let raw = "Sure! Here is the quiz:\n{\"questions\": [{\"id\": 1}]}\nLet me know if you need more.";
        assert_eq!(clean_response(raw), r#"{"questions": [{"id": 1}]}"#);
    }

    #[test]
    fn test_extracts_array_from_prose() {
        let raw = "Result: [{\"id\": 1}, {\"id\": 2}] done";
        assert_eq!(clean_response(raw), r#"[{"id": 1}, {"id": 2}]"#);
    }

    #[test]
    fn test_fence_inside_prose() {
        let raw = "Here it is:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(clean_response(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn test_no_json_returns_trimmed_text() {
        assert_eq!(clean_response("  I cannot help with that.  "), "I cannot help with that.");
    }

    #[test]
    fn test_unclosed_object_keeps_tail() {
        let raw = "Output: {\"questions\": [{\"id\": 1";
        assert_eq!(clean_response(raw), "{\"questions\": [{\"id\": 1");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_response(""), "");
        assert_eq!(clean_response("``````"), "");
    }

    #[test]
    fn test_multibyte_prose_does_not_panic() {
        let raw = "Voilà — le résultat : {\"titre\": \"été\"} ✓";
        assert_eq!(clean_response(raw), "{\"titre\": \"été\"}");
    }

    #[test]
    fn test_embedded_json_recovered_from_varied_prose() {
        let json = r#"{"questions": [{"id": "q1", "options": ["a", "b"]}]}"#;
        for (prefix, suffix) in [
            ("", ""),
            ("Answer:", ""),
            ("", " -- end"),
            ("Model output follows\n\n", "\n\nHope this helps."),
        ] {
            let raw = format!("{}{}{}", prefix, json, suffix);
            assert_eq!(clean_response(&raw), json);
        }
    }
}
