//! Narration script rules.
//!
//! A script is read aloud verbatim, so anything a speech engine would
//! pronounce literally (speaker labels, stage directions, URLs, markdown) is
//! a violation in its own right rather than something to strip.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use notegen_core::{defaults, NarrationScript, NarrationSize};

use super::{FieldReader, ResponseValidator};

static SPEAKER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[A-Z][a-zA-Z]*:").expect("speaker label pattern"));

static STAGE_DIRECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("stage direction pattern"));

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://|www\.").expect("url pattern"));

static MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*#_`~>|]").expect("markdown pattern"));

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+) min)?\s*(?:(\d+) sec)?$").expect("duration pattern")
});

/// A narration reply that passed every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedScript {
    /// Script with `tag_ids` still empty.
    pub script: NarrationScript,
    pub tag_names: Vec<String>,
}

/// Checks a narration script against a size tier.
#[derive(Debug, Clone)]
pub struct NarrationValidator {
    size: NarrationSize,
}

impl NarrationValidator {
    pub fn new(size: NarrationSize) -> Self {
        Self { size }
    }
}

/// Whitespace-separated word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Sentences approximated by splitting on `.`, `!`, `?` and discarding
/// empty fragments.
pub fn count_sentences(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|fragment| !fragment.trim().is_empty())
        .count()
}

/// Whether `text` reads like `"<n> min <n> sec"` with either half optional.
pub fn is_valid_duration(text: &str) -> bool {
    DURATION
        .captures(text.trim())
        .map(|caps| caps.get(1).is_some() || caps.get(2).is_some())
        .unwrap_or(false)
}

impl ResponseValidator for NarrationValidator {
    type Output = ValidatedScript;

    fn name(&self) -> &'static str {
        "narration"
    }

    fn check(&self, root: &Value) -> Result<ValidatedScript, Vec<String>> {
        if !root.is_object() {
            return Err(vec![
                "Response must be a JSON object with a 'transcript' field".to_string(),
            ]);
        }
        let mut errors = Vec::new();
        let reader = FieldReader::new(root, "");

        let transcript = reader.text("transcript", &mut errors);
        let reported_words = reader.integer("wordCount", &mut errors);
        let duration = reader.text("estimatedDuration", &mut errors);

        let mut counted = (0, 0);
        if let Some(transcript) = transcript {
            counted = self.check_transcript(transcript, reported_words, &mut errors);
        }

        if let Some(duration) = duration {
            if !is_valid_duration(duration) {
                errors.push(format!(
                    "estimatedDuration '{}' must look like '<n> min <n> sec'",
                    duration
                ));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let (Some(transcript), Some(duration)) = (transcript, duration) else {
            return Err(vec!["Narration script is incomplete".to_string()]);
        };

        let (word_count, sentence_count) = counted;
        Ok(ValidatedScript {
            script: NarrationScript {
                title: reader.optional_text("title").map(str::to_string),
                transcript: transcript.to_string(),
                word_count,
                sentence_count,
                estimated_duration: duration.to_string(),
                tag_ids: Vec::new(),
            },
            tag_names: reader.tag_names("tags"),
        })
    }
}

impl NarrationValidator {
    /// Apply the transcript rules, returning the counted words and sentences.
    fn check_transcript(
        &self,
        transcript: &str,
        reported_words: Option<i64>,
        errors: &mut Vec<String>,
    ) -> (usize, usize) {
        let chars = transcript.chars().count();
        if chars < defaults::NARRATION_MIN_TRANSCRIPT_CHARS {
            errors.push(format!(
                "transcript must be at least {} characters (found {})",
                defaults::NARRATION_MIN_TRANSCRIPT_CHARS,
                chars
            ));
        }

        if let Some(m) = SPEAKER_LABEL.find(transcript) {
            errors.push(format!(
                "transcript contains speaker labels (found '{}')",
                m.as_str().trim()
            ));
        }
        if let Some(m) = STAGE_DIRECTION.find(transcript) {
            errors.push(format!(
                "transcript contains stage directions (found '{}')",
                m.as_str()
            ));
        }
        if URL.is_match(transcript) {
            errors.push("transcript contains URLs".to_string());
        }
        if let Some(m) = MARKDOWN.find(transcript) {
            errors.push(format!(
                "transcript contains markdown formatting (found '{}')",
                m.as_str()
            ));
        }

        let words = count_words(transcript);
        if let Some(reported) = reported_words {
            let tolerance = defaults::NARRATION_WORD_COUNT_TOLERANCE as u64;
            if reported.abs_diff(words as i64) > tolerance {
                errors.push(format!(
                    "wordCount {} does not match the transcript's {} words",
                    reported, words
                ));
            }
        }

        let (min_words, max_words) = self.size.word_range();
        if words < min_words {
            errors.push(format!(
                "transcript is too short for {} size ({}-{} words, found {})",
                self.size, min_words, max_words, words
            ));
        } else if words > max_words {
            errors.push(format!(
                "transcript is too long for {} size ({}-{} words, found {})",
                self.size, min_words, max_words, words
            ));
        }

        let sentences = count_sentences(transcript);
        let (min_sentences, max_sentences) = self.size.sentence_range();
        if sentences < min_sentences || sentences > max_sentences {
            errors.push(format!(
                "transcript has {} sentences, expected {}-{} for {} size",
                sentences, min_sentences, max_sentences, self.size
            ));
        }

        (words, sentences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// `sentences` sentences of ten words each.
    fn transcript(sentences: usize) -> String {
        (0..sentences)
            .map(|_| "The cell membrane controls what enters and leaves the cell.")
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn reply(transcript: &str) -> Value {
        json!({
            "title": "Cell Membranes",
            "transcript": transcript,
            "wordCount": count_words(transcript),
            "estimatedDuration": "6 min 30 sec",
            "tags": ["Biology"]
        })
    }

    #[test]
    fn test_counts() {
        assert_eq!(count_words("  one two\nthree\tfour "), 4);
        assert_eq!(count_sentences("One. Two! Three? ... Four"), 4);
        assert_eq!(count_sentences(""), 0);
        assert_eq!(count_words(&transcript(3)), 30);
    }

    #[test]
    fn test_duration_pattern() {
        for ok in ["5 min", "45 sec", "6 min 30 sec", "6 min30 sec", " 12 min "] {
            assert!(is_valid_duration(ok), "{:?}", ok);
        }
        for bad in ["", "about 5 minutes", "5min", "5 minutes", "sec", "6:30"] {
            assert!(!is_valid_duration(bad), "{:?}", bad);
        }
    }

    #[test]
    fn test_valid_medium_script() {
        let text = transcript(90);
        let result = NarrationValidator::new(NarrationSize::Medium)
            .check(&reply(&text))
            .unwrap();
        assert_eq!(result.script.word_count, 900);
        assert_eq!(result.script.sentence_count, 90);
        assert_eq!(result.script.title.as_deref(), Some("Cell Membranes"));
        assert_eq!(result.tag_names, vec!["Biology"]);
        assert!(result.script.tag_ids.is_empty());
    }

    #[test]
    fn test_extreme_word_count_is_a_validation_error() {
        let text = transcript(90);
        for reported in [i64::MIN, i64::MAX] {
            let mut value = reply(&text);
            value["wordCount"] = json!(reported);
            let errors = NarrationValidator::new(NarrationSize::Medium)
                .check(&value)
                .unwrap_err();
            assert_eq!(
                errors,
                vec![format!(
                    "wordCount {} does not match the transcript's 900 words",
                    reported
                )]
            );
        }
    }

    #[test]
    fn test_too_short_for_tier() {
        let text = transcript(60);
        let errors = NarrationValidator::new(NarrationSize::Medium)
            .check(&reply(&text))
            .unwrap_err();
        assert_eq!(
            errors,
            vec!["transcript is too short for MEDIUM size (800-1200 words, found 600)"]
        );
    }

    #[test]
    fn test_too_long_for_tier() {
        let text = transcript(80);
        let errors = NarrationValidator::new(NarrationSize::Short)
            .check(&reply(&text))
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "transcript is too long for SHORT size (400-700 words, found 800)",
                "transcript has 80 sentences, expected 15-60 for SHORT size",
            ]
        );
    }

    #[test]
    fn test_tier_uses_counted_not_reported_words() {
        let text = transcript(60);
        let mut root = reply(&text);
        root["wordCount"] = json!(1000);
        let errors = NarrationValidator::new(NarrationSize::Medium)
            .check(&root)
            .unwrap_err();
        assert!(errors.iter().any(|e| e.contains("wordCount 1000 does not match")));
        assert!(errors.iter().any(|e| e.contains("too short for MEDIUM size")));
    }

    #[test]
    fn test_word_count_tolerance() {
        let text = transcript(90);
        let mut root = reply(&text);
        root["wordCount"] = json!(910);
        assert!(NarrationValidator::new(NarrationSize::Medium).check(&root).is_ok());
        root["wordCount"] = json!(889);
        assert!(NarrationValidator::new(NarrationSize::Medium).check(&root).is_err());
    }

    #[test]
    fn test_spoken_word_violations_are_distinct() {
        let text = format!(
            "Host: welcome back. {} [music swells] See https://example.com for **more**.",
            transcript(88)
        );
        let errors = NarrationValidator::new(NarrationSize::Medium)
            .check(&reply(&text))
            .unwrap_err();
        assert!(errors.iter().any(|e| e.contains("speaker labels (found 'Host:')")));
        assert!(errors.iter().any(|e| e.contains("stage directions (found '[music swells]')")));
        assert!(errors.iter().any(|e| e == "transcript contains URLs"));
        assert!(errors.iter().any(|e| e.contains("markdown formatting (found '*')")));
    }

    #[test]
    fn test_parenthetical_is_stage_direction() {
        let text = format!("{} (pause)", transcript(90));
        let errors = NarrationValidator::new(NarrationSize::Medium)
            .check(&reply(&text))
            .unwrap_err();
        assert_eq!(errors, vec!["transcript contains stage directions (found '(pause)')"]);
    }

    #[test]
    fn test_minimum_characters() {
        let errors = NarrationValidator::new(NarrationSize::Short)
            .check(&reply("Too short."))
            .unwrap_err();
        assert_eq!(errors[0], "transcript must be at least 200 characters (found 10)");
    }

    #[test]
    fn test_missing_fields() {
        let errors = NarrationValidator::new(NarrationSize::Short)
            .check(&json!({"title": "x"}))
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "missing field 'transcript'",
                "missing field 'wordCount'",
                "missing field 'estimatedDuration'",
            ]
        );
    }

    #[test]
    fn test_bad_duration() {
        let text = transcript(90);
        let mut root = reply(&text);
        root["estimatedDuration"] = json!("roughly six minutes");
        let errors = NarrationValidator::new(NarrationSize::Medium)
            .check(&root)
            .unwrap_err();
        assert_eq!(
            errors,
            vec!["estimatedDuration 'roughly six minutes' must look like '<n> min <n> sec'"]
        );
    }

    #[test]
    fn test_non_object_root() {
        let errors = NarrationValidator::new(NarrationSize::Short)
            .check(&json!([1, 2]))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
