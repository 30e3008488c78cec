//! Quiz reply rules.

use std::collections::HashSet;

use serde_json::Value;

use notegen_core::{defaults, Question, QuestionType, QuizConfig};

use super::{as_integer, FieldReader, ResponseValidator};

/// A quiz reply that passed every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuiz {
    pub questions: Vec<Question>,
    /// Proposed tag names, not yet resolved against the owner's tags.
    pub tag_names: Vec<String>,
}

/// Checks a quiz batch against the requested question type and count.
///
/// Accepts `{"questions": [...], "tags": [...]}` or a bare array of
/// questions. Fewer questions than requested is fine as long as one is
/// present; questions beyond the requested count are ignored.
#[derive(Debug, Clone)]
pub struct QuizValidator {
    question_type: QuestionType,
    question_count: usize,
}

impl QuizValidator {
    pub fn new(config: &QuizConfig) -> Self {
        Self {
            question_type: config.question_type,
            question_count: config.question_count as usize,
        }
    }
}

impl ResponseValidator for QuizValidator {
    type Output = ValidatedQuiz;

    fn name(&self) -> &'static str {
        "quiz"
    }

    fn check(&self, root: &Value) -> Result<ValidatedQuiz, Vec<String>> {
        let mut errors = Vec::new();
        let root_reader = FieldReader::new(root, "");

        let (items, tag_names) = match root {
            Value::Array(items) => (items, Vec::new()),
            Value::Object(_) => {
                let Some(value) = root_reader.get("questions") else {
                    return Err(vec!["missing field 'questions'".to_string()]);
                };
                let Some(items) = value.as_array() else {
                    return Err(vec!["field 'questions' must be an array".to_string()]);
                };
                (items, root_reader.tag_names("tags"))
            }
            _ => {
                return Err(vec![
                    "Response must be a JSON object with a 'questions' array".to_string(),
                ])
            }
        };

        if items.is_empty() {
            return Err(vec!["Quiz contains no questions".to_string()]);
        }

        let mut seen_ids = HashSet::new();
        let mut questions = Vec::with_capacity(items.len().min(self.question_count));
        for (index, item) in items.iter().take(self.question_count).enumerate() {
            if let Some(question) = self.check_question(index + 1, item, &mut seen_ids, &mut errors)
            {
                questions.push(question);
            }
        }

        if errors.is_empty() {
            Ok(ValidatedQuiz {
                questions,
                tag_names,
            })
        } else {
            Err(errors)
        }
    }
}

impl QuizValidator {
    fn check_question(
        &self,
        number: usize,
        item: &Value,
        seen_ids: &mut HashSet<String>,
        errors: &mut Vec<String>,
    ) -> Option<Question> {
        let reader = FieldReader::new(item, format!("Question {}: ", number));
        if !item.is_object() {
            reader.error("must be an object", errors);
            return None;
        }
        let before = errors.len();

        let id = question_id(&reader, errors);
        if let Some(id) = &id {
            if !seen_ids.insert(id.clone()) {
                reader.error(format!("duplicate id '{}'", id), errors);
            }
        }

        let declared = match reader.text("type", errors) {
            Some(raw) => match QuestionType::parse(raw) {
                Some(t) if t == self.question_type => Some(t),
                Some(t) => {
                    reader.error(
                        format!(
                            "type {} does not match requested type {}",
                            t, self.question_type
                        ),
                        errors,
                    );
                    Some(t)
                }
                None => {
                    reader.error(format!("unknown type '{}'", raw), errors);
                    None
                }
            },
            None => None,
        };

        let text = reader.text("question", errors);

        let mut question = Question {
            id: id.unwrap_or_default(),
            question_type: declared.unwrap_or(self.question_type),
            question: text.unwrap_or_default().to_string(),
            options: Vec::new(),
            correct_answer: None,
            answer: None,
            explanation: reader.optional_text("explanation").map(str::to_string),
        };

        match declared {
            Some(QuestionType::Flashcard) => {
                question.answer = min_length_text(
                    &reader,
                    "answer",
                    defaults::FLASHCARD_MIN_ANSWER_CHARS,
                    errors,
                );
            }
            Some(QuestionType::MultipleChoice) => {
                check_multiple_choice(&reader, &mut question, errors);
            }
            Some(QuestionType::TrueFalse) => {
                check_true_false(&reader, &mut question, errors);
            }
            Some(QuestionType::OpenQuestion) => {
                question.answer = min_length_text(
                    &reader,
                    "answer",
                    defaults::OPEN_QUESTION_MIN_ANSWER_CHARS,
                    errors,
                );
            }
            None => {}
        }

        (errors.len() == before).then_some(question)
    }
}

/// Question ids may be text or integers; both normalize to text.
fn question_id(reader: &FieldReader<'_>, errors: &mut Vec<String>) -> Option<String> {
    let Some(value) = reader.get("id") else {
        reader.missing("id", errors);
        return None;
    };
    if let Some(text) = value.as_str() {
        let text = text.trim();
        if text.is_empty() {
            reader.error("field 'id' must not be empty", errors);
            return None;
        }
        return Some(text.to_string());
    }
    match as_integer(value) {
        Some(n) => Some(n.to_string()),
        None => {
            reader.error("field 'id' must be text or an integer", errors);
            None
        }
    }
}

fn min_length_text(
    reader: &FieldReader<'_>,
    field: &str,
    min_chars: usize,
    errors: &mut Vec<String>,
) -> Option<String> {
    let text = reader.text(field, errors)?;
    if text.chars().count() < min_chars {
        reader.error(
            format!("{} must be at least {} characters", field, min_chars),
            errors,
        );
        return None;
    }
    Some(text.to_string())
}

fn check_multiple_choice(
    reader: &FieldReader<'_>,
    question: &mut Question,
    errors: &mut Vec<String>,
) {
    // Options are stored trimmed; the answer check compares the text as sent.
    let (options, sent_options): (Vec<String>, Vec<String>) = match reader.get("options") {
        None => {
            reader.missing("options", errors);
            (Vec::new(), Vec::new())
        }
        Some(value) => match value.as_array() {
            None => {
                reader.error("field 'options' must be an array", errors);
                (Vec::new(), Vec::new())
            }
            Some(items) => {
                if items.len() != defaults::MULTIPLE_CHOICE_OPTIONS {
                    reader.error(
                        format!(
                            "must have exactly {} options (found {})",
                            defaults::MULTIPLE_CHOICE_OPTIONS,
                            items.len()
                        ),
                        errors,
                    );
                }
                let mut options = Vec::with_capacity(items.len());
                let mut sent = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item.as_str().filter(|s| !s.trim().is_empty()) {
                        Some(option) => {
                            options.push(option.trim().to_string());
                            sent.push(option.to_lowercase());
                        }
                        None => reader.error(format!("option {} must be non-empty text", i + 1), errors),
                    }
                }
                (options, sent)
            }
        },
    };

    if let Some(correct) = reader.text("correctAnswer", errors) {
        let sent_answer = reader
            .get("correctAnswer")
            .and_then(Value::as_str)
            .unwrap_or(correct)
            .to_lowercase();
        let matches = sent_options.iter().any(|option| *option == sent_answer);
        if !options.is_empty() && !matches {
            reader.error(
                format!("correctAnswer '{}' does not match any option", correct),
                errors,
            );
        }
        question.correct_answer = Some(correct.to_string());
    }

    question.explanation =
        min_length_text(reader, "explanation", defaults::MIN_EXPLANATION_CHARS, errors);
    question.options = options;
}

fn check_true_false(reader: &FieldReader<'_>, question: &mut Question, errors: &mut Vec<String>) {
    match reader.get("correctAnswer") {
        None => reader.missing("correctAnswer", errors),
        Some(value) => match value.as_str() {
            Some(answer @ ("true" | "false")) => {
                question.correct_answer = Some(answer.to_string());
            }
            _ => reader.error("correctAnswer must be exactly \"true\" or \"false\"", errors),
        },
    }
    question.explanation =
        min_length_text(reader, "explanation", defaults::MIN_EXPLANATION_CHARS, errors);
}
