//! Prompt and schema construction for the generation stages.

use serde_json::{json, Value};

use notegen_core::{
    defaults, NarrationConfig, NarrationStyle, QuestionType, QuizConfig,
};

/// A system/user prompt pair with the JSON schema the reply should follow.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
    pub schema: Value,
}

const QUIZ_SYSTEM: &str = "You write study questions from a learner's notes. \
Reply with a single JSON object and nothing else: no prose, no markdown fences.";

const NARRATION_SYSTEM: &str = "You write scripts that are read aloud by a text-to-speech voice. \
Reply with a single JSON object and nothing else: no prose, no markdown fences.";

fn type_instructions(question_type: QuestionType) -> String {
    match question_type {
        QuestionType::Flashcard => format!(
            "Each question is a flashcard: a short prompt in \"question\" and the answer \
             (at least {} characters) in \"answer\".",
            defaults::FLASHCARD_MIN_ANSWER_CHARS
        ),
        QuestionType::MultipleChoice => format!(
            "Each question has exactly {} distinct \"options\". \"correctAnswer\" repeats \
             one option word for word. \"explanation\" (at least {} characters) says why it \
             is correct.",
            defaults::MULTIPLE_CHOICE_OPTIONS,
            defaults::MIN_EXPLANATION_CHARS
        ),
        QuestionType::TrueFalse => format!(
            "Each question is a statement. \"correctAnswer\" is the string \"true\" or \
             \"false\". \"explanation\" (at least {} characters) says why.",
            defaults::MIN_EXPLANATION_CHARS
        ),
        QuestionType::OpenQuestion => format!(
            "Each question asks for a written response. \"answer\" is a model answer of at \
             least {} characters.",
            defaults::OPEN_QUESTION_MIN_ANSWER_CHARS
        ),
    }
}

fn style_instructions(style: NarrationStyle) -> &'static str {
    match style {
        NarrationStyle::Conversational => {
            "Speak directly to one listener in a warm, relaxed tone, as if explaining over coffee."
        }
        NarrationStyle::Lecture => {
            "Speak like a clear, well-organized lecturer: introduce the topic, develop each point, summarize."
        }
        NarrationStyle::Storytelling => {
            "Tell it as a story with a beginning, middle, and end, keeping every fact accurate."
        }
    }
}

fn tag_hint(owner_tags: &[String]) -> String {
    if owner_tags.is_empty() {
        "\"tags\" may be an empty array.".to_string()
    } else {
        format!(
            "\"tags\" lists the most relevant of these existing tags, or is empty: {}.",
            owner_tags.join(", ")
        )
    }
}

/// Prompt for a quiz over `note_content`.
pub fn quiz_prompt(
    config: &QuizConfig,
    note_title: Option<&str>,
    note_content: &str,
    owner_tags: &[String],
) -> PromptRequest {
    let mut user = String::new();
    user.push_str(&format!(
        "Write {} {} questions at {} difficulty about the note below.\n",
        config.question_count,
        config.question_type,
        config.difficulty.as_str()
    ));
    user.push_str(&type_instructions(config.question_type));
    user.push('\n');
    user.push_str(&format!(
        "Give every question a unique \"id\" and set \"type\" to \"{}\". {}\n",
        config.question_type,
        tag_hint(owner_tags)
    ));
    if let Some(language) = &config.language {
        user.push_str(&format!("Write the questions in language '{}'.\n", language));
    }
    user.push_str("\n### Note\n\n");
    if let Some(title) = note_title {
        user.push_str(&format!("Title: {}\n\n", title));
    }
    user.push_str(note_content);
    user.push('\n');

    PromptRequest {
        system: QUIZ_SYSTEM.to_string(),
        user,
        schema: quiz_schema(config.question_type),
    }
}

/// Prompt for a narration script over `source_text`.
pub fn narration_prompt(
    config: &NarrationConfig,
    source_title: Option<&str>,
    source_text: &str,
    owner_tags: &[String],
) -> PromptRequest {
    let (min_words, max_words) = config.size.word_range();
    let (min_sentences, max_sentences) = config.size.sentence_range();

    let mut user = String::new();
    user.push_str(&format!(
        "Write a narration script of {} to {} words in {} to {} sentences about the source below.\n",
        min_words, max_words, min_sentences, max_sentences
    ));
    user.push_str(style_instructions(config.style));
    user.push('\n');
    user.push_str(
        "The transcript is spoken verbatim: no speaker labels, no stage directions in brackets \
         or parentheses, no URLs, no markdown or special symbols.\n",
    );
    user.push_str(&format!(
        "Set \"wordCount\" to the transcript's word count and \"estimatedDuration\" like \
         \"6 min 30 sec\". {}\n",
        tag_hint(owner_tags)
    ));
    if let Some(language) = &config.language {
        user.push_str(&format!("Write the script in language '{}'.\n", language));
    }
    user.push_str("\n### Source\n\n");
    if let Some(title) = source_title {
        user.push_str(&format!("Title: {}\n\n", title));
    }
    user.push_str(source_text);
    user.push('\n');

    PromptRequest {
        system: NARRATION_SYSTEM.to_string(),
        user,
        schema: narration_schema(),
    }
}

/// JSON schema of a quiz reply for `question_type`.
pub fn quiz_schema(question_type: QuestionType) -> Value {
    let mut properties = json!({
        "id": {"type": ["string", "integer"]},
        "type": {"type": "string", "enum": [question_type.as_str()]},
        "question": {"type": "string"}
    });
    let mut required = vec!["id", "type", "question"];
    let extra = match question_type {
        QuestionType::Flashcard | QuestionType::OpenQuestion => {
            required.push("answer");
            json!({"answer": {"type": "string"}})
        }
        QuestionType::MultipleChoice => {
            required.extend(["options", "correctAnswer", "explanation"]);
            json!({
                "options": {
                    "type": "array",
                    "items": {"type": "string"},
                    "minItems": defaults::MULTIPLE_CHOICE_OPTIONS,
                    "maxItems": defaults::MULTIPLE_CHOICE_OPTIONS
                },
                "correctAnswer": {"type": "string"},
                "explanation": {"type": "string"}
            })
        }
        QuestionType::TrueFalse => {
            required.extend(["correctAnswer", "explanation"]);
            json!({
                "correctAnswer": {"type": "string", "enum": ["true", "false"]},
                "explanation": {"type": "string"}
            })
        }
    };
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }

    json!({
        "title": "quiz",
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": required
                }
            },
            "tags": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["questions"]
    })
}

/// JSON schema of a narration script reply.
pub fn narration_schema() -> Value {
    json!({
        "title": "narration_script",
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "transcript": {"type": "string"},
            "wordCount": {"type": "integer"},
            "estimatedDuration": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["transcript", "wordCount", "estimatedDuration"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegen_core::{Difficulty, NarrationSize};

    fn quiz_config(question_type: QuestionType) -> QuizConfig {
        QuizConfig {
            question_count: 5,
            question_type,
            difficulty: Difficulty::Hard,
            language: Some("de".into()),
        }
    }

    #[test]
    fn test_quiz_prompt_mentions_parameters() {
        let prompt = quiz_prompt(
            &quiz_config(QuestionType::MultipleChoice),
            Some("Cells"),
            "Mitochondria produce ATP.",
            &["Biology".to_string()],
        );
        assert!(prompt.user.contains("Write 5 MULTIPLE_CHOICE questions at HARD difficulty"));
        assert!(prompt.user.contains("exactly 4 distinct \"options\""));
        assert!(prompt.user.contains("language 'de'"));
        assert!(prompt.user.contains("Title: Cells"));
        assert!(prompt.user.contains("Mitochondria produce ATP."));
        assert!(prompt.user.contains("Biology"));
        assert_eq!(prompt.schema["title"], "quiz");
    }

    #[test]
    fn test_quiz_schema_per_type() {
        let mc = quiz_schema(QuestionType::MultipleChoice);
        let item = &mc["properties"]["questions"]["items"];
        assert_eq!(item["properties"]["options"]["minItems"], 4);
        assert!(item["required"]
            .as_array()
            .unwrap()
            .contains(&json!("correctAnswer")));

        let flashcard = quiz_schema(QuestionType::Flashcard);
        let item = &flashcard["properties"]["questions"]["items"];
        assert!(item["properties"].get("options").is_none());
        assert_eq!(item["properties"]["type"]["enum"][0], "FLASHCARD");
    }

    #[test]
    fn test_narration_prompt_uses_tier() {
        let config = NarrationConfig {
            size: NarrationSize::Long,
            ..Default::default()
        };
        let prompt = narration_prompt(&config, None, "Photosynthesis converts light.", &[]);
        assert!(prompt.user.contains("1500 to 2200 words"));
        assert!(prompt.user.contains("60 to 200 sentences"));
        assert!(prompt.user.contains("\"tags\" may be an empty array."));
        assert_eq!(prompt.schema["title"], "narration_script");
    }
}
