//! Client for the hosted text-generation model plus the prompt builders and
//! parsers around it.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CardDraft, Difficulty, GenerationSource, QuestionKind, QuizQuestion};

pub const DEFAULT_MODEL_URL: &str = "https://api-inference.huggingface.co/models/google/flan-t5-large";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no API key configured for the text-generation model")]
    MissingCredential,

    #[error("request to text-generation model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text-generation model returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response from text-generation model: {0}")]
    Malformed(String),
}

#[derive(Clone)]
pub struct RemoteClient {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelResponse {
    Many(Vec<Generation>),
    One(Generation),
}

impl RemoteClient {
    pub fn new(api_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends one prompt and returns the generated text.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, RemoteError> {
        let api_key = self.api_key.as_deref().ok_or(RemoteError::MissingCredential)?;

        let body = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": 800,
                "temperature": 0.7,
                "do_sample": true,
                "return_full_text": false
            }
        });

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status { status, body: text });
        }

        let parsed: ModelResponse =
            serde_json::from_str(&text).map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let generated = match parsed {
            ModelResponse::Many(list) => list.into_iter().next().map(|g| g.generated_text),
            ModelResponse::One(g) => Some(g.generated_text),
        };

        match generated {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(RemoteError::Malformed("no generated text".to_string())),
        }
    }
}

fn difficulty_hint_cards(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => "Focus on basic definitions and simple concepts. Use clear, simple language.",
        Difficulty::Intermediate => "Include both definitions and applications. Mix conceptual and practical questions.",
        Difficulty::Advanced => "Focus on complex relationships, analysis, and synthesis. Include challenging scenarios.",
    }
}

fn difficulty_hint_quiz(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => "Simple multiple choice questions testing basic recall and understanding.",
        Difficulty::Intermediate => "Questions requiring application and analysis of concepts.",
        Difficulty::Advanced => "Complex questions involving synthesis, evaluation, and critical thinking.",
    }
}

pub fn build_flashcard_prompt(content: &str, topic: &str, difficulty: Difficulty, count: usize) -> String {
    format!(
        "Task: Create {count} educational flashcards about {topic}.\n\n\
         Content to study: {content}\n\n\
         Instructions:\n\
         - {hint}\n\
         - Each flashcard should test understanding, not just memorization\n\
         - Questions should be clear and unambiguous\n\
         - Answers should be comprehensive but concise\n\n\
         Format:\n\
         Q: [question]\n\
         A: [answer]\n\
         ---\n\n\
         Generate {count} flashcards now:\n",
        hint = difficulty_hint_cards(difficulty),
    )
}

pub fn build_question_prompt(content: &str, topic: &str, difficulty: Difficulty, count: usize) -> String {
    format!(
        "Task: Create {count} multiple choice questions about {topic}.\n\n\
         Content: {content}\n\n\
         Requirements:\n\
         - {hint}\n\
         - Each question has exactly 4 options (A, B, C, D)\n\
         - Only one correct answer per question\n\
         - Distractors should be plausible but clearly wrong\n\n\
         Format:\n\
         Q: [question]\n\
         A) [option 1]\n\
         B) [option 2]\n\
         C) [option 3]\n\
         D) [option 4]\n\
         Correct: [A/B/C/D]\n\
         ---\n\n\
         Generate {count} questions now:\n",
        hint = difficulty_hint_quiz(difficulty),
    )
}

/// Parses `Q:`/`A:` blocks separated by `---`. Continuation lines are
/// appended to the current section.
pub fn parse_flashcards(text: &str) -> Vec<CardDraft> {
    let mut cards = Vec::new();

    for block in text.split("---") {
        let mut question = String::new();
        let mut answer = String::new();
        let mut in_answer: Option<bool> = None;

        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(rest) = line.strip_prefix("Q:") {
                question = rest.trim().to_string();
                in_answer = Some(false);
            } else if let Some(rest) = line.strip_prefix("A:") {
                answer = rest.trim().to_string();
                in_answer = Some(true);
            } else if in_answer == Some(false) {
                question.push(' ');
                question.push_str(line);
            } else if in_answer == Some(true) {
                answer.push(' ');
                answer.push_str(line);
            }
        }

        if question.chars().count() > 5 && answer.chars().count() > 10 {
            cards.push(CardDraft { question, answer });
        }
    }
    cards
}

/// Parses four-option multiple choice blocks with a `Correct:` letter.
pub fn parse_questions(text: &str, topic: &str, difficulty: Difficulty) -> Vec<QuizQuestion> {
    let mut questions = Vec::new();

    for block in text.split("---") {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() < 6 {
            continue;
        }

        let Some(question) = lines.iter().find_map(|l| l.strip_prefix("Q:")).map(|q| q.trim().to_string()) else {
            continue;
        };

        let mut options = Vec::new();
        let mut correct = None;
        for line in &lines {
            if let Some(rest) = ["A)", "B)", "C)", "D)"].iter().find_map(|p| line.strip_prefix(p)) {
                options.push(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("Correct:") {
                correct = rest
                    .trim()
                    .chars()
                    .next()
                    .map(|c| c.to_ascii_uppercase())
                    .filter(|c| ('A'..='D').contains(c))
                    .map(|c| (c as u8 - b'A') as usize);
            }
        }

        if question.is_empty() || options.len() != 4 {
            continue;
        }
        let Some(correct) = correct else {
            continue;
        };

        questions.push(QuizQuestion {
            id: Uuid::new_v4(),
            question,
            topic: topic.to_string(),
            difficulty,
            source: GenerationSource::Remote,
            kind: QuestionKind::MultipleChoice {
                explanation: format!("The correct answer is: {}", options[correct]),
                options,
                correct,
            },
        });
    }
    questions
}
