use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INITIAL_INTERVAL: u32 = 1;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// Where a piece of study material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    Remote,
    Template,
}

impl GenerationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationSource::Remote => "remote",
            GenerationSource::Template => "template",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "remote" => GenerationSource::Remote,
            _ => GenerationSource::Template,
        }
    }
}

/// A question/answer pair produced by a generator, before it is scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyCard {
    pub id: Uuid,
    pub topic: String,
    pub question: String,
    pub answer: String,
    pub source: GenerationSource,
    pub interval: u32, // days
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
    pub review_count: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StudyCard {
    pub fn new(draft: CardDraft, topic: &str, source: GenerationSource, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            question: draft.question,
            answer: draft.answer,
            source,
            interval: INITIAL_INTERVAL,
            ease_factor: INITIAL_EASE_FACTOR,
            next_review_date: now,
            review_count: 0,
            last_reviewed: None,
            created_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        correct: usize,
        explanation: String,
    },
    TrueFalse {
        answer: bool,
        explanation: String,
    },
    FillBlank {
        answer: String,
    },
    ShortAnswer {
        answer: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub source: GenerationSource,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Generated items tagged with the path that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct Generated<T> {
    pub source: GenerationSource,
    pub items: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_card_defaults() {
        let now = Utc::now();
        let draft = CardDraft {
            question: "What is osmosis?".to_string(),
            answer: "Diffusion of water across a membrane.".to_string(),
        };
        let card = StudyCard::new(draft, "biology", GenerationSource::Template, now);

        assert_eq!(card.interval, 1);
        assert_eq!(card.ease_factor, 2.5);
        assert_eq!(card.review_count, 0);
        assert_eq!(card.next_review_date, now);
        assert!(card.last_reviewed.is_none());
        assert!(card.is_due(now));
    }

    #[test]
    fn test_question_kind_serializes_flat() {
        let q = QuizQuestion {
            id: Uuid::new_v4(),
            question: "Photosynthesis needs light.".to_string(),
            topic: "biology".to_string(),
            difficulty: Difficulty::Beginner,
            source: GenerationSource::Template,
            kind: QuestionKind::TrueFalse {
                answer: true,
                explanation: "Light drives the reaction.".to_string(),
            },
        };
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "true_false");
        assert_eq!(value["answer"], true);
        assert_eq!(value["source"], "template");
        assert_eq!(value["difficulty"], "beginner");
    }
}
