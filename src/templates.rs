//! Offline study material built by filling fixed sentence templates with
//! extracted terms. Always succeeds.

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::extract::{extract_keywords, split_sentences};
use crate::models::{CardDraft, Difficulty, GenerationSource, QuestionKind, QuizQuestion};

pub const PLACEHOLDER_TERM: &str = "concept";
const MAX_TERMS: usize = 25;

const BEGINNER_CARDS: &[&str] = &[
    "What is {concept}?",
    "Define {concept}.",
    "What does {concept} mean in the context of {topic}?",
    "Explain {concept} in simple terms.",
    "What is the purpose of {concept}?",
];

const INTERMEDIATE_CARDS: &[&str] = &[
    "How does {concept} relate to {topic}?",
    "What are the key features of {concept}?",
    "Why is {concept} important in {topic}?",
    "What are the main components of {concept}?",
    "How would you explain {concept} to someone learning {topic}?",
];

const ADVANCED_CARDS: &[&str] = &[
    "Analyze the relationship between {concept} and other elements in {topic}.",
    "Evaluate the significance of {concept} in the broader context of {topic}.",
    "What are the implications of {concept} for understanding {topic}?",
    "How might {concept} be applied in real-world scenarios related to {topic}?",
    "Compare and contrast {concept} with related concepts in {topic}.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionStyle {
    Definition,
    Application,
    Comparison,
    TrueFalse,
    FillBlank,
    ShortAnswer,
}

fn card_templates(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Beginner => BEGINNER_CARDS,
        Difficulty::Intermediate => INTERMEDIATE_CARDS,
        Difficulty::Advanced => ADVANCED_CARDS,
    }
}

fn question_styles(difficulty: Difficulty) -> &'static [QuestionStyle] {
    match difficulty {
        Difficulty::Beginner => &[QuestionStyle::Definition, QuestionStyle::TrueFalse, QuestionStyle::FillBlank],
        Difficulty::Intermediate => &[
            QuestionStyle::Application,
            QuestionStyle::Comparison,
            QuestionStyle::Definition,
        ],
        Difficulty::Advanced => &[
            QuestionStyle::Comparison,
            QuestionStyle::ShortAnswer,
            QuestionStyle::Application,
        ],
    }
}

fn fill(template: &str, concept: &str, topic: &str) -> String {
    template.replace("{concept}", concept).replace("{topic}", topic)
}

#[derive(Debug, Default, Clone)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Terms to cycle through; falls back to the placeholder when the
    /// content has nothing usable.
    pub fn terms(&self, content: &str) -> Vec<String> {
        let terms = extract_keywords(content, MAX_TERMS);
        if terms.is_empty() {
            vec![PLACEHOLDER_TERM.to_string()]
        } else {
            terms
        }
    }

    pub fn flashcards(&self, content: &str, topic: &str, difficulty: Difficulty, count: usize) -> Vec<CardDraft> {
        let terms = self.terms(content);
        let templates = card_templates(difficulty);
        let topic = display_topic(topic);

        (0..count)
            .map(|i| {
                let concept = &terms[i % terms.len()];
                CardDraft {
                    question: fill(templates[i % templates.len()], concept, topic),
                    answer: contextual_answer(concept, topic, content, difficulty),
                }
            })
            .collect()
    }

    pub fn questions<R: Rng + ?Sized>(
        &self,
        content: &str,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
        rng: &mut R,
    ) -> Vec<QuizQuestion> {
        let terms = self.terms(content);
        let styles = question_styles(difficulty);
        let topic_label = display_topic(topic);

        (0..count)
            .map(|i| {
                let concept = &terms[i % terms.len()];
                let (question, kind) = build_question(styles[i % styles.len()], concept, topic_label, content, &mut *rng);
                QuizQuestion {
                    id: Uuid::new_v4(),
                    question,
                    topic: topic.to_string(),
                    difficulty,
                    source: GenerationSource::Template,
                    kind,
                }
            })
            .collect()
    }
}

fn display_topic(topic: &str) -> &str {
    let topic = topic.trim();
    if topic.is_empty() {
        "the material"
    } else {
        topic
    }
}

/// Longest sentence of the content mentioning the concept.
fn best_sentence(concept: &str, content: &str) -> Option<String> {
    let needle = concept.to_lowercase();
    split_sentences(content)
        .into_iter()
        .filter(|s| s.to_lowercase().contains(&needle))
        .max_by_key(|s| s.chars().count())
}

fn contextual_answer(concept: &str, topic: &str, content: &str, difficulty: Difficulty) -> String {
    match (best_sentence(concept, content), difficulty) {
        (Some(sentence), Difficulty::Beginner) => format!("{} refers to: {}", concept, sentence),
        (Some(sentence), Difficulty::Intermediate) => format!(
            "{} is an important aspect of {}. {} This helps in understanding the broader principles of {}.",
            concept, topic, sentence, topic
        ),
        (Some(sentence), Difficulty::Advanced) => format!(
            "{} represents a complex element within {}. {} Understanding {} is crucial for advanced applications of {}.",
            concept, topic, sentence, concept, topic
        ),
        (None, _) => format!(
            "{} is a key idea in {}. Review the study material to explain it in your own words.",
            concept, topic
        ),
    }
}

fn build_question<R: Rng + ?Sized>(
    style: QuestionStyle,
    concept: &str,
    topic: &str,
    content: &str,
    rng: &mut R,
) -> (String, QuestionKind) {
    match style {
        QuestionStyle::Definition => {
            let correct = best_sentence(concept, content)
                .unwrap_or_else(|| format!("A key idea within {}", topic));
            let mut options = vec![
                correct.clone(),
                "A method used primarily in other fields".to_string(),
                format!("An outdated concept no longer relevant to {}", topic),
                format!("A complex theory that applies only to advanced {}", topic),
            ];
            options.shuffle(rng);
            let correct_index = options.iter().position(|o| *o == correct).unwrap_or(0);
            (
                format!("What is {} in the context of {}?", concept, topic),
                QuestionKind::MultipleChoice {
                    options,
                    correct: correct_index,
                    explanation: format!("The correct answer is: {}", correct),
                },
            )
        }
        QuestionStyle::Application => (
            format!("How would {} be applied in a practical {} scenario?", concept, topic),
            QuestionKind::MultipleChoice {
                options: vec![
                    format!("When implementing {} in real-world {} applications", concept, topic),
                    format!("In theoretical discussions about {}", topic),
                    format!("Only in academic research about {}", topic),
                    format!("Never, as {} is purely theoretical", concept),
                ],
                correct: 0,
                explanation: format!("{} is used when putting {} into practice.", concept, topic),
            },
        ),
        QuestionStyle::Comparison => (
            format!("How does {} compare to other elements in {}?", concept, topic),
            QuestionKind::MultipleChoice {
                options: vec![
                    format!("{} provides unique advantages in {} applications", concept, topic),
                    format!("{} is identical to all other {} concepts", concept, topic),
                    format!("{} is less important than any other {} element", concept, topic),
                    format!("{} has no relationship to other {} concepts", concept, topic),
                ],
                correct: 0,
                explanation: format!("{} plays a distinct role within {}.", concept, topic),
            },
        ),
        QuestionStyle::TrueFalse => (
            format!("{} is discussed as part of {}.", concept, topic),
            QuestionKind::TrueFalse {
                answer: true,
                explanation: format!("The study material covers {} within {}.", concept, topic),
            },
        ),
        QuestionStyle::FillBlank => (
            format!("The main idea of {} in {} is _____.", concept, topic),
            QuestionKind::FillBlank {
                answer: contextual_answer(concept, topic, content, Difficulty::Beginner),
            },
        ),
        QuestionStyle::ShortAnswer => (
            format!("Explain how {} works in your own words.", concept),
            QuestionKind::ShortAnswer {
                answer: contextual_answer(concept, topic, content, Difficulty::Advanced),
            },
        ),
    }
}
