//! Subscription plans and the daily usage limits they grant.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
    Pro,
}

impl Plan {
    /// Unknown plan names resolve to the free tier.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "premium" => Plan::Premium,
            "pro" => Plan::Pro,
            _ => Plan::Free,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                daily_flashcard_generations: Some(3),
                daily_quiz_generations: Some(3),
                max_flashcards_per_generation: 5,
                max_questions_per_generation: 5,
            },
            Plan::Premium => PlanLimits {
                daily_flashcard_generations: Some(20),
                daily_quiz_generations: Some(20),
                max_flashcards_per_generation: 10,
                max_questions_per_generation: 8,
            },
            Plan::Pro => PlanLimits {
                daily_flashcard_generations: None,
                daily_quiz_generations: None,
                max_flashcards_per_generation: 20,
                max_questions_per_generation: 15,
            },
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
            Plan::Pro => "pro",
        };
        f.write_str(name)
    }
}

/// `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub daily_flashcard_generations: Option<u32>,
    pub daily_quiz_generations: Option<u32>,
    pub max_flashcards_per_generation: usize,
    pub max_questions_per_generation: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    FlashcardGeneration,
    QuizGeneration,
}

impl UsageAction {
    pub const ALL: [UsageAction; 2] = [UsageAction::FlashcardGeneration, UsageAction::QuizGeneration];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageAction::FlashcardGeneration => "flashcard_generation",
            UsageAction::QuizGeneration => "quiz_generation",
        }
    }
}

impl fmt::Display for UsageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlanLimits {
    pub fn daily_limit(&self, action: UsageAction) -> Option<u32> {
        match action {
            UsageAction::FlashcardGeneration => self.daily_flashcard_generations,
            UsageAction::QuizGeneration => self.daily_quiz_generations,
        }
    }

    pub fn max_items(&self, action: UsageAction) -> usize {
        match action {
            UsageAction::FlashcardGeneration => self.max_flashcards_per_generation,
            UsageAction::QuizGeneration => self.max_questions_per_generation,
        }
    }

    /// Clamps a requested item count into `1..=max` for the action.
    pub fn clamp_count(&self, action: UsageAction, requested: usize) -> usize {
        requested.clamp(1, self.max_items(action))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageCheck {
    pub action: UsageAction,
    pub used: u32,
    pub limit: Option<u32>,
    pub can_proceed: bool,
}

pub fn check_usage(plan: Plan, action: UsageAction, used: u32) -> UsageCheck {
    let limit = plan.limits().daily_limit(action);
    UsageCheck {
        action,
        used,
        limit,
        can_proceed: limit.map_or(true, |l| used < l),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse() {
        assert_eq!(Plan::parse("Premium"), Plan::Premium);
        assert_eq!(Plan::parse("pro"), Plan::Pro);
        assert_eq!(Plan::parse("enterprise"), Plan::Free);
        assert_eq!(Plan::Pro.to_string(), "pro");
    }

    #[test]
    fn test_free_limit_reached() {
        let ok = check_usage(Plan::Free, UsageAction::FlashcardGeneration, 2);
        assert!(ok.can_proceed);
        assert_eq!(ok.limit, Some(3));

        let blocked = check_usage(Plan::Free, UsageAction::FlashcardGeneration, 3);
        assert!(!blocked.can_proceed);
    }

    #[test]
    fn test_pro_is_unlimited() {
        let check = check_usage(Plan::Pro, UsageAction::QuizGeneration, 10_000);
        assert!(check.can_proceed);
        assert_eq!(check.limit, None);
    }

    #[test]
    fn test_clamp_count() {
        let limits = Plan::Premium.limits();
        assert_eq!(limits.clamp_count(UsageAction::FlashcardGeneration, 50), 10);
        assert_eq!(limits.clamp_count(UsageAction::QuizGeneration, 0), 1);
        assert_eq!(limits.clamp_count(UsageAction::QuizGeneration, 4), 4);
    }
}
