//! SM-2 scheduling and due-card selection.
//!
//! Quality:
//! 5 - Perfect response
//! 4 - Correct response after a hesitation
//! 3 - Correct response recalled with serious difficulty
//! 2 - Incorrect response; where the correct one seemed easy to recall
//! 1 - Incorrect response; the correct one remembered
//! 0 - Complete blackout.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::StudyError;
use crate::models::StudyCard;

pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Longest gap between reviews, in days.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;
const PASS_THRESHOLD: u8 = 3;

/// A recall rating already checked to lie in 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Result<Self, StudyError> {
        if value > 5 {
            return Err(StudyError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_pass(&self) -> bool {
        self.0 >= PASS_THRESHOLD
    }
}

impl TryFrom<u8> for Quality {
    type Error = StudyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReviewSchedule {
    pub next_review_date: DateTime<Utc>,
    pub interval: u32,
    pub ease_factor: f64,
}

/// Computes the next interval and ease factor for one review.
///
/// The ease factor is recomputed on every review, including failures.
pub fn calculate_next_review(
    quality: Quality,
    previous_interval: u32,
    previous_ease_factor: f64,
    now: DateTime<Utc>,
) -> ReviewSchedule {
    let previous_interval = previous_interval.clamp(1, MAX_INTERVAL_DAYS);

    let interval: u32 = if !quality.is_pass() {
        1
    } else if previous_interval == 1 {
        6
    } else {
        let next = (previous_interval as f64 * previous_ease_factor).round();
        (next.min(MAX_INTERVAL_DAYS as f64) as u32).max(1)
    };

    // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
    let miss = 5.0 - quality.value() as f64;
    let ease_factor = (previous_ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);

    ReviewSchedule {
        next_review_date: now
            .checked_add_signed(Duration::days(interval as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        interval,
        ease_factor,
    }
}

/// Applies a review to a card, returning the updated record.
pub fn apply_review(card: &StudyCard, quality: Quality, now: DateTime<Utc>) -> StudyCard {
    let schedule = calculate_next_review(quality, card.interval, card.ease_factor, now);

    let mut next = card.clone();
    next.interval = schedule.interval;
    next.ease_factor = schedule.ease_factor;
    next.next_review_date = schedule.next_review_date;
    next.review_count += 1;
    next.last_reviewed = Some(now);
    next
}

/// Cards whose review date has passed, earliest first.
pub fn select_due<'a, I>(cards: I, now: DateTime<Utc>) -> Vec<&'a StudyCard>
where
    I: IntoIterator<Item = &'a StudyCard>,
{
    let mut due: Vec<&StudyCard> = cards.into_iter().filter(|c| c.is_due(now)).collect();
    due.sort_by_key(|c| c.next_review_date);
    due
}
