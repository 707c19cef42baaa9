use thiserror::Error;
use uuid::Uuid;

use crate::usage::{Plan, UsageAction};

/// Domain errors surfaced to callers of the study engine.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("quality must be between 0 and 5, got {0}")]
    InvalidQuality(u8),

    #[error("card not found: {0}")]
    CardNotFound(Uuid),

    #[error("daily {action} limit of {limit} reached on the {plan} plan")]
    UsageLimitReached {
        action: UsageAction,
        limit: u32,
        plan: Plan,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
