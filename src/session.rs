//! Study-session state. Every change goes through [`StudySession::reduce`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::StudyCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    DueLoaded(Vec<StudyCard>),
    CardReviewed(StudyCard),
    CardRemoved(Uuid),
    Notified(Notice),
    NoticeDismissed(Uuid),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudySession {
    pub queue: Vec<StudyCard>,
    pub position: usize,
    pub reviewed: u32,
    pub notices: Vec<Notice>,
}

impl StudySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StudyCard> {
        self.queue.get(self.position)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.position)
    }

    pub fn reduce(mut self, event: SessionEvent) -> Self {
        match event {
            SessionEvent::DueLoaded(cards) => {
                self.queue = cards;
                self.position = 0;
            }
            SessionEvent::CardReviewed(card) => {
                if let Some(idx) = self.queue.iter().position(|c| c.id == card.id) {
                    self.queue[idx] = card;
                    if idx == self.position {
                        self.position += 1;
                    }
                }
                self.reviewed += 1;
            }
            SessionEvent::CardRemoved(id) => {
                if let Some(idx) = self.queue.iter().position(|c| c.id == id) {
                    self.queue.remove(idx);
                    if idx < self.position {
                        self.position -= 1;
                    }
                }
            }
            SessionEvent::Notified(notice) => self.notices.push(notice),
            SessionEvent::NoticeDismissed(id) => self.notices.retain(|n| n.id != id),
        }
        self
    }
}
