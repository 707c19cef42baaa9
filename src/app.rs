use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::Db;
use crate::error::StudyError;
use crate::extract::{analyze_content, extract_keywords, validate_content, ContentStats, ContentValidation};
use crate::generator::{ContentGenerator, GenerationRequest};
use crate::models::{Generated, QuizQuestion, StudyCard};
use crate::retry::RetryPolicy;
use crate::session::{Notice, NoticeLevel, SessionEvent, StudySession};
use crate::srs::{apply_review, Quality};
use crate::sync::{spawn_periodic_sync, FlushReport, SyncPayload, SyncQueue, SyncSink};
use crate::usage::{check_usage, Plan, PlanLimits, UsageAction, UsageCheck};

#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub plan: Plan,
    pub limits: PlanLimits,
    pub usage: Vec<UsageCheck>,
}

#[derive(Debug, Serialize)]
pub struct ContentAnalysis {
    pub stats: ContentStats,
    pub validation: ContentValidation,
    pub keywords: Vec<String>,
}

pub struct App {
    pub db: Db,
    pub plan: Plan,
    pub session: StudySession,
    generator: ContentGenerator,
    sync: Option<Arc<Mutex<SyncQueue>>>,
    store_retry: RetryPolicy,
    rng: StdRng,
}

impl App {
    pub fn new(db: Db, generator: ContentGenerator, plan: Plan) -> Self {
        Self {
            db,
            plan,
            session: StudySession::new(),
            generator,
            sync: None,
            store_retry: RetryPolicy::default(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_store_retry(mut self, policy: RetryPolicy) -> Self {
        self.store_retry = policy;
        self
    }

    /// Queues local changes for a remote store. Without this nothing is queued.
    pub fn with_sync(mut self, policy: RetryPolicy) -> Self {
        self.sync = Some(Arc::new(Mutex::new(SyncQueue::new(policy))));
        self
    }

    pub fn sync_queue(&self) -> Option<Arc<Mutex<SyncQueue>>> {
        self.sync.clone()
    }

    async fn queue_sync(&self, payload: SyncPayload) {
        if let Some(queue) = &self.sync {
            queue.lock().await.enqueue(payload);
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let session = std::mem::take(&mut self.session);
        self.session = session.reduce(event);
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.apply(SessionEvent::Notified(Notice::new(level, message)));
    }

    /// Fails with [`StudyError::UsageLimitReached`] once today's quota is used up.
    async fn ensure_allowed(&self, action: UsageAction) -> anyhow::Result<()> {
        let used = self.db.usage_today(action).await?;
        let check = check_usage(self.plan, action, used);
        if !check.can_proceed {
            return Err(StudyError::UsageLimitReached {
                action,
                limit: check.limit.unwrap_or(used),
                plan: self.plan,
            }
            .into());
        }
        Ok(())
    }

    fn prepare(&self, action: UsageAction, mut req: GenerationRequest) -> anyhow::Result<GenerationRequest> {
        if req.content.trim().is_empty() {
            return Err(StudyError::InvalidRequest("content must not be empty".to_string()).into());
        }

        let validation = validate_content(&req.content);
        for issue in validation.issues.iter().chain(validation.warnings.iter()) {
            info!("content check: {}", issue);
        }

        req.count = self.plan.limits().clamp_count(action, req.count);
        Ok(req)
    }

    pub async fn generate_flashcards(&mut self, req: GenerationRequest) -> anyhow::Result<Generated<Vec<StudyCard>>> {
        let action = UsageAction::FlashcardGeneration;
        self.ensure_allowed(action).await?;
        let req = self.prepare(action, req)?;

        let generated = self.generator.flashcards(&req).await;
        let now = Utc::now();
        let cards: Vec<StudyCard> = generated
            .items
            .into_iter()
            .map(|draft| StudyCard::new(draft, &req.topic, generated.source, now))
            .collect();

        self.db.insert_cards(&cards).await?;
        self.db.increment_usage(action, now.date_naive()).await?;
        self.queue_sync(SyncPayload::CardsCreated { cards: cards.clone() }).await;

        Ok(Generated {
            source: generated.source,
            items: cards,
        })
    }

    pub async fn generate_quiz(&mut self, req: GenerationRequest) -> anyhow::Result<Generated<Vec<QuizQuestion>>> {
        let action = UsageAction::QuizGeneration;
        self.ensure_allowed(action).await?;
        let req = self.prepare(action, req)?;

        let generated = self.generator.questions(&req, &mut self.rng).await;
        self.db.increment_usage(action, Utc::now().date_naive()).await?;
        Ok(generated)
    }

    pub async fn load_due(&mut self, now: DateTime<Utc>) -> anyhow::Result<Vec<StudyCard>> {
        let due = self.db.due_cards(now).await?;
        info!("{} cards due for review", due.len());
        self.apply(SessionEvent::DueLoaded(due.clone()));
        Ok(due)
    }

    pub async fn review(&mut self, id: Uuid, quality: u8, now: DateTime<Utc>) -> anyhow::Result<StudyCard> {
        let quality = Quality::new(quality)?;
        let card = self.db.get_card(id).await?.ok_or(StudyError::CardNotFound(id))?;

        let updated = apply_review(&card, quality, now);
        self.persist_review(&updated).await?;

        self.queue_sync(SyncPayload::CardReviewed { card: updated.clone() }).await;
        self.apply(SessionEvent::CardReviewed(updated.clone()));
        Ok(updated)
    }

    async fn persist_review(&mut self, card: &StudyCard) -> anyhow::Result<()> {
        let db = &self.db;
        let result = self.store_retry.run("saving review", || db.save_card(card)).await;

        if let Err(e) = &result {
            error!("review of card {} was not saved: {}", card.id, e);
            self.notify(NoticeLevel::Error, format!("Your review could not be saved: {}", e));
        }
        result
    }

    pub async fn remove_card(&mut self, id: Uuid) -> anyhow::Result<()> {
        if !self.db.remove_card(id).await? {
            return Err(StudyError::CardNotFound(id).into());
        }

        self.queue_sync(SyncPayload::CardRemoved { card_id: id }).await;
        self.apply(SessionEvent::CardRemoved(id));
        Ok(())
    }

    pub async fn usage_report(&self) -> anyhow::Result<UsageReport> {
        let mut usage = Vec::with_capacity(UsageAction::ALL.len());
        for action in UsageAction::ALL {
            let used = self.db.usage_today(action).await?;
            usage.push(check_usage(self.plan, action, used));
        }

        Ok(UsageReport {
            plan: self.plan,
            limits: self.plan.limits(),
            usage,
        })
    }

    pub fn analyze(&self, content: &str) -> ContentAnalysis {
        ContentAnalysis {
            stats: analyze_content(content),
            validation: validate_content(content),
            keywords: extract_keywords(content, 10),
        }
    }

    pub fn dismiss_notice(&mut self, id: Uuid) -> bool {
        let known = self.session.notices.iter().any(|n| n.id == id);
        self.apply(SessionEvent::NoticeDismissed(id));
        known
    }

    /// Turns every dropped sync item into a warning for the user.
    pub fn record_sync_report(&mut self, report: FlushReport) {
        for item in report.dropped {
            warn!("giving up on sync {}", item.id);
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "Could not sync {} after {} attempts: {}",
                    item.payload.describe(),
                    item.attempts,
                    item.last_error.as_deref().unwrap_or("unknown error")
                ),
            );
        }
    }
}

/// Starts the periodic sync task and routes its reports back into the app.
pub async fn start_background_sync(
    app: Arc<Mutex<App>>,
    sink: Arc<dyn SyncSink>,
    every: Duration,
) -> anyhow::Result<JoinHandle<()>> {
    let queue = app
        .lock()
        .await
        .sync_queue()
        .ok_or_else(|| anyhow::anyhow!("sync is not enabled for this app"))?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let flusher = spawn_periodic_sync(queue, sink, every, tx);

    Ok(tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            app.lock().await.record_sync_report(report);
        }
        flusher.abort();
    }))
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
