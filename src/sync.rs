//! Best-effort background push of local changes to a remote store.
//!
//! Items are delivered at least once, retried with exponential backoff and
//! dropped once the attempt budget is spent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::StudyCard;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncPayload {
    CardsCreated { cards: Vec<StudyCard> },
    CardReviewed { card: StudyCard },
    CardRemoved { card_id: Uuid },
}

impl SyncPayload {
    pub fn describe(&self) -> String {
        match self {
            SyncPayload::CardsCreated { cards } => format!("upload of {} new cards", cards.len()),
            SyncPayload::CardReviewed { card } => format!("review of card {}", card.id),
            SyncPayload::CardRemoved { card_id } => format!("removal of card {}", card_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSync {
    pub id: Uuid,
    pub payload: SyncPayload,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct FlushReport {
    pub delivered: usize,
    pub deferred: usize,
    pub dropped: Vec<PendingSync>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.deferred == 0 && self.dropped.is_empty()
    }
}

/// Pending items kept before the oldest ones are discarded.
pub const DEFAULT_CAPACITY: usize = 500;

pub struct SyncQueue {
    items: Vec<PendingSync>,
    policy: RetryPolicy,
    capacity: usize,
}

impl SyncQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_capacity(policy, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(policy: RetryPolicy, capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            policy,
            capacity: capacity.max(1),
        }
    }

    pub fn enqueue(&mut self, payload: SyncPayload) -> Uuid {
        self.enqueue_at(payload, Utc::now())
    }

    pub fn enqueue_at(&mut self, payload: SyncPayload, now: DateTime<Utc>) -> Uuid {
        if self.items.len() >= self.capacity {
            let oldest = self.items.remove(0);
            warn!("sync queue full, discarding {}", oldest.payload.describe());
        }

        let id = Uuid::new_v4();
        debug!("queued {} for sync", payload.describe());
        self.items.push(PendingSync {
            id,
            payload,
            created_at: now,
            attempts: 0,
            next_attempt_at: now,
            last_error: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PendingSync] {
        &self.items
    }

    /// Copies of the items whose backoff has elapsed. They stay queued
    /// until [`SyncQueue::settle`] records an outcome.
    pub fn ready(&self, now: DateTime<Utc>) -> Vec<PendingSync> {
        self.items.iter().filter(|i| i.next_attempt_at <= now).cloned().collect()
    }

    /// Records the outcome of one delivery attempt.
    pub fn settle(&mut self, id: Uuid, result: anyhow::Result<()>, now: DateTime<Utc>, report: &mut FlushReport) {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return;
        };

        match result {
            Ok(()) => {
                self.items.remove(pos);
                report.delivered += 1;
            }
            Err(e) => {
                let item = &mut self.items[pos];
                item.attempts += 1;
                item.last_error = Some(e.to_string());

                if self.policy.exhausted(item.attempts) {
                    warn!(
                        "dropping {} after {} attempts: {}",
                        item.payload.describe(),
                        item.attempts,
                        e
                    );
                    report.dropped.push(self.items.remove(pos));
                } else {
                    let delay = self.policy.delay_for(item.attempts);
                    item.next_attempt_at = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                    debug!("sync of {} failed, next attempt at {}", item.payload.describe(), item.next_attempt_at);
                    report.deferred += 1;
                }
            }
        }
    }
}

#[async_trait]
pub trait SyncSink: Send + Sync {
    async fn push(&self, item: &PendingSync) -> anyhow::Result<()>;
}

/// Posts each item as JSON to a remote endpoint.
pub struct HttpSyncSink {
    url: String,
    client: reqwest::Client,
}

impl HttpSyncSink {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl SyncSink for HttpSyncSink {
    async fn push(&self, item: &PendingSync) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(item)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// One pass over the queue. The lock is released while items are in flight,
/// and an item leaves the queue only once its outcome is settled.
pub async fn flush_at(queue: &Mutex<SyncQueue>, sink: &dyn SyncSink, now: DateTime<Utc>) -> FlushReport {
    let ready = queue.lock().await.ready(now);
    let mut report = FlushReport::default();

    for item in ready {
        let result = sink.push(&item).await;
        queue.lock().await.settle(item.id, result, now, &mut report);
    }
    report
}

pub async fn flush(queue: &Mutex<SyncQueue>, sink: &dyn SyncSink) -> FlushReport {
    flush_at(queue, sink, Utc::now()).await
}

/// Flushes the queue every `every`, forwarding non-empty reports.
pub fn spawn_periodic_sync(
    queue: Arc<Mutex<SyncQueue>>,
    sink: Arc<dyn SyncSink>,
    every: Duration,
    reports: mpsc::UnboundedSender<FlushReport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let report = flush(&queue, sink.as_ref()).await;
            if report.is_empty() {
                continue;
            }
            info!(
                "sync pass: {} delivered, {} deferred, {} dropped",
                report.delivered,
                report.deferred,
                report.dropped.len()
            );
            if reports.send(report).is_err() {
                info!("sync report receiver closed, stopping background sync");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardDraft, GenerationSource};
    use crate::test_support::serve;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    struct RecordingSink {
        fail: bool,
        pushed: std::sync::Mutex<Vec<Uuid>>,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                pushed: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SyncSink for RecordingSink {
        async fn push(&self, item: &PendingSync) -> anyhow::Result<()> {
            self.pushed.lock().unwrap().push(item.id);
            if self.fail {
                anyhow::bail!("remote store unavailable");
            }
            Ok(())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(300),
        }
    }

    fn card() -> StudyCard {
        let draft = CardDraft {
            question: "What is entropy?".to_string(),
            answer: "A measure of disorder.".to_string(),
        };
        StudyCard::new(draft, "physics", GenerationSource::Template, Utc::now())
    }

    #[tokio::test]
    async fn test_flush_delivers_and_empties() {
        let queue = Mutex::new(SyncQueue::new(policy()));
        let id = queue.lock().await.enqueue(SyncPayload::CardReviewed { card: card() });
        let sink = RecordingSink::new(false);

        let report = flush(&queue, &sink).await;
        assert_eq!(report.delivered, 1);
        assert!(report.dropped.is_empty());
        assert!(queue.lock().await.is_empty());
        assert_eq!(*sink.pushed.lock().unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_failures_back_off_then_drop() {
        let now = Utc::now();
        let queue = Mutex::new(SyncQueue::new(policy()));
        queue.lock().await.enqueue_at(SyncPayload::CardRemoved { card_id: Uuid::new_v4() }, now);
        let sink = RecordingSink::new(true);

        let first = flush_at(&queue, &sink, now).await;
        assert_eq!(first.deferred, 1);
        {
            let q = queue.lock().await;
            assert_eq!(q.items()[0].attempts, 1);
            assert_eq!(q.items()[0].next_attempt_at, now + chrono::Duration::seconds(10));
            assert_eq!(q.items()[0].last_error.as_deref(), Some("remote store unavailable"));
        }

        // Still backing off: nothing is attempted.
        let early = flush_at(&queue, &sink, now + chrono::Duration::seconds(5)).await;
        assert!(early.is_empty());
        assert_eq!(sink.pushed.lock().unwrap().len(), 1);

        let t2 = now + chrono::Duration::seconds(10);
        let second = flush_at(&queue, &sink, t2).await;
        assert_eq!(second.deferred, 1);
        assert_eq!(queue.lock().await.items()[0].next_attempt_at, t2 + chrono::Duration::seconds(20));

        let third = flush_at(&queue, &sink, t2 + chrono::Duration::seconds(20)).await;
        assert_eq!(third.dropped.len(), 1);
        assert_eq!(third.dropped[0].attempts, 3);
        assert!(queue.lock().await.is_empty());
        assert_eq!(sink.pushed.lock().unwrap().len(), 3);
    }

    struct StalledSink;

    #[async_trait]
    impl SyncSink for StalledSink {
        async fn push(&self, _item: &PendingSync) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancelled_flush_keeps_items() {
        let queue = Mutex::new(SyncQueue::new(policy()));
        let id = queue.lock().await.enqueue(SyncPayload::CardReviewed { card: card() });

        let cancelled = tokio::time::timeout(Duration::from_millis(20), flush(&queue, &StalledSink)).await;
        assert!(cancelled.is_err());

        let q = queue.lock().await;
        assert_eq!(q.len(), 1);
        assert_eq!(q.items()[0].id, id);
        assert_eq!(q.items()[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_full_queue_discards_oldest() {
        let mut queue = SyncQueue::with_capacity(policy(), 2);
        let first = queue.enqueue(SyncPayload::CardRemoved { card_id: Uuid::new_v4() });
        let second = queue.enqueue(SyncPayload::CardRemoved { card_id: Uuid::new_v4() });
        let third = queue.enqueue(SyncPayload::CardRemoved { card_id: Uuid::new_v4() });

        let ids: Vec<_> = queue.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![second, third]);
        assert!(!ids.contains(&first));
    }

    #[tokio::test]
    async fn test_http_sink() {
        let router = Router::new()
            .route(
                "/ok",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["payload"]["type"], "cardRemoved");
                    StatusCode::NO_CONTENT
                }),
            )
            .route("/fail", post(|| async { StatusCode::BAD_GATEWAY }));
        let base = serve(router).await;

        let queue = Mutex::new(SyncQueue::new(policy()));
        queue.lock().await.enqueue(SyncPayload::CardRemoved { card_id: Uuid::new_v4() });
        let ok = HttpSyncSink::new(format!("{}/ok", base), Duration::from_secs(5)).unwrap();
        assert_eq!(flush(&queue, &ok).await.delivered, 1);

        queue.lock().await.enqueue(SyncPayload::CardRemoved { card_id: Uuid::new_v4() });
        let failing = HttpSyncSink::new(format!("{}/fail", base), Duration::from_secs(5)).unwrap();
        let report = flush(&queue, &failing).await;
        assert_eq!(report.deferred, 1);
        assert_eq!(queue.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_sync_reports() {
        let queue = Arc::new(Mutex::new(SyncQueue::new(policy())));
        queue.lock().await.enqueue(SyncPayload::CardsCreated { cards: vec![card()] });
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = spawn_periodic_sync(queue.clone(), Arc::new(RecordingSink::new(false)), Duration::from_millis(10), tx);
        let report = rx.recv().await.unwrap();
        assert_eq!(report.delivered, 1);
        handle.abort();
    }
}
