use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::{GenerationSource, StudyCard, INITIAL_EASE_FACTOR, INITIAL_INTERVAL};
use crate::srs::select_due;
use crate::usage::UsageAction;

impl<'r> sqlx::FromRow<'r, SqliteRow> for StudyCard {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let id = Uuid::parse_str(&id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "id".to_string(),
            source: Box::new(e),
        })?;
        let source: String = row.try_get("source")?;

        let interval: i64 = row.try_get("interval").unwrap_or(INITIAL_INTERVAL as i64);
        let ease_factor: f64 = row.try_get("ease_factor").unwrap_or(INITIAL_EASE_FACTOR);
        let review_count: i64 = row.try_get("review_count").unwrap_or(0);

        Ok(StudyCard {
            id,
            topic: row.try_get("topic")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
            source: GenerationSource::parse(&source),
            interval: interval.max(1) as u32,
            ease_factor,
            next_review_date: row.try_get("next_review_date")?,
            review_count: review_count.max(0) as u32,
            last_reviewed: row.try_get("last_reviewed")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .log_statements(log::LevelFilter::Trace);

        let in_memory = url.contains(":memory:");
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to an in-memory database sees its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL DEFAULT '',
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'template',
                interval INTEGER NOT NULL DEFAULT 1,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                next_review_date DATETIME NOT NULL,
                review_count INTEGER NOT NULL DEFAULT 0,
                last_reviewed DATETIME,
                created_at DATETIME NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage (
                action TEXT NOT NULL,
                day TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (action, day)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_cards(&self, cards: &[StudyCard]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for card in cards {
            sqlx::query(
                "INSERT INTO cards (id, topic, question, answer, source, interval, ease_factor, next_review_date, review_count, last_reviewed, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(card.id.to_string())
            .bind(&card.topic)
            .bind(&card.question)
            .bind(&card.answer)
            .bind(card.source.as_str())
            .bind(card.interval as i64)
            .bind(card.ease_factor)
            .bind(card.next_review_date)
            .bind(card.review_count as i64)
            .bind(card.last_reviewed)
            .bind(card.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_card(&self, id: Uuid) -> anyhow::Result<Option<StudyCard>> {
        let card = sqlx::query_as::<_, StudyCard>("SELECT * FROM cards WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(card)
    }

    pub async fn list_cards(&self) -> anyhow::Result<Vec<StudyCard>> {
        let cards = sqlx::query_as::<_, StudyCard>("SELECT * FROM cards ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(cards)
    }

    pub async fn due_cards(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<StudyCard>> {
        let cards = self.list_cards().await?;
        Ok(select_due(&cards, now).into_iter().cloned().collect())
    }

    /// Writes back the scheduling fields of a reviewed card.
    pub async fn save_card(&self, card: &StudyCard) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE cards SET interval = ?, ease_factor = ?, next_review_date = ?, review_count = ?, last_reviewed = ? WHERE id = ?",
        )
        .bind(card.interval as i64)
        .bind(card.ease_factor)
        .bind(card.next_review_date)
        .bind(card.review_count as i64)
        .bind(card.last_reviewed)
        .bind(card.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("card {} no longer exists", card.id);
        }
        Ok(())
    }

    pub async fn remove_card(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_cards(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM cards")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn usage_on(&self, action: UsageAction, day: NaiveDate) -> anyhow::Result<u32> {
        let count: Option<i64> = sqlx::query_scalar("SELECT count FROM usage WHERE action = ? AND day = ?")
            .bind(action.as_str())
            .bind(day.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.unwrap_or(0).max(0) as u32)
    }

    pub async fn usage_today(&self, action: UsageAction) -> anyhow::Result<u32> {
        self.usage_on(action, Utc::now().date_naive()).await
    }

    pub async fn increment_usage(&self, action: UsageAction, day: NaiveDate) -> anyhow::Result<u32> {
        sqlx::query(
            "INSERT INTO usage (action, day, count) VALUES (?, ?, 1) \
             ON CONFLICT(action, day) DO UPDATE SET count = count + 1",
        )
        .bind(action.as_str())
        .bind(day.to_string())
        .execute(&self.pool)
        .await?;

        self.usage_on(action, day).await
    }
}
