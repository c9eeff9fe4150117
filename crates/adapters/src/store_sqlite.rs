//! SQLite store implementation for the publication ledger, attempt log,
//! and strategies
//!
//! The ledger's claim operations are single conditional statements, so
//! mutual exclusion holds across processes sharing the database file.

use async_trait::async_trait;
use postflight_domain::{
    AttemptLog, AttemptOutcome, BeginOutcome, NewStrategy, Platform, PublicationLedger,
    PublicationRecord, PublicationStatus, PublishAttempt, StoreError, Strategy, StrategyStore,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use uuid::Uuid;

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS strategy (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                platform TEXT NOT NULL,
                author_id TEXT NOT NULL,
                title TEXT,
                is_published INTEGER NOT NULL DEFAULT 0,
                published_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        // One row per (strategy, platform); the primary key is what makes
        // concurrent claims mutually exclusive
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS strategy_publication (
                strategy_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                status TEXT NOT NULL,
                external_id TEXT,
                url TEXT,
                error TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                PRIMARY KEY (strategy_id, platform)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS publish_attempt (
                id TEXT PRIMARY KEY,
                strategy_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                request_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                error_message TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_attempt_lookup
            ON publish_attempt(strategy_id, platform)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Fetch a publication row with its raw timestamp strings, which the
    /// claim CAS in `begin` compares byte-for-byte
    async fn fetch_publication_raw(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Option<PublicationRow>, StoreError> {
        let row: Option<(
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT strategy_id, platform, idempotency_key, status,
                   external_id, url, error, started_at, completed_at
            FROM strategy_publication
            WHERE strategy_id = ? AND platform = ?
            "#,
        )
        .bind(strategy_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((
                strategy_id,
                platform,
                idempotency_key,
                status,
                external_id,
                url,
                error,
                started_at,
                completed_at,
            )) => Ok(Some(PublicationRow {
                strategy_id,
                platform,
                idempotency_key,
                status,
                external_id,
                url,
                error,
                started_at,
                completed_at,
            })),
            None => Ok(None),
        }
    }
}

/// Raw publication row as stored
struct PublicationRow {
    strategy_id: String,
    platform: String,
    idempotency_key: String,
    status: String,
    external_id: Option<String>,
    url: Option<String>,
    error: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl PublicationRow {
    fn into_record(self) -> Result<PublicationRecord, StoreError> {
        Ok(PublicationRecord {
            strategy_id: self.strategy_id,
            platform: parse_platform(&self.platform)?,
            idempotency_key: self.idempotency_key,
            status: self
                .status
                .parse::<PublicationStatus>()
                .map_err(StoreError::Serialization)?,
            external_id: self.external_id,
            url: self.url,
            error: self.error,
            started_at: parse_ts(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

fn fmt_ts(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_ts(s: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_platform(s: &str) -> Result<Platform, StoreError> {
    s.parse::<Platform>().map_err(StoreError::Serialization)
}

#[async_trait]
impl PublicationLedger for SqliteStore {
    async fn begin(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        now: OffsetDateTime,
        lease: std::time::Duration,
    ) -> Result<BeginOutcome, StoreError> {
        let now_str = fmt_ts(now)?;

        // A lost claim race re-inspects once before giving up
        for _ in 0..2 {
            let inserted = sqlx::query(
                r#"
                INSERT INTO strategy_publication
                (strategy_id, platform, idempotency_key, status, started_at)
                VALUES (?, ?, ?, 'IN_PROGRESS', ?)
                ON CONFLICT(strategy_id, platform) DO NOTHING
                "#,
            )
            .bind(strategy_id)
            .bind(platform.as_str())
            .bind(idempotency_key)
            .bind(&now_str)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if inserted.rows_affected() == 1 {
                return Ok(BeginOutcome::Started);
            }

            // Row exists; inspect it. Rows are never deleted, so a miss
            // here means a racing insert we can retry against.
            let Some(row) = self.fetch_publication_raw(strategy_id, platform).await? else {
                continue;
            };

            let status = row
                .status
                .parse::<PublicationStatus>()
                .map_err(StoreError::Serialization)?;
            let started_at = parse_ts(&row.started_at)?;

            match status {
                PublicationStatus::Completed if row.idempotency_key == idempotency_key => {
                    return Ok(BeginOutcome::AlreadyCompleted(row.into_record()?));
                }
                PublicationStatus::InProgress if now - started_at < lease => {
                    return Ok(BeginOutcome::InProgress(row.into_record()?));
                }
                // FAILED, stale IN_PROGRESS, or COMPLETED under a
                // different key (content changed, new intent): reclaim.
                // The CAS on the observed (status, key, started_at)
                // ensures only one racer wins.
                _ => {
                    let claimed = sqlx::query(
                        r#"
                        UPDATE strategy_publication
                        SET idempotency_key = ?, status = 'IN_PROGRESS',
                            external_id = NULL, url = NULL, error = NULL,
                            started_at = ?, completed_at = NULL
                        WHERE strategy_id = ? AND platform = ?
                          AND status = ? AND idempotency_key = ? AND started_at = ?
                        "#,
                    )
                    .bind(idempotency_key)
                    .bind(&now_str)
                    .bind(strategy_id)
                    .bind(platform.as_str())
                    .bind(&row.status)
                    .bind(&row.idempotency_key)
                    .bind(&row.started_at)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Database(e.to_string()))?;

                    if claimed.rows_affected() == 1 {
                        return Ok(BeginOutcome::Started);
                    }
                    // Someone else claimed first; loop to re-inspect
                }
            }
        }

        match self.fetch_publication_raw(strategy_id, platform).await? {
            Some(row) => Ok(BeginOutcome::InProgress(row.into_record()?)),
            None => Err(StoreError::Database(
                "Publication row vanished during claim".to_string(),
            )),
        }
    }

    async fn complete(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        external_id: &str,
        url: &str,
        completed_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE strategy_publication
            SET status = 'COMPLETED', external_id = ?, url = ?, completed_at = ?
            WHERE strategy_id = ? AND platform = ?
              AND idempotency_key = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(external_id)
        .bind(url)
        .bind(fmt_ts(completed_at)?)
        .bind(strategy_id)
        .bind(platform.as_str())
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "No in-progress publication for {}/{} with the given key",
                strategy_id, platform
            )));
        }
        Ok(())
    }

    async fn fail(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        error: &str,
        completed_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE strategy_publication
            SET status = 'FAILED', error = ?, completed_at = ?
            WHERE strategy_id = ? AND platform = ?
              AND idempotency_key = ? AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(error)
        .bind(fmt_ts(completed_at)?)
        .bind(strategy_id)
        .bind(platform.as_str())
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "No in-progress publication for {}/{} with the given key",
                strategy_id, platform
            )));
        }
        Ok(())
    }

    async fn get(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Option<PublicationRecord>, StoreError> {
        self.fetch_publication_raw(strategy_id, platform)
            .await?
            .map(PublicationRow::into_record)
            .transpose()
    }
}

#[async_trait]
impl AttemptLog for SqliteStore {
    async fn append(&self, attempt: &PublishAttempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO publish_attempt
            (id, strategy_id, platform, idempotency_key, request_id,
             outcome, error_message, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.strategy_id)
        .bind(attempt.platform.as_str())
        .bind(&attempt.idempotency_key)
        .bind(attempt.request_id.to_string())
        .bind(attempt.outcome.as_str())
        .bind(&attempt.error_message)
        .bind(fmt_ts(attempt.timestamp)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Vec<PublishAttempt>, StoreError> {
        let rows: Vec<(
            String,
            String,
            String,
            String,
            String,
            String,
            Option<String>,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, strategy_id, platform, idempotency_key, request_id,
                   outcome, error_message, timestamp
            FROM publish_attempt
            WHERE strategy_id = ? AND platform = ?
            ORDER BY rowid
            "#,
        )
        .bind(strategy_id)
        .bind(platform.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(
                |(
                    id,
                    strategy_id,
                    platform,
                    idempotency_key,
                    request_id,
                    outcome,
                    error_message,
                    timestamp,
                )| {
                    Ok(PublishAttempt {
                        id: Uuid::parse_str(&id)
                            .map_err(|e| StoreError::Serialization(e.to_string()))?,
                        strategy_id,
                        platform: parse_platform(&platform)?,
                        idempotency_key,
                        request_id: Uuid::parse_str(&request_id)
                            .map_err(|e| StoreError::Serialization(e.to_string()))?,
                        outcome: outcome
                            .parse::<AttemptOutcome>()
                            .map_err(StoreError::Serialization)?,
                        error_message,
                        timestamp: parse_ts(&timestamp)?,
                    })
                },
            )
            .collect()
    }
}

#[async_trait]
impl StrategyStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Strategy>, StoreError> {
        let row: Option<(
            String,
            String,
            String,
            String,
            Option<String>,
            i64,
            Option<String>,
            String,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, content, platform, author_id, title,
                   is_published, published_url, created_at, updated_at
            FROM strategy
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((
                id,
                content,
                platform,
                author_id,
                title,
                is_published,
                published_url,
                created_at,
                updated_at,
            )) => Ok(Some(Strategy {
                id,
                content,
                platform: parse_platform(&platform)?,
                author_id,
                title,
                is_published: is_published != 0,
                published_url,
                created_at: parse_ts(&created_at)?,
                updated_at: parse_ts(&updated_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn create(&self, new: NewStrategy, now: OffsetDateTime) -> Result<Strategy, StoreError> {
        let strategy = Strategy {
            id: Uuid::new_v4().to_string(),
            content: new.content,
            platform: new.platform,
            author_id: new.author_id,
            title: new.title,
            is_published: false,
            published_url: None,
            created_at: now,
            updated_at: now,
        };

        let ts = fmt_ts(now)?;
        sqlx::query(
            r#"
            INSERT INTO strategy
            (id, content, platform, author_id, title, is_published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&strategy.id)
        .bind(&strategy.content)
        .bind(strategy.platform.as_str())
        .bind(&strategy.author_id)
        .bind(&strategy.title)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(strategy)
    }

    async fn mark_published(
        &self,
        id: &str,
        url: &str,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE strategy
            SET is_published = 1, published_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(url)
        .bind(fmt_ts(now)?)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Strategy not found: {}", id)));
        }
        Ok(())
    }
}
