//! In-memory store implementation, mirroring the SQLite store's
//! semantics for tests and dry runs

use async_trait::async_trait;
use postflight_domain::{
    AttemptLog, BeginOutcome, NewStrategy, Platform, PublicationLedger, PublicationRecord,
    PublicationStatus, PublishAttempt, StoreError, Strategy, StrategyStore,
};
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

/// In-memory store. State is gone when the process exits, so the
/// idempotency guarantee only covers the lifetime of one process.
#[derive(Default)]
pub struct InMemoryStore {
    strategies: Mutex<HashMap<String, Strategy>>,
    publications: Mutex<HashMap<(String, Platform), PublicationRecord>>,
    attempts: Mutex<Vec<PublishAttempt>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a strategy directly (test helper)
    pub fn insert_strategy(&self, strategy: Strategy) {
        self.strategies
            .lock()
            .unwrap()
            .insert(strategy.id.clone(), strategy);
    }
}

#[async_trait]
impl PublicationLedger for InMemoryStore {
    async fn begin(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        now: OffsetDateTime,
        lease: std::time::Duration,
    ) -> Result<BeginOutcome, StoreError> {
        let mut publications = self.publications.lock().unwrap();
        let slot = (strategy_id.to_string(), platform);

        if let Some(existing) = publications.get(&slot) {
            match existing.status {
                PublicationStatus::Completed if existing.idempotency_key == idempotency_key => {
                    return Ok(BeginOutcome::AlreadyCompleted(existing.clone()));
                }
                PublicationStatus::InProgress if now - existing.started_at < lease => {
                    return Ok(BeginOutcome::InProgress(existing.clone()));
                }
                // FAILED, stale IN_PROGRESS, or COMPLETED under a different
                // key: fall through and reclaim
                _ => {}
            }
        }

        publications.insert(
            slot,
            PublicationRecord {
                strategy_id: strategy_id.to_string(),
                platform,
                idempotency_key: idempotency_key.to_string(),
                status: PublicationStatus::InProgress,
                external_id: None,
                url: None,
                error: None,
                started_at: now,
                completed_at: None,
            },
        );
        Ok(BeginOutcome::Started)
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
        let mut publications = self.publications.lock().unwrap();
        let slot = (strategy_id.to_string(), platform);

        match publications.get_mut(&slot) {
            Some(record)
                if record.status == PublicationStatus::InProgress
                    && record.idempotency_key == idempotency_key =>
            {
                record.status = PublicationStatus::Completed;
                record.external_id = Some(external_id.to_string());
                record.url = Some(url.to_string());
                record.completed_at = Some(completed_at);
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!(
                "No in-progress publication for {}/{} with the given key",
                strategy_id, platform
            ))),
        }
    }

    async fn fail(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        error: &str,
        completed_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut publications = self.publications.lock().unwrap();
        let slot = (strategy_id.to_string(), platform);

        match publications.get_mut(&slot) {
            Some(record)
                if record.status == PublicationStatus::InProgress
                    && record.idempotency_key == idempotency_key =>
            {
                record.status = PublicationStatus::Failed;
                record.error = Some(error.to_string());
                record.completed_at = Some(completed_at);
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!(
                "No in-progress publication for {}/{} with the given key",
                strategy_id, platform
            ))),
        }
    }

    async fn get(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Option<PublicationRecord>, StoreError> {
        Ok(self
            .publications
            .lock()
            .unwrap()
            .get(&(strategy_id.to_string(), platform))
            .cloned())
    }
}

#[async_trait]
impl AttemptLog for InMemoryStore {
    async fn append(&self, attempt: &PublishAttempt) -> Result<(), StoreError> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn list(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Vec<PublishAttempt>, StoreError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.strategy_id == strategy_id && a.platform == platform)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StrategyStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Strategy>, StoreError> {
        Ok(self.strategies.lock().unwrap().get(id).cloned())
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
        self.strategies
            .lock()
            .unwrap()
            .insert(strategy.id.clone(), strategy.clone());
        Ok(strategy)
    }

    async fn mark_published(
        &self,
        id: &str,
        url: &str,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut strategies = self.strategies.lock().unwrap();
        match strategies.get_mut(id) {
            Some(strategy) => {
                strategy.is_published = true;
                strategy.published_url = Some(url.to_string());
                strategy.updated_at = now;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Strategy not found: {}", id))),
        }
    }
}
