//! Publish engine - the sole entry point that mutates publication state
//!
//! Orchestrates one publish invocation: attempt-log start row, atomic
//! ledger claim, platform adapter call under a timeout, ledger and
//! strategy finalization, attempt-log end row.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::model::{
    AttemptOutcome, Platform, PostContent, PublishAttempt, PublishOutcome, PublishRequest,
};
use crate::ports::{
    AccessTokenProvider, AttemptLog, BeginOutcome, Clock, PlatformPublisher, PublicationLedger,
    PublishError, StoreError, StrategyStore,
};

/// Configuration for the publish engine
#[derive(Debug, Clone)]
pub struct PublishEngineConfig {
    /// Upper bound on one platform adapter call. On expiry the ledger row
    /// is still moved out of IN_PROGRESS; an orphaned row would block the
    /// tuple forever.
    pub adapter_timeout: Duration,
    /// Age after which an IN_PROGRESS claim from a dead process may be
    /// taken over by a new attempt
    pub in_progress_lease: Duration,
}

impl Default for PublishEngineConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(30),
            in_progress_lease: Duration::from_secs(120),
        }
    }
}

/// Platform adapters keyed by the `platform` field of the request
#[derive(Clone)]
pub struct PublisherSet {
    linkedin: Arc<dyn PlatformPublisher>,
    twitter: Arc<dyn PlatformPublisher>,
}

impl PublisherSet {
    pub fn new(linkedin: Arc<dyn PlatformPublisher>, twitter: Arc<dyn PlatformPublisher>) -> Self {
        Self { linkedin, twitter }
    }

    fn for_platform(&self, platform: Platform) -> &Arc<dyn PlatformPublisher> {
        match platform {
            Platform::Linkedin => &self.linkedin,
            Platform::Twitter => &self.twitter,
        }
    }
}

/// Errors for conditions the caller cannot express as an outcome:
/// bad references and store-layer failures. Expected publish results
/// (conflict, replay, adapter failure) are `PublishOutcome` variants.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),
    #[error("Strategy {strategy_id} is not owned by user {user_id}")]
    NotOwner {
        strategy_id: String,
        user_id: String,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Publish engine orchestrator
pub struct PublishEngine<L, A, S, T, C>
where
    L: PublicationLedger + ?Sized,
    A: AttemptLog + ?Sized,
    S: StrategyStore + ?Sized,
    T: AccessTokenProvider + ?Sized,
    C: Clock + ?Sized,
{
    ledger: Arc<L>,
    attempts: Arc<A>,
    strategies: Arc<S>,
    tokens: Arc<T>,
    clock: Arc<C>,
    publishers: PublisherSet,
    config: PublishEngineConfig,
}

impl<L, A, S, T, C> Clone for PublishEngine<L, A, S, T, C>
where
    L: PublicationLedger + ?Sized,
    A: AttemptLog + ?Sized,
    S: StrategyStore + ?Sized,
    T: AccessTokenProvider + ?Sized,
    C: Clock + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            attempts: Arc::clone(&self.attempts),
            strategies: Arc::clone(&self.strategies),
            tokens: Arc::clone(&self.tokens),
            clock: Arc::clone(&self.clock),
            publishers: self.publishers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<L, A, S, T, C> PublishEngine<L, A, S, T, C>
where
    L: PublicationLedger + ?Sized,
    A: AttemptLog + ?Sized,
    S: StrategyStore + ?Sized,
    T: AccessTokenProvider + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(
        ledger: Arc<L>,
        attempts: Arc<A>,
        strategies: Arc<S>,
        tokens: Arc<T>,
        clock: Arc<C>,
        publishers: PublisherSet,
        config: PublishEngineConfig,
    ) -> Self {
        Self {
            ledger,
            attempts,
            strategies,
            tokens,
            clock,
            publishers,
            config,
        }
    }

    /// Execute one publish invocation.
    ///
    /// Idempotent per (strategy, platform, idempotency key): replays of a
    /// completed publish return the stored result without a second
    /// platform call, and concurrent attempts for the same tuple resolve
    /// to exactly one adapter invocation.
    pub async fn execute(&self, request: PublishRequest) -> Result<PublishOutcome, EngineError> {
        let request_id = Uuid::new_v4();

        let strategy = self
            .strategies
            .get(&request.strategy_id)
            .await?
            .ok_or_else(|| EngineError::StrategyNotFound(request.strategy_id.clone()))?;

        if strategy.author_id != request.user_id {
            return Err(EngineError::NotOwner {
                strategy_id: request.strategy_id.clone(),
                user_id: request.user_id.clone(),
            });
        }

        let key = request.idempotency_key.clone().unwrap_or_else(|| {
            crate::derive_idempotency_key(&request.strategy_id, request.platform, &request.content)
        });

        tracing::info!(
            event = "publish_started",
            strategy_id = %request.strategy_id,
            platform = %request.platform,
            idempotency_key = %key,
            request_id = %request_id,
            "Starting publish attempt"
        );

        self.record_attempt(&request, &key, request_id, AttemptOutcome::Started, None)
            .await?;

        let begin = self
            .ledger
            .begin(
                &request.strategy_id,
                request.platform,
                &key,
                self.clock.now(),
                self.config.in_progress_lease,
            )
            .await?;

        match begin {
            BeginOutcome::AlreadyCompleted(record) => {
                tracing::info!(
                    strategy_id = %request.strategy_id,
                    platform = %request.platform,
                    external_id = ?record.external_id,
                    "Publish replay short-circuited"
                );
                self.record_attempt(
                    &request,
                    &key,
                    request_id,
                    AttemptOutcome::AlreadyPublished,
                    None,
                )
                .await?;
                Ok(PublishOutcome::AlreadyPublished {
                    external_id: record.external_id.unwrap_or_default(),
                    url: record.url,
                })
            }
            BeginOutcome::InProgress(_) => {
                tracing::info!(
                    strategy_id = %request.strategy_id,
                    platform = %request.platform,
                    "Concurrent publish attempt in flight"
                );
                self.record_attempt(
                    &request,
                    &key,
                    request_id,
                    AttemptOutcome::InProgressConflict,
                    None,
                )
                .await?;
                Ok(PublishOutcome::InProgress)
            }
            BeginOutcome::Started => self.run_attempt(&request, &key, request_id).await,
        }
    }

    /// Run the platform call for a claimed IN_PROGRESS row and finalize
    /// the row whatever happens
    async fn run_attempt(
        &self,
        request: &PublishRequest,
        key: &str,
        request_id: Uuid,
    ) -> Result<PublishOutcome, EngineError> {
        let result = match self
            .tokens
            .access_token(&request.user_id, request.platform)
            .await
        {
            Ok(token) => {
                let content = PostContent {
                    text: request.content.clone(),
                    image_url: request.image_url.clone(),
                };
                let publisher = self.publishers.for_platform(request.platform);

                match tokio::time::timeout(self.config.adapter_timeout, publisher.post(&content, &token))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PublishError::Transient(format!(
                        "Platform call timed out after {:?}",
                        self.config.adapter_timeout
                    ))),
                }
            }
            Err(e) => Err(PublishError::AuthExpired(e.to_string())),
        };

        match result {
            Ok(posted) => {
                let now = self.clock.now();
                self.ledger
                    .complete(
                        &request.strategy_id,
                        request.platform,
                        key,
                        &posted.external_id,
                        &posted.url,
                        now,
                    )
                    .await?;
                self.strategies
                    .mark_published(&request.strategy_id, &posted.url, now)
                    .await?;
                self.record_attempt(request, key, request_id, AttemptOutcome::Completed, None)
                    .await?;

                tracing::info!(
                    event = "publish_completed",
                    strategy_id = %request.strategy_id,
                    platform = %request.platform,
                    external_id = %posted.external_id,
                    url = %posted.url,
                    request_id = %request_id,
                    "Published"
                );

                Ok(PublishOutcome::Completed {
                    external_id: posted.external_id,
                    url: posted.url,
                })
            }
            Err(error) => {
                let message = error.to_string();
                self.ledger
                    .fail(
                        &request.strategy_id,
                        request.platform,
                        key,
                        &message,
                        self.clock.now(),
                    )
                    .await?;
                self.record_attempt(
                    request,
                    key,
                    request_id,
                    AttemptOutcome::Failed,
                    Some(message.clone()),
                )
                .await?;

                tracing::warn!(
                    event = "publish_failed",
                    strategy_id = %request.strategy_id,
                    platform = %request.platform,
                    error_code = error.code(),
                    retryable = error.is_retryable(),
                    request_id = %request_id,
                    error = %message,
                    "Publish attempt failed"
                );

                Ok(PublishOutcome::Failed { error })
            }
        }
    }

    async fn record_attempt(
        &self,
        request: &PublishRequest,
        key: &str,
        request_id: Uuid,
        outcome: AttemptOutcome,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let attempt = PublishAttempt {
            id: Uuid::new_v4(),
            strategy_id: request.strategy_id.clone(),
            platform: request.platform,
            idempotency_key: key.to_string(),
            request_id,
            outcome,
            error_message,
            timestamp: self.clock.now(),
        };
        self.attempts.append(&attempt).await
    }
}
