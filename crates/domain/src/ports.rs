//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external
//! systems. Adapters implement them to connect to real infrastructure.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    NewStrategy, Platform, PostContent, PostedContent, PublicationRecord, PublishAttempt, Strategy,
};

/// Error type for store operations (ledger, attempt log, strategies)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result of attempting to claim the publication slot for a
/// (strategy, platform, idempotency key) tuple
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// The slot was claimed; the caller now owns the IN_PROGRESS row and
    /// must finalize it via `complete` or `fail`
    Started,
    /// A COMPLETED row with the same idempotency key already exists
    AlreadyCompleted(PublicationRecord),
    /// Another attempt currently holds the IN_PROGRESS slot
    InProgress(PublicationRecord),
}

/// Port for the publication ledger: the durable source of truth for
/// "has this already been published".
///
/// `begin` is the system's only mutual-exclusion primitive. It must be
/// atomic at the storage layer (unique-constraint insert or conditional
/// update), because concurrent requests may run in different processes.
///
/// Known gap: if the process dies after the platform accepted the post but
/// before `complete` runs, the row stays IN_PROGRESS until the lease
/// expires, and the eventual retry may post a duplicate. Neither target
/// platform offers a client-supplied dedup token to close this window.
#[async_trait]
pub trait PublicationLedger: Send + Sync {
    /// Atomically claim the (strategy, platform) slot for a new attempt.
    ///
    /// Semantics per existing row:
    /// - none: insert IN_PROGRESS, return `Started`
    /// - COMPLETED, same key: return `AlreadyCompleted`
    /// - COMPLETED, different key: the request is a new publish intent
    ///   (content changed); reclaim the row under the new key
    /// - FAILED: reclaim under the given key (failure is retryable)
    /// - IN_PROGRESS within `lease`: return `InProgress`
    /// - IN_PROGRESS older than `lease`: reclaim (stale claim from a dead
    ///   process)
    async fn begin(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        now: OffsetDateTime,
        lease: std::time::Duration,
    ) -> Result<BeginOutcome, StoreError>;

    /// Finalize an owned IN_PROGRESS row to COMPLETED
    async fn complete(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        external_id: &str,
        url: &str,
        completed_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Finalize an owned IN_PROGRESS row to FAILED
    async fn fail(
        &self,
        strategy_id: &str,
        platform: Platform,
        idempotency_key: &str,
        error: &str,
        completed_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Get the ledger row for a (strategy, platform), if any
    async fn get(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Option<PublicationRecord>, StoreError>;
}

/// Port for the append-only attempt log
#[async_trait]
pub trait AttemptLog: Send + Sync {
    /// Append one attempt row; rows are never updated or deleted
    async fn append(&self, attempt: &PublishAttempt) -> Result<(), StoreError>;

    /// List attempts for a (strategy, platform) in insertion order
    async fn list(
        &self,
        strategy_id: &str,
        platform: Platform,
    ) -> Result<Vec<PublishAttempt>, StoreError>;
}

/// Port for reading and updating strategies
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Strategy>, StoreError>;

    /// Create a strategy inline (used by the distribute boundary when no
    /// strategy id is supplied)
    async fn create(&self, new: NewStrategy, now: OffsetDateTime) -> Result<Strategy, StoreError>;

    /// Record a successful publication on the strategy itself. Written
    /// only by the publish engine after a COMPLETED transition.
    async fn mark_published(
        &self,
        id: &str,
        url: &str,
        now: OffsetDateTime,
    ) -> Result<(), StoreError>;
}

/// Error type for platform publisher operations
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// Network failure, timeout, or platform-side 5xx; safe to retry
    #[error("Transient platform error: {0}")]
    Transient(String),
    /// Platform rate limit; safe to retry later
    #[error("Rate limited")]
    RateLimited,
    /// Access token missing, invalid, or expired; the user must
    /// re-authenticate before retrying
    #[error("Authentication expired: {0}")]
    AuthExpired(String),
    /// Platform refused the content; retrying without changes will not help
    #[error("Platform rejected content: {0}")]
    Rejected(String),
}

impl PublishError {
    /// Whether re-invoking with the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Transient(_) | PublishError::RateLimited)
    }

    /// Stable machine-readable code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            PublishError::Transient(_) => "TRANSIENT",
            PublishError::RateLimited => "RATE_LIMITED",
            PublishError::AuthExpired(_) => "AUTH_EXPIRED",
            PublishError::Rejected(_) => "REJECTED",
        }
    }
}

/// Port for posting content to one external platform.
///
/// Implementations make exactly one call to the platform's posting
/// endpoint per invocation; the engine's ledger guarantees the invocation
/// itself happens at most once per successful publish.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    async fn post(
        &self,
        content: &PostContent,
        access_token: &SecretString,
    ) -> Result<PostedContent, PublishError>;

    fn platform(&self) -> Platform;
}

/// Error type for access token resolution
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No access token available for {platform} (user {user_id})")]
    Missing { user_id: String, platform: Platform },
}

/// Port for resolving a user's access token for a platform. Token
/// acquisition (the OAuth handshake) belongs to an external auth
/// subsystem; this port only hands out stored tokens.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<SecretString, TokenError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
