//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Target platform for a publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    /// X, formerly Twitter. `"x"` is accepted on the wire as an alias.
    #[serde(alias = "x")]
    Twitter,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Linkedin, Platform::Twitter];

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
        }
    }

    /// Uppercase segment used inside idempotency keys
    pub fn key_segment(&self) -> &'static str {
        match self {
            Platform::Linkedin => "LINKEDIN",
            Platform::Twitter => "TWITTER",
        }
    }

    /// Platform-imposed content length limit in characters
    pub fn max_chars(&self) -> usize {
        match self {
            Platform::Linkedin => 3000,
            Platform::Twitter => 280,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!("Unsupported platform: {}", other)),
        }
    }
}

/// A unit of content to publish. Owned by the generation subsystem;
/// this crate only reads it and marks it published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: String,
    pub content: String,
    pub platform: Platform,
    /// Owning user
    pub author_id: String,
    pub title: Option<String>,
    pub is_published: bool,
    pub published_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields for creating a strategy inline at the distribute boundary
#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub content: String,
    pub platform: Platform,
    pub author_id: String,
    pub title: Option<String>,
}

/// State of a publication ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    InProgress,
    Completed,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::InProgress => "IN_PROGRESS",
            PublicationStatus::Completed => "COMPLETED",
            PublicationStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(PublicationStatus::InProgress),
            "COMPLETED" => Ok(PublicationStatus::Completed),
            "FAILED" => Ok(PublicationStatus::Failed),
            other => Err(format!("Unknown publication status: {}", other)),
        }
    }
}

/// One publication ledger row: the outcome of publishing one strategy to
/// one platform. Exactly one row exists per (strategy, platform).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub strategy_id: String,
    pub platform: Platform,
    pub idempotency_key: String,
    pub status: PublicationStatus,
    /// Platform-assigned post id, set on COMPLETED
    pub external_id: Option<String>,
    /// Canonical permalink, set on COMPLETED
    pub url: Option<String>,
    /// Last adapter error, set on FAILED
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Outcome recorded for one attempt log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Started,
    AlreadyPublished,
    InProgressConflict,
    Completed,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Started => "started",
            AttemptOutcome::AlreadyPublished => "already_published",
            AttemptOutcome::InProgressConflict => "in_progress_conflict",
            AttemptOutcome::Completed => "completed",
            AttemptOutcome::Failed => "failed",
        }
    }
}

impl std::str::FromStr for AttemptOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(AttemptOutcome::Started),
            "already_published" => Ok(AttemptOutcome::AlreadyPublished),
            "in_progress_conflict" => Ok(AttemptOutcome::InProgressConflict),
            "completed" => Ok(AttemptOutcome::Completed),
            "failed" => Ok(AttemptOutcome::Failed),
            other => Err(format!("Unknown attempt outcome: {}", other)),
        }
    }
}

/// Append-only audit row, one at the start and one at the end of every
/// engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAttempt {
    pub id: Uuid,
    pub strategy_id: String,
    pub platform: Platform,
    pub idempotency_key: String,
    /// Correlates the start and end rows of one invocation
    pub request_id: Uuid,
    pub outcome: AttemptOutcome,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Input to the publish engine
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub strategy_id: String,
    pub platform: Platform,
    /// Acting user; must own the strategy
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    /// Derived from (strategy, platform, content) when absent
    pub idempotency_key: Option<String>,
}

/// Content handed to a platform adapter
#[derive(Debug, Clone)]
pub struct PostContent {
    pub text: String,
    pub image_url: Option<String>,
}

/// What a platform adapter returns on success
#[derive(Debug, Clone)]
pub struct PostedContent {
    /// Platform-assigned post id
    pub external_id: String,
    /// Canonical permalink
    pub url: String,
}

/// Result of one engine invocation. Conflict and replay are expected
/// control paths, not errors, so all four live in one enum.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    /// A new attempt ran and succeeded
    Completed { external_id: String, url: String },
    /// A completed publication already exists for this intent; the stored
    /// result is returned without calling the platform again
    AlreadyPublished {
        external_id: String,
        url: Option<String>,
    },
    /// Another attempt holds the IN_PROGRESS slot; retry shortly
    InProgress,
    /// The adapter call failed; the ledger row is FAILED and a retry with
    /// the same idempotency key is allowed
    Failed { error: crate::ports::PublishError },
}
