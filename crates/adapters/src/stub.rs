//! Deterministic in-process publisher for dry runs and tests

use async_trait::async_trait;
use postflight_domain::{Platform, PlatformPublisher, PostContent, PostedContent, PublishError};
use secrecy::SecretString;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Publisher that posts nowhere. Assigns sequential ids so ledger and
/// attempt-log behavior can be exercised without platform credentials.
pub struct StubPublisher {
    platform: Platform,
    counter: AtomicU64,
    fail_with: Option<PublishError>,
}

impl StubPublisher {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            counter: AtomicU64::new(0),
            fail_with: None,
        }
    }

    /// Make every `post` call fail with the given error (test helper)
    pub fn failing(platform: Platform, error: PublishError) -> Self {
        Self {
            platform,
            counter: AtomicU64::new(0),
            fail_with: Some(error),
        }
    }

    /// Number of `post` calls made so far
    pub fn calls(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformPublisher for StubPublisher {
    async fn post(
        &self,
        content: &PostContent,
        _access_token: &SecretString,
    ) -> Result<PostedContent, PublishError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        info!(
            platform = %self.platform,
            chars = content.text.chars().count(),
            "Stub publish (no platform call made)"
        );

        let external_id = format!("stub-{}-{}", self.platform.as_str(), n);
        let url = format!("https://stub.invalid/{}/{}", self.platform.as_str(), n);
        Ok(PostedContent { external_id, url })
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}
