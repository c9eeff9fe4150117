//! X (Twitter) posting adapter using the v2 API

use async_trait::async_trait;
use postflight_domain::{Platform, PlatformPublisher, PostContent, PostedContent, PublishError};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const X_API_BASE: &str = "https://api.x.com";

/// X publisher posting via `POST /2/tweets`.
///
/// The v2 create-tweet endpoint takes text only; an image URL is appended
/// to the text, since media upload requires the separate chunked upload
/// API.
pub struct XPublisher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl XPublisher {
    pub fn new() -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PublishError::Transient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: X_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PlatformPublisher for XPublisher {
    #[instrument(skip(self, content, access_token), fields(platform = "twitter"))]
    async fn post(
        &self,
        content: &PostContent,
        access_token: &SecretString,
    ) -> Result<PostedContent, PublishError> {
        let text = match &content.image_url {
            Some(image_url) => format!("{}\n{}", content.text, image_url),
            None => content.text.clone(),
        };

        let response = self
            .client
            .post(format!("{}/2/tweets", self.base_url))
            .bearer_auth(access_token.expose_secret())
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PublishError::Transient(format!("Tweet request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let tweet: TweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Transient(format!("Invalid tweet response: {}", e)))?;

        let external_id = tweet.data.id;
        let url = format!("https://x.com/i/status/{}", external_id);
        debug!(external_id = %external_id, "Posted to X");

        Ok(PostedContent { external_id, url })
    }

    fn platform(&self) -> Platform {
        Platform::Twitter
    }
}

fn map_status(status: StatusCode, body: &str) -> PublishError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED => {
            PublishError::AuthExpired(format!("X returned 401: {}", snippet))
        }
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        s if s.is_client_error() => {
            PublishError::Rejected(format!("X returned {}: {}", s.as_u16(), snippet))
        }
        s => PublishError::Transient(format!("X returned {}: {}", s.as_u16(), snippet)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> SecretString {
        SecretString::new("test-token".into())
    }

    fn content(text: &str) -> PostContent {
        PostContent {
            text: text.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_post_returns_id_and_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({ "text": "hello world" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "1234567890" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = XPublisher::new().unwrap().with_base_url(server.uri());

        let posted = publisher
            .post(&content("hello world"), &token())
            .await
            .unwrap();
        assert_eq!(posted.external_id, "1234567890");
        assert_eq!(posted.url, "https://x.com/i/status/1234567890");
    }

    #[tokio::test]
    async fn test_image_url_is_appended_to_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_partial_json(
                json!({ "text": "look\nhttps://img.example/a.png" }),
            ))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "1" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = XPublisher::new().unwrap().with_base_url(server.uri());

        publisher
            .post(
                &PostContent {
                    text: "look".to_string(),
                    image_url: Some("https://img.example/a.png".to_string()),
                },
                &token(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_403_maps_to_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_string("duplicate content"))
            .mount(&server)
            .await;

        let publisher = XPublisher::new().unwrap().with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_401_maps_to_auth_expired() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let publisher = XPublisher::new().unwrap().with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::AuthExpired(_)));
    }

    #[tokio::test]
    async fn test_500_maps_to_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let publisher = XPublisher::new().unwrap().with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transient(_)));
    }
}
