//! LinkedIn posting adapter
//!
//! Posts via the UGC endpoint. The author URN is taken from config when
//! set, otherwise resolved once per call from the token's userinfo.

use async_trait::async_trait;
use postflight_domain::{Platform, PlatformPublisher, PostContent, PostedContent, PublishError};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const LINKEDIN_API_BASE: &str = "https://api.linkedin.com";

/// LinkedIn publisher using the v2 UGC posts API
pub struct LinkedInPublisher {
    client: reqwest::Client,
    base_url: String,
    author_urn: Option<String>,
}

impl LinkedInPublisher {
    pub fn new(author_urn: Option<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PublishError::Transient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: LINKEDIN_API_BASE.to_string(),
            author_urn,
        })
    }

    /// Override the API base URL (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve the member URN the post is attributed to
    async fn resolve_author(&self, access_token: &SecretString) -> Result<String, PublishError> {
        if let Some(urn) = &self.author_urn {
            return Ok(urn.clone());
        }

        let response = self
            .client
            .get(format!("{}/v2/userinfo", self.base_url))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|e| PublishError::Transient(format!("userinfo request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let info: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PublishError::Transient(format!("Invalid userinfo response: {}", e)))?;

        let sub = info
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PublishError::Rejected("userinfo response missing sub".to_string()))?;

        Ok(format!("urn:li:person:{}", sub))
    }
}

#[async_trait]
impl PlatformPublisher for LinkedInPublisher {
    #[instrument(skip(self, content, access_token), fields(platform = "linkedin"))]
    async fn post(
        &self,
        content: &PostContent,
        access_token: &SecretString,
    ) -> Result<PostedContent, PublishError> {
        let author = self.resolve_author(access_token).await?;

        let mut share_content = json!({
            "shareCommentary": { "text": content.text },
            "shareMediaCategory": "NONE",
        });
        if let Some(image_url) = &content.image_url {
            share_content["shareMediaCategory"] = json!("ARTICLE");
            share_content["media"] = json!([{
                "status": "READY",
                "originalUrl": image_url,
            }]);
        }

        let payload = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
        });

        let response = self
            .client
            .post(format!("{}/v2/ugcPosts", self.base_url))
            .bearer_auth(access_token.expose_secret())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Transient(format!("ugcPosts request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PublishError::Transient(format!("Invalid ugcPosts response: {}", e)))?;

        let external_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PublishError::Rejected("ugcPosts response missing id".to_string()))?
            .to_string();

        let url = format!("https://www.linkedin.com/feed/update/{}", external_id);
        debug!(external_id = %external_id, "Posted to LinkedIn");

        Ok(PostedContent { external_id, url })
    }

    fn platform(&self) -> Platform {
        Platform::Linkedin
    }
}

fn map_status(status: StatusCode, body: &str) -> PublishError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED => {
            PublishError::AuthExpired(format!("LinkedIn returned 401: {}", snippet))
        }
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        s if s.is_client_error() => {
            PublishError::Rejected(format!("LinkedIn returned {}: {}", s.as_u16(), snippet))
        }
        s => PublishError::Transient(format!("LinkedIn returned {}: {}", s.as_u16(), snippet)),
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
    async fn test_post_with_configured_author() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(body_partial_json(json!({
                "author": "urn:li:person:abc",
                "lifecycleState": "PUBLISHED",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "urn:li:share:123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(Some("urn:li:person:abc".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let posted = publisher.post(&content("hello"), &token()).await.unwrap();
        assert_eq!(posted.external_id, "urn:li:share:123");
        assert_eq!(
            posted.url,
            "https://www.linkedin.com/feed/update/urn:li:share:123"
        );
    }

    #[tokio::test]
    async fn test_post_resolves_author_from_userinfo() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "xyz" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(body_partial_json(json!({ "author": "urn:li:person:xyz" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "urn:li:share:9" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(None)
            .unwrap()
            .with_base_url(server.uri());

        let posted = publisher.post(&content("hello"), &token()).await.unwrap();
        assert_eq!(posted.external_id, "urn:li:share:9");
    }

    #[tokio::test]
    async fn test_image_url_becomes_article_media() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(body_partial_json(json!({
                "specificContent": {
                    "com.linkedin.ugc.ShareContent": {
                        "shareMediaCategory": "ARTICLE",
                        "media": [{ "originalUrl": "https://img.example/a.png" }],
                    }
                }
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "urn:li:share:7" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(Some("urn:li:person:abc".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let posted = publisher
            .post(
                &PostContent {
                    text: "with image".to_string(),
                    image_url: Some("https://img.example/a.png".to_string()),
                },
                &token(),
            )
            .await
            .unwrap();
        assert_eq!(posted.external_id, "urn:li:share:7");
    }

    #[tokio::test]
    async fn test_401_maps_to_auth_expired() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(Some("urn:li:person:abc".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::AuthExpired(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_429_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(Some("urn:li:person:abc".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::RateLimited));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_5xx_maps_to_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let publisher = LinkedInPublisher::new(Some("urn:li:person:abc".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let err = publisher
            .post(&content("hello"), &token())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transient(_)));
        assert!(err.is_retryable());
    }
}
