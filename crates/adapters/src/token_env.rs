//! Access token providers
//!
//! Token acquisition (the OAuth dance) lives outside this system; these
//! providers only hand out already-stored tokens.

use async_trait::async_trait;
use postflight_domain::{AccessTokenProvider, Platform, TokenError};
use secrecy::SecretString;
use std::collections::HashMap;

/// Resolves access tokens from environment variables, one variable per
/// platform. All users share the configured token.
pub struct EnvTokenProvider {
    env_vars: HashMap<Platform, String>,
}

impl EnvTokenProvider {
    pub fn new() -> Self {
        Self {
            env_vars: HashMap::new(),
        }
    }

    /// Set the environment variable name holding the token for a platform
    pub fn with_env_var(mut self, platform: Platform, var_name: impl Into<String>) -> Self {
        self.env_vars.insert(platform, var_name.into());
        self
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenProvider for EnvTokenProvider {
    async fn access_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<SecretString, TokenError> {
        let missing = || TokenError::Missing {
            user_id: user_id.to_string(),
            platform,
        };

        let var_name = self.env_vars.get(&platform).ok_or_else(missing)?;
        let value = std::env::var(var_name).map_err(|_| missing())?;
        if value.is_empty() {
            return Err(missing());
        }
        Ok(SecretString::new(value.into()))
    }
}

/// Fixed-token provider for tests
pub struct StaticTokenProvider {
    tokens: HashMap<Platform, SecretString>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, platform: Platform, token: impl Into<String>) -> Self {
        self.tokens
            .insert(platform, SecretString::new(token.into().into()));
        self
    }
}

impl Default for StaticTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<SecretString, TokenError> {
        self.tokens
            .get(&platform)
            .cloned()
            .ok_or_else(|| TokenError::Missing {
                user_id: user_id.to_string(),
                platform,
            })
    }
}
