//! Profile fetcher
//!
//! Exchanges an implicit-grant access token for the user's profile at the
//! provider's user-info endpoint. One GET, no retry.

use crate::models::ExternalProfile;
use crate::oauth::{AuthAction, OAuthError};
use crate::popup::token::AccessToken;
use crate::settings::PopauthSettings;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can turn an access token into a profile
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the profile cannot be fetched or decoded
    async fn fetch_profile(
        &self,
        action: AuthAction,
        token: &AccessToken,
    ) -> Result<ExternalProfile, OAuthError>;
}

#[derive(Clone)]
pub struct ProfileFetcher {
    client: reqwest::Client,
    settings: Arc<PopauthSettings>,
}

impl ProfileFetcher {
    #[must_use]
    pub fn new(settings: Arc<PopauthSettings>) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, settings: Arc<PopauthSettings>) -> Self {
        Self { client, settings }
    }

    /// Fetch and normalize the profile behind `token`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails before a response arrives
    /// - The provider answers with a non-success status
    /// - The body is not a user-info document for `action`
    pub async fn fetch(
        &self,
        action: AuthAction,
        token: &AccessToken,
    ) -> Result<ExternalProfile, OAuthError> {
        let endpoint = action.userinfo_endpoint(&self.settings);
        log::debug!("Fetching {action} user info from: {endpoint}");

        let response = action
            .userinfo_request(&self.client, &endpoint, token)
            .send()
            .await
            .map_err(|e| OAuthError::Network(format!("Failed to fetch {action} user info: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            OAuthError::Network(format!("Failed to read {action} user info body: {e}"))
        })?;

        let profile = action.parse_profile(&body)?;
        log::debug!("Fetched {action} profile for provider id {}", profile.id);
        Ok(profile)
    }
}

#[async_trait]
impl ProfileSource for ProfileFetcher {
    async fn fetch_profile(
        &self,
        action: AuthAction,
        token: &AccessToken,
    ) -> Result<ExternalProfile, OAuthError> {
        self.fetch(action, token).await
    }
}
