//! Provider-specific OAuth logic
//!
//! Each supported identity provider is a variant of [`AuthAction`]. The
//! variant carries everything that differs between providers: where the
//! authorization dialog lives, which scopes are requested and how they are
//! joined, how the user-info endpoint is authenticated, and how its JSON is
//! mapped onto [`ExternalProfile`]. Adding a provider means adding a variant,
//! and the compiler points at every strategy that needs a new arm.

use crate::models::ExternalProfile;
use crate::oauth::OAuthError;
use crate::popup::token::AccessToken;
use crate::settings::{PopauthSettings, ProviderSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Identity provider selected for one handshake attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthAction {
    Google,
    Facebook,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    name: String,
    email: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct FacebookUserInfo {
    id: String,
    name: String,
    email: Option<String>,
}

impl AuthAction {
    pub const ALL: [AuthAction; 2] = [AuthAction::Google, AuthAction::Facebook];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AuthAction::Google => "google",
            AuthAction::Facebook => "facebook",
        }
    }

    /// Field name the backend expects for the provider-scoped user id
    #[must_use]
    pub fn provider_id_field(self) -> &'static str {
        match self {
            AuthAction::Google => "googleId",
            AuthAction::Facebook => "facebookId",
        }
    }

    /// Configured overrides for this provider
    #[must_use]
    pub fn settings(self, settings: &PopauthSettings) -> &ProviderSettings {
        match self {
            AuthAction::Google => &settings.providers.google,
            AuthAction::Facebook => &settings.providers.facebook,
        }
    }

    fn default_authorization_endpoint(self) -> &'static str {
        match self {
            AuthAction::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            AuthAction::Facebook => "https://www.facebook.com/v11.0/dialog/oauth",
        }
    }

    fn default_userinfo_endpoint(self) -> &'static str {
        match self {
            AuthAction::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            AuthAction::Facebook => "https://graph.facebook.com/me",
        }
    }

    fn default_scopes(self) -> &'static [&'static str] {
        match self {
            AuthAction::Google => &[
                "https://www.googleapis.com/auth/userinfo.profile",
                "https://www.googleapis.com/auth/userinfo.email",
            ],
            AuthAction::Facebook => &["email", "public_profile"],
        }
    }

    /// Environment variable consulted for the client id when none is configured
    #[must_use]
    pub fn default_client_id_env(self) -> &'static str {
        match self {
            AuthAction::Google => "GOOGLE_CLIENT_ID",
            AuthAction::Facebook => "FACEBOOK_APP_ID",
        }
    }

    fn scope_separator(self) -> &'static str {
        match self {
            AuthAction::Google => " ",
            AuthAction::Facebook => ",",
        }
    }

    fn extra_auth_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            AuthAction::Google => &[("prompt", "select_account")],
            AuthAction::Facebook => &[],
        }
    }

    /// Scopes joined the way the provider expects them
    #[must_use]
    pub fn scope(self, settings: &PopauthSettings) -> String {
        match &self.settings(settings).scopes {
            Some(scopes) => scopes.join(self.scope_separator()),
            None => self.default_scopes().join(self.scope_separator()),
        }
    }

    #[must_use]
    pub fn userinfo_endpoint(self, settings: &PopauthSettings) -> String {
        self.settings(settings)
            .userinfo_endpoint
            .clone()
            .unwrap_or_else(|| self.default_userinfo_endpoint().to_string())
    }

    /// Build the implicit-grant authorization URL for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No client id is configured for the provider
    /// - The configured authorization endpoint is not a valid URL
    pub fn authorization_url(self, settings: &PopauthSettings) -> Result<Url, OAuthError> {
        let provider_settings = self.settings(settings);
        let client_id = provider_settings
            .get_client_id(self.default_client_id_env())
            .ok_or_else(|| {
                OAuthError::Configuration(format!("Client ID not configured for provider {self}"))
            })?;

        let endpoint = provider_settings
            .authorization_endpoint
            .as_deref()
            .unwrap_or(self.default_authorization_endpoint());
        let mut url = Url::parse(endpoint).map_err(|e| {
            OAuthError::Configuration(format!("Invalid authorization endpoint for {self}: {e}"))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &client_id)
            .append_pair("redirect_uri", &settings.application.redirect_url)
            .append_pair("response_type", "token")
            .append_pair("scope", &self.scope(settings));

        for (key, value) in self.extra_auth_params() {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url)
    }

    /// Build the user-info request, authenticated the way the provider expects
    #[must_use]
    pub fn userinfo_request(
        self,
        client: &reqwest::Client,
        endpoint: &str,
        token: &AccessToken,
    ) -> reqwest::RequestBuilder {
        match self {
            AuthAction::Google => client.get(endpoint).bearer_auth(token.secret()),
            AuthAction::Facebook => client.get(endpoint).query(&[
                ("access_token", token.secret()),
                ("fields", "id,name,email"),
            ]),
        }
    }

    /// Map a user-info body onto the normalized profile
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or misses `id` or `name`
    pub fn parse_profile(self, body: &[u8]) -> Result<ExternalProfile, OAuthError> {
        let invalid = |e: serde_json::Error| {
            OAuthError::InvalidResponse(format!("Failed to parse {self} user info: {e}"))
        };

        match self {
            AuthAction::Google => {
                let info: GoogleUserInfo = serde_json::from_slice(body).map_err(invalid)?;
                Ok(ExternalProfile {
                    name: info.name,
                    id: info.id,
                    email: info.email,
                    photo_url: info.picture,
                })
            }
            AuthAction::Facebook => {
                let info: FacebookUserInfo = serde_json::from_slice(body).map_err(invalid)?;
                Ok(ExternalProfile {
                    name: info.name,
                    id: info.id,
                    email: info.email,
                    photo_url: None,
                })
            }
        }
    }
}

impl fmt::Display for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuthAction {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthAction::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OAuthError::Configuration(format!("Unsupported provider: {s}")))
    }
}
