//! Backend authentication API
//!
//! The application backend owns accounts. Federated logins post the
//! normalized profile; password logins and registrations post the form
//! bodies. Successful logins answer `{"user": {...}, ...}`; failures carry a
//! human-readable `message`.

use crate::models::auth::{Login, Signup};
use crate::models::{ExternalProfile, SessionRecord};
use crate::oauth::AuthAction;
use crate::settings::BackendSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Body of the federated login call
///
/// Serializes as `{name, <provider>Id, email, photoUrl}`, the id field being
/// named after the provider (`googleId`, `facebookId`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedLoginRequest {
    pub action: AuthAction,
    pub profile: ExternalProfile,
}

impl FederatedLoginRequest {
    #[must_use]
    pub fn new(action: AuthAction, profile: ExternalProfile) -> Self {
        Self { action, profile }
    }
}

impl Serialize for FederatedLoginRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("name", &self.profile.name)?;
        map.serialize_entry(self.action.provider_id_field(), &self.profile.id)?;
        map.serialize_entry("email", &self.profile.email)?;
        map.serialize_entry("photoUrl", &self.profile.photo_url)?;
        map.end()
    }
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: SessionRecord,
    /// Anything else the backend sent alongside the user
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug)]
pub enum BackendError {
    /// The backend answered with an error status
    Rejected { status: u16, message: String },
    /// No response
    Network(String),
    /// A success status with a body we cannot use
    InvalidResponse(String),
    /// Unusable base URL or path
    Configuration(String),
}

impl BackendError {
    /// Text shown to the user for this failure
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Rejected { status, message } => {
                write!(f, "Backend rejected the request ({status}): {message}")
            }
            BackendError::Network(msg) => write!(f, "Network error: {msg}"),
            BackendError::InvalidResponse(msg) => write!(f, "Invalid backend response: {msg}"),
            BackendError::Configuration(msg) => write!(f, "Backend configuration error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backend rejects the profile or cannot be reached
    async fn federated_login(
        &self,
        request: &FederatedLoginRequest,
    ) -> Result<AuthResponse, BackendError>;

    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the backend cannot be reached
    async fn login(&self, login: &Login) -> Result<AuthResponse, BackendError>;

    /// # Errors
    ///
    /// Returns an error if registration is rejected or the backend cannot be reached
    async fn register(&self, signup: &Signup) -> Result<serde_json::Value, BackendError>;
}

/// [`AuthBackend`] over HTTP with `reqwest`
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: Url,
    federated_login_path: String,
    login_path: String,
    register_path: String,
}

impl HttpAuthBackend {
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            BackendError::Configuration(format!(
                "Invalid backend base URL {}: {e}",
                settings.base_url
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                BackendError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            federated_login_path: settings.federated_login_path.clone(),
            login_path: settings.login_path.clone(),
            register_path: settings.register_path.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Configuration(format!("Invalid backend path {path}: {e}")))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        log::debug!("POST {url}");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Network(format!("Failed to read backend response: {e}")))?;

        if !status.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(&bytes)
                    .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Pull a readable message out of an error body
///
/// Accepts `{"message": "..."}`, `{"error": "..."}` and
/// `{"error": {"message": "..."}}`.
fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let message = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| value.get("error").and_then(serde_json::Value::as_str))
        .or_else(|| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(serde_json::Value::as_str)
        })?;
    Some(message.to_string()).filter(|m| !m.is_empty())
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn federated_login(
        &self,
        request: &FederatedLoginRequest,
    ) -> Result<AuthResponse, BackendError> {
        self.post(&self.federated_login_path, request).await
    }

    async fn login(&self, login: &Login) -> Result<AuthResponse, BackendError> {
        self.post(&self.login_path, login).await
    }

    async fn register(&self, signup: &Signup) -> Result<serde_json::Value, BackendError> {
        self.post(&self.register_path, signup).await
    }
}
