//! Session reconciler
//!
//! Turns a backend login answer into local session state and user feedback.
//! Each outcome has exactly one set of side effects:
//!
//! - success: write the record under `user`, wait the completion delay, then
//!   navigate home, toast "Login Successful" and hide the progress bar
//! - failure: toast the server's message as an error and hide the progress
//!   bar right away; nothing is written and no delayed step is scheduled

use crate::feedback::{Feedback, Severity};
use crate::models::auth::{Login, Signup};
use crate::models::{ExternalProfile, SessionRecord};
use crate::oauth::AuthAction;
use crate::session::backend::{AuthBackend, AuthResponse, BackendError, FederatedLoginRequest};
use crate::session::store::{persist_user, SessionStore, StoreError};
use crate::utils::logging::LoggingHelper;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login Successful";
pub const REGISTRATION_SUCCESS_MESSAGE: &str = "Registration Successful";

#[derive(Debug)]
pub enum ReconcileError {
    Backend(BackendError),
    /// The backend accepted the login but the record could not be stored
    Store(StoreError),
}

impl ReconcileError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ReconcileError::Backend(err) => err.user_message(),
            ReconcileError::Store(err) => err.to_string(),
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Backend(err) => write!(f, "Login rejected: {err}"),
            ReconcileError::Store(err) => write!(f, "Failed to persist session: {err}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Backend(err) => Some(err),
            ReconcileError::Store(err) => Some(err),
        }
    }
}

impl From<BackendError> for ReconcileError {
    fn from(err: BackendError) -> Self {
        ReconcileError::Backend(err)
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Store(err)
    }
}

#[derive(Clone)]
pub struct SessionReconciler {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    feedback: Feedback,
    completion_delay: Duration,
    home_path: String,
}

impl SessionReconciler {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn SessionStore>,
        feedback: Feedback,
        completion_delay: Duration,
        home_path: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            feedback,
            completion_delay,
            home_path: home_path.into(),
        }
    }

    /// Same reconciler reporting through `feedback`
    #[must_use]
    pub fn with_feedback(&self, feedback: Feedback) -> Self {
        Self {
            feedback,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Federated login: submit, then run the delayed completion step
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the profile or the record cannot be stored
    pub async fn reconcile(
        &self,
        action: AuthAction,
        profile: ExternalProfile,
    ) -> Result<SessionRecord, ReconcileError> {
        let record = self.submit(action, profile).await?;
        self.complete().await;
        Ok(record)
    }

    /// Post the profile and persist the returned record
    ///
    /// Failure side effects fire here; success side effects wait for
    /// [`Self::complete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the profile or the record cannot be stored
    pub async fn submit(
        &self,
        action: AuthAction,
        profile: ExternalProfile,
    ) -> Result<SessionRecord, ReconcileError> {
        let request = FederatedLoginRequest::new(action, profile);
        let result = self.backend.federated_login(&request).await;
        self.settle(action.name(), result)
    }

    /// The delayed completion step after a confirmed login
    ///
    /// Skipped entirely when the hosting view is already gone.
    pub async fn complete(&self) {
        if !self.feedback.is_attached() {
            return;
        }
        self.feedback.delay(self.completion_delay).await;
        self.feedback.navigate(&self.home_path);
        self.feedback.notify(LOGIN_SUCCESS_MESSAGE, Severity::Success);
        self.feedback.hide_progress();
    }

    /// Password login, reconciled like a federated one
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the record cannot be stored
    pub async fn login(&self, login: &Login) -> Result<SessionRecord, ReconcileError> {
        let result = self.backend.login(login).await;
        let record = self.settle("password", result)?;
        self.complete().await;
        Ok(record)
    }

    /// Create an account. Registration does not log the user in.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration
    pub async fn register(&self, signup: &Signup) -> Result<serde_json::Value, ReconcileError> {
        match self.backend.register(signup).await {
            Ok(body) => {
                self.feedback
                    .notify(REGISTRATION_SUCCESS_MESSAGE, Severity::Success);
                Ok(body)
            }
            Err(err) => {
                LoggingHelper::log_backend_rejected("registration", &err);
                self.feedback.notify(&err.user_message(), Severity::Error);
                Err(err.into())
            }
        }
    }

    fn settle(
        &self,
        via: &str,
        result: Result<AuthResponse, BackendError>,
    ) -> Result<SessionRecord, ReconcileError> {
        let outcome = result
            .map_err(ReconcileError::from)
            .and_then(|response| {
                persist_user(self.store.as_ref(), &response.user)?;
                Ok(response.user)
            });

        match outcome {
            Ok(record) => {
                LoggingHelper::log_session_persisted(via, record.email());
                Ok(record)
            }
            Err(err) => {
                LoggingHelper::log_reconcile_failed(via, &err);
                self.feedback.notify(&err.user_message(), Severity::Error);
                self.feedback.hide_progress();
                Err(err)
            }
        }
    }
}
