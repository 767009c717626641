//! Mock objects and fake implementations for testing
//!
//! Scripted stand-ins for the popup host, the identity provider, the
//! application backend and the presentation sinks. Every fake is cheap to
//! clone and clones share state, so a test can hand one copy to the code
//! under test and inspect another.

use crate::feedback::{
    Feedback, Navigator, NotificationSink, ProgressMode, ProgressSink, Severity, TokioDelay,
};
use crate::models::auth::{Login, Signup};
use crate::models::ExternalProfile;
use crate::oauth::{AuthAction, OAuthError, ProfileSource};
use crate::popup::{AccessToken, ChildWindow, LocationError, PopupFeatures, PopupHost, ScreenSize};
use crate::session::backend::{AuthBackend, AuthResponse, BackendError, FederatedLoginRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct WindowScript {
    /// `None` while the child is on a foreign origin
    location: Option<Url>,
    failure: Option<String>,
    closed: bool,
    close_calls: usize,
}

/// A popup whose location and lifetime the test drives by hand
///
/// Starts on a foreign origin, so reads fail with
/// [`LocationError::CrossOrigin`] until [`ScriptedWindow::navigate`] is called.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWindow {
    script: Arc<Mutex<WindowScript>>,
}

impl ScriptedWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the child to a same-origin URL
    ///
    /// # Panics
    ///
    /// Panics if `url` is not a valid absolute URL.
    pub fn navigate(&self, url: &str) {
        let mut script = locked(&self.script);
        script.location = Some(Url::parse(url).unwrap());
        script.failure = None;
    }

    /// Move the child back to a foreign origin
    pub fn leave_origin(&self) {
        let mut script = locked(&self.script);
        script.location = None;
        script.failure = None;
    }

    /// Make location reads fail with a host error until the next navigation
    pub fn fail_reads(&self, reason: &str) {
        locked(&self.script).failure = Some(reason.to_string());
    }

    /// The user closes the popup
    pub fn close_by_user(&self) {
        locked(&self.script).closed = true;
    }

    /// How many times the code under test closed the popup
    #[must_use]
    pub fn close_calls(&self) -> usize {
        locked(&self.script).close_calls
    }
}

impl ChildWindow for ScriptedWindow {
    fn is_closed(&self) -> bool {
        locked(&self.script).closed
    }

    fn location(&self) -> Result<Url, LocationError> {
        let script = locked(&self.script);
        if let Some(reason) = &script.failure {
            return Err(LocationError::Unavailable(reason.clone()));
        }
        script.location.clone().ok_or(LocationError::CrossOrigin)
    }

    fn close(&mut self) {
        let mut script = locked(&self.script);
        script.close_calls += 1;
        script.closed = true;
    }
}

/// One call to [`PopupHost::open`] that produced a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPopup {
    pub url: Url,
    pub name: String,
    pub features: String,
}

/// Popup host handing out a [`ScriptedWindow`]
///
/// Without a window it behaves like a host whose popup blocker is on.
#[derive(Debug, Clone)]
pub struct MockPopupHost {
    screen: ScreenSize,
    window: Option<ScriptedWindow>,
    opened: Arc<Mutex<Vec<OpenedPopup>>>,
}

impl Default for MockPopupHost {
    fn default() -> Self {
        Self::new(ScreenSize {
            width: 1920,
            height: 1080,
        })
    }
}

impl MockPopupHost {
    #[must_use]
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen,
            window: None,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A host that blocks every popup
    #[must_use]
    pub fn blocking() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_window(mut self, window: ScriptedWindow) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn opened(&self) -> Vec<OpenedPopup> {
        locked(&self.opened).clone()
    }
}

impl PopupHost for MockPopupHost {
    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn open(
        &self,
        url: &Url,
        name: &str,
        features: &PopupFeatures,
    ) -> Option<Box<dyn ChildWindow>> {
        let window = self.window.clone()?;
        locked(&self.opened).push(OpenedPopup {
            url: url.clone(),
            name: name.to_string(),
            features: features.to_string(),
        });
        Some(Box::new(window))
    }
}

/// Everything a [`RecordingFeedback`] saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    Notify(String, Severity),
    Progress(ProgressMode),
    HideProgress,
    Navigate(String),
}

/// Presentation sinks that record instead of rendering
#[derive(Debug, Clone, Default)]
pub struct RecordingFeedback {
    events: Arc<Mutex<Vec<FeedbackEvent>>>,
}

impl RecordingFeedback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Feedback`] wired to this recorder and the tokio timer
    #[must_use]
    pub fn feedback(&self) -> Feedback {
        let sink = Arc::new(self.clone());
        Feedback::new(sink.clone(), sink.clone(), sink, Arc::new(TokioDelay))
    }

    #[must_use]
    pub fn events(&self) -> Vec<FeedbackEvent> {
        locked(&self.events).clone()
    }

    fn record(&self, event: FeedbackEvent) {
        locked(&self.events).push(event);
    }
}

impl NotificationSink for RecordingFeedback {
    fn show(&self, message: &str, severity: Severity) {
        self.record(FeedbackEvent::Notify(message.to_string(), severity));
    }
}

impl ProgressSink for RecordingFeedback {
    fn show(&self, mode: ProgressMode) {
        self.record(FeedbackEvent::Progress(mode));
    }

    fn hide(&self) {
        self.record(FeedbackEvent::HideProgress);
    }
}

impl Navigator for RecordingFeedback {
    fn navigate(&self, path: &str) {
        self.record(FeedbackEvent::Navigate(path.to_string()));
    }
}

#[derive(Debug, Clone)]
enum BackendReply {
    Accept(Value),
    Reject { status: u16, message: String },
}

#[derive(Debug, Default)]
struct BackendCalls {
    federated: Vec<Value>,
    logins: Vec<Value>,
    registrations: Vec<Value>,
}

/// Application backend answering every call the same way
#[derive(Debug, Clone)]
pub struct MockAuthBackend {
    reply: BackendReply,
    calls: Arc<Mutex<BackendCalls>>,
}

impl MockAuthBackend {
    /// Answer every call with `body`
    #[must_use]
    pub fn accepting(body: Value) -> Self {
        Self::with_reply(BackendReply::Accept(body))
    }

    /// Reject every call with `status` and `message`
    #[must_use]
    pub fn rejecting(status: u16, message: &str) -> Self {
        Self::with_reply(BackendReply::Reject {
            status,
            message: message.to_string(),
        })
    }

    fn with_reply(reply: BackendReply) -> Self {
        Self {
            reply,
            calls: Arc::new(Mutex::new(BackendCalls::default())),
        }
    }

    /// Bodies posted to the federated login endpoint
    #[must_use]
    pub fn federated_requests(&self) -> Vec<Value> {
        locked(&self.calls).federated.clone()
    }

    #[must_use]
    pub fn login_requests(&self) -> Vec<Value> {
        locked(&self.calls).logins.clone()
    }

    #[must_use]
    pub fn registration_requests(&self) -> Vec<Value> {
        locked(&self.calls).registrations.clone()
    }

    fn answer(&self) -> Result<Value, BackendError> {
        match &self.reply {
            BackendReply::Accept(body) => Ok(body.clone()),
            BackendReply::Reject { status, message } => Err(BackendError::Rejected {
                status: *status,
                message: message.clone(),
            }),
        }
    }

    fn answer_login(&self) -> Result<AuthResponse, BackendError> {
        serde_json::from_value(self.answer()?)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

fn to_json<T: serde::Serialize>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or(Value::Null)
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn federated_login(
        &self,
        request: &FederatedLoginRequest,
    ) -> Result<AuthResponse, BackendError> {
        locked(&self.calls).federated.push(to_json(request));
        self.answer_login()
    }

    async fn login(&self, login: &Login) -> Result<AuthResponse, BackendError> {
        locked(&self.calls).logins.push(to_json(login));
        self.answer_login()
    }

    async fn register(&self, signup: &Signup) -> Result<Value, BackendError> {
        locked(&self.calls).registrations.push(to_json(signup));
        self.answer()
    }
}

/// Identity provider returning a fixed profile or a fixed status
#[derive(Debug, Clone)]
pub struct MockProfileSource {
    profile: Option<ExternalProfile>,
    status: u16,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MockProfileSource {
    #[must_use]
    pub fn returning(profile: ExternalProfile) -> Self {
        Self {
            profile: Some(profile),
            status: 200,
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every fetch with [`OAuthError::Status`]
    #[must_use]
    pub fn failing(status: u16) -> Self {
        Self {
            profile: None,
            status,
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Secrets of every token presented so far
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        locked(&self.tokens).clone()
    }
}

#[async_trait]
impl ProfileSource for MockProfileSource {
    async fn fetch_profile(
        &self,
        _action: AuthAction,
        token: &AccessToken,
    ) -> Result<ExternalProfile, OAuthError> {
        locked(&self.tokens).push(token.secret().to_string());
        self.profile.clone().ok_or(OAuthError::Status(self.status))
    }
}
