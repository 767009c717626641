//! Handshake controller
//!
//! [`HandshakeController::begin`] opens the popup and starts its poller. A
//! separate handoff task waits for the poller's single outcome and, when a
//! token arrived, runs the profile fetch and the reconciler. The poll loop
//! is already finished by then; the handoff never blocks a tick.

use crate::feedback::{Feedback, ProgressMode, Severity};
use crate::handshake::scope::ViewScope;
use crate::handshake::state::{HandshakeOutcome, HandshakeState};
use crate::handshake::HandshakeError;
use crate::oauth::{AuthAction, ProfileSource};
use crate::popup::{
    AccessToken, HandshakePoller, HandshakeSession, PollOutcome, PollerHandle, PopupHost,
    PopupLauncher,
};
use crate::session::SessionReconciler;
use crate::settings::PopauthSettings;
use crate::utils::logging::LoggingHelper;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Progress shown while the backend reconciles the profile
const RECONCILE_PROGRESS: u8 = 50;

#[derive(Clone)]
pub struct HandshakeController {
    launcher: PopupLauncher,
    poller: HandshakePoller,
    profiles: Arc<dyn ProfileSource>,
    reconciler: SessionReconciler,
    feedback: Feedback,
    scope: ViewScope,
    redirect_marker: String,
    report_denied_consent: bool,
}

impl HandshakeController {
    /// Build a controller whose feedback is bound to `scope`
    #[must_use]
    pub fn new(
        settings: Arc<PopauthSettings>,
        profiles: Arc<dyn ProfileSource>,
        reconciler: SessionReconciler,
        feedback: Feedback,
        scope: ViewScope,
    ) -> Self {
        let feedback = feedback.attached_to(&scope);
        Self {
            launcher: PopupLauncher::new(Arc::clone(&settings)),
            poller: HandshakePoller::new(settings.poll_interval()),
            profiles,
            reconciler: reconciler.with_feedback(feedback.clone()),
            feedback,
            scope,
            redirect_marker: settings.redirect_marker().to_string(),
            report_denied_consent: settings.popup.report_denied_consent,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Start a handshake for `action`
    ///
    /// Must be called from within a tokio runtime. `Ok(None)` means the host
    /// blocked the popup and nothing was started.
    ///
    /// # Errors
    ///
    /// Returns an error if the view is already torn down or the
    /// authorization URL cannot be built.
    pub fn begin(
        &self,
        action: AuthAction,
        host: &dyn PopupHost,
    ) -> Result<Option<HandshakeTicket>, HandshakeError> {
        if !self.scope.is_alive() {
            return Err(HandshakeError::ViewClosed);
        }

        let Some(popup) = self.launcher.launch(action, host)? else {
            return Ok(None);
        };

        let (state_tx, state_rx) = watch::channel(HandshakeState::PopupOpen);
        let session =
            HandshakeSession::new(action, Some(popup.window), self.redirect_marker.clone())
                .with_denial_reporting(self.report_denied_consent);
        let id = session.id();

        let (poller, outcome_rx, _poll_task) = self.poller.spawn(session);
        self.scope.register(poller.clone());
        state_tx.send_replace(HandshakeState::Polling);

        let handoff = Handoff {
            id,
            action,
            opened_at: popup.opened_at,
            profiles: Arc::clone(&self.profiles),
            reconciler: self.reconciler.clone(),
            feedback: self.feedback.clone(),
            scope: self.scope.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(handoff.run(outcome_rx));

        Ok(Some(HandshakeTicket {
            id,
            action,
            opened_at: popup.opened_at,
            poller,
            state: state_rx,
            task,
        }))
    }
}

/// A running handshake
pub struct HandshakeTicket {
    id: Uuid,
    action: AuthAction,
    opened_at: DateTime<Utc>,
    poller: PollerHandle,
    state: watch::Receiver<HandshakeState>,
    task: JoinHandle<HandshakeOutcome>,
}

impl HandshakeTicket {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn action(&self) -> AuthAction {
        self.action
    }

    /// When the host opened the popup
    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    #[must_use]
    pub fn state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HandshakeState> {
        self.state.clone()
    }

    /// Stop polling. Has no effect once the token was handed off.
    pub fn cancel_polling(&self) -> bool {
        self.poller.stop()
    }

    /// Wait for the handshake to reach a terminal state
    ///
    /// # Errors
    ///
    /// Returns an error if the handoff task panicked or was aborted
    pub async fn outcome(self) -> Result<HandshakeOutcome, HandshakeError> {
        self.task
            .await
            .map_err(|e| HandshakeError::Task(e.to_string()))
    }
}

impl std::fmt::Debug for HandshakeTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeTicket")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Everything the handoff task needs after the poller is done
struct Handoff {
    id: Uuid,
    action: AuthAction,
    opened_at: DateTime<Utc>,
    profiles: Arc<dyn ProfileSource>,
    reconciler: SessionReconciler,
    feedback: Feedback,
    scope: ViewScope,
    state: watch::Sender<HandshakeState>,
}

impl Handoff {
    async fn run(self, outcome_rx: oneshot::Receiver<PollOutcome>) -> HandshakeOutcome {
        let polled = outcome_rx.await.unwrap_or_else(|_| {
            LoggingHelper::log_poller_lost(self.action, self.id);
            PollOutcome::Stopped { action: self.action }
        });
        self.scope.forget(self.id);

        let outcome = match polled {
            PollOutcome::Abandoned { .. } => HandshakeOutcome::Abandoned,
            PollOutcome::Stopped { .. } => HandshakeOutcome::Stopped,
            PollOutcome::Denied { message, .. } => {
                self.feedback.notify(&message, Severity::Error);
                HandshakeOutcome::Denied(message)
            }
            PollOutcome::TokenFound { token, .. } => self.exchange(&token).await,
        };

        self.state.send_replace(outcome.state());
        LoggingHelper::log_handshake_finished(
            self.action,
            self.id,
            outcome.state(),
            self.opened_at,
        );
        outcome
    }

    async fn exchange(&self, token: &AccessToken) -> HandshakeOutcome {
        self.state.send_replace(HandshakeState::TokenFound);
        self.state.send_replace(HandshakeState::FetchingProfile);
        self.feedback.show_progress(ProgressMode::Indeterminate);

        let profile = match self.profiles.fetch_profile(self.action, token).await {
            Ok(profile) => profile,
            Err(err) => {
                LoggingHelper::log_profile_failed(self.action, &err);
                self.feedback.hide_progress();
                return HandshakeOutcome::ProfileFailed(err);
            }
        };

        self.state.send_replace(HandshakeState::ProfileOk);
        self.state.send_replace(HandshakeState::Reconciling);
        self.feedback
            .show_progress(ProgressMode::Determinate(RECONCILE_PROGRESS));

        match self.reconciler.submit(self.action, profile).await {
            Ok(record) => {
                self.state.send_replace(HandshakeState::ReconcileOk);
                self.reconciler.complete().await;
                HandshakeOutcome::Completed(record)
            }
            Err(err) => HandshakeOutcome::ReconcileFailed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{keys, MemoryStore, SessionStore};
    use crate::testing::mock::{
        FeedbackEvent, MockAuthBackend, MockPopupHost, MockProfileSource, RecordingFeedback,
        ScriptedWindow,
    };
    use crate::testing::TestFixtures;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        controller: HandshakeController,
        recorder: RecordingFeedback,
        store: Arc<MemoryStore>,
        profiles: MockProfileSource,
    }

    fn harness(backend: MockAuthBackend, profiles: MockProfileSource) -> Harness {
        harness_with(TestFixtures::settings(), backend, profiles)
    }

    fn harness_with(
        settings: PopauthSettings,
        backend: MockAuthBackend,
        profiles: MockProfileSource,
    ) -> Harness {
        let settings = Arc::new(settings);
        let recorder = RecordingFeedback::new();
        let store = Arc::new(MemoryStore::new());
        let reconciler = SessionReconciler::new(
            Arc::new(backend),
            store.clone(),
            recorder.feedback(),
            settings.completion_delay(),
            settings.application.home_path.clone(),
        );
        let controller = HandshakeController::new(
            Arc::clone(&settings),
            Arc::new(profiles.clone()),
            reconciler,
            recorder.feedback(),
            ViewScope::new(),
        );
        Harness {
            controller,
            recorder,
            store,
            profiles,
        }
    }

    fn redirect(fragment: &str) -> String {
        format!("{}#{fragment}", TestFixtures::settings().application.redirect_url)
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_handshake_end_to_end() {
        let h = harness(
            MockAuthBackend::accepting(json!({"user": {"id": 1, "email": "a@x.com"}})),
            MockProfileSource::returning(TestFixtures::google_profile()),
        );
        let window = ScriptedWindow::new();
        let host = MockPopupHost::default().with_window(window.clone());

        let ticket = h.controller.begin(AuthAction::Google, &host).unwrap().unwrap();
        assert_eq!(ticket.state(), HandshakeState::Polling);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        window.navigate(&redirect("access_token=ABC123&token_type=bearer"));

        let outcome = ticket.outcome().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(window.close_calls(), 1);
        assert_eq!(h.profiles.tokens(), vec!["ABC123".to_string()]);
        assert_eq!(
            h.store.read(keys::USER).unwrap().as_deref(),
            Some(r#"{"id":1,"email":"a@x.com"}"#)
        );
        assert_eq!(
            h.recorder.events(),
            vec![
                FeedbackEvent::Progress(ProgressMode::Indeterminate),
                FeedbackEvent::Progress(ProgressMode::Determinate(50)),
                FeedbackEvent::Navigate("/".to_string()),
                FeedbackEvent::Notify("Login Successful".to_string(), Severity::Success),
                FeedbackEvent::HideProgress,
            ]
        );
        assert_eq!(h.controller.scope().live_pollers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_popup_ends_silently() {
        let h = harness(
            MockAuthBackend::accepting(json!({"user": {"id": 1}})),
            MockProfileSource::returning(TestFixtures::google_profile()),
        );
        let window = ScriptedWindow::new();
        let host = MockPopupHost::default().with_window(window.clone());

        let ticket = h.controller.begin(AuthAction::Facebook, &host).unwrap().unwrap();
        window.close_by_user();

        let outcome = ticket.outcome().await.unwrap();
        assert!(matches!(outcome, HandshakeOutcome::Abandoned));
        assert!(h.recorder.events().is_empty());
        assert!(h.profiles.tokens().is_empty());
        assert_eq!(h.store.read(keys::USER).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_failure_hides_progress_and_keeps_session() {
        let h = harness(
            MockAuthBackend::accepting(json!({"user": {"id": 1}})),
            MockProfileSource::failing(401),
        );
        h.store.write(keys::USER, r#"{"id":"previous"}"#).unwrap();
        let window = ScriptedWindow::new();
        window.navigate(&redirect("access_token=expired"));
        let host = MockPopupHost::default().with_window(window);

        let ticket = h.controller.begin(AuthAction::Google, &host).unwrap().unwrap();
        let mut states = ticket.subscribe();
        let outcome = ticket.outcome().await.unwrap();

        assert!(matches!(outcome, HandshakeOutcome::ProfileFailed(_)));
        assert_eq!(*states.borrow_and_update(), HandshakeState::ProfileError);
        assert_eq!(
            h.store.read(keys::USER).unwrap().as_deref(),
            Some(r#"{"id":"previous"}"#)
        );
        assert_eq!(
            h.recorder.events(),
            vec![
                FeedbackEvent::Progress(ProgressMode::Indeterminate),
                FeedbackEvent::HideProgress,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_popup_starts_nothing() {
        let h = harness(
            MockAuthBackend::accepting(json!({"user": {"id": 1}})),
            MockProfileSource::returning(TestFixtures::google_profile()),
        );
        let host = MockPopupHost::blocking();

        assert!(h.controller.begin(AuthAction::Google, &host).unwrap().is_none());
        assert_eq!(h.controller.scope().live_pollers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_after_teardown_is_refused() {
        let h = harness(
            MockAuthBackend::accepting(json!({"user": {"id": 1}})),
            MockProfileSource::returning(TestFixtures::google_profile()),
        );
        h.controller.scope().teardown();

        let host = MockPopupHost::default().with_window(ScriptedWindow::new());
        assert!(matches!(
            h.controller.begin(AuthAction::Google, &host),
            Err(HandshakeError::ViewClosed)
        ));
        assert!(host.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_hands_off_the_token() {
        let mut settings = TestFixtures::settings();
        settings.popup.poll_interval_ms = 0;
        let h = harness_with(
            settings,
            MockAuthBackend::accepting(json!({"user": {"id": 1}})),
            MockProfileSource::returning(TestFixtures::google_profile()),
        );
        let window = ScriptedWindow::new();
        window.navigate(&redirect("access_token=ABC123"));
        let host = MockPopupHost::default().with_window(window.clone());

        let ticket = h.controller.begin(AuthAction::Google, &host).unwrap().unwrap();
        assert!(ticket.opened_at() <= Utc::now());
        let outcome = ticket.outcome().await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(h.profiles.tokens(), vec!["ABC123".to_string()]);
        assert_eq!(window.close_calls(), 1);
    }
}
