//! Handshake poller
//!
//! There is no message channel from the provider's pages back to the
//! application, so the popup is watched on a fixed interval instead. Every
//! tick is a synchronous check-and-act over one [`HandshakeSession`]:
//!
//! 1. child gone or closed: the session ends as [`TickOutcome::Abandoned`]
//! 2. location unreadable (cross-origin): [`Pending::CrossOrigin`], keep polling
//! 3. location readable but not our redirect: [`Pending::AwaitingRedirect`]
//! 4. our redirect with a token: close the child, end as [`TickOutcome::TokenFound`]
//! 5. our redirect without a token: keep polling until the child closes, or end
//!    as [`TickOutcome::Denied`] when denial reporting is enabled
//!
//! A session releases its child reference and clears its active flag on every
//! terminal branch, and every tick after that answers [`TickOutcome::Stopped`].
//! The tokio task in [`HandshakePoller::spawn`] reports the terminal outcome
//! through a `oneshot` channel, so at most one handoff can ever happen.

use crate::oauth::AuthAction;
use crate::popup::token::{is_redirect, AccessToken, RedirectFragment};
use crate::popup::window::{ChildWindow, LocationError};
use crate::utils::logging::LoggingHelper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Why a tick ended without a terminal outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Child still on the provider's origin
    CrossOrigin,
    /// Host could not read the location this time
    Unavailable(String),
    /// Readable, but not yet back on our redirect
    AwaitingRedirect,
    /// Back on our redirect without `access_token`
    RedirectWithoutToken,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Pending(Pending),
    Abandoned,
    TokenFound(AccessToken),
    Denied(String),
    /// The session had already ended before this tick
    Stopped,
}

/// Terminal outcome delivered once per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    TokenFound {
        action: AuthAction,
        token: AccessToken,
    },
    Abandoned {
        action: AuthAction,
    },
    Denied {
        action: AuthAction,
        message: String,
    },
    /// Force-stopped from outside (view teardown)
    Stopped {
        action: AuthAction,
    },
}

/// One in-flight popup login attempt
pub struct HandshakeSession {
    id: Uuid,
    action: AuthAction,
    window: Option<Box<dyn ChildWindow>>,
    redirect_marker: String,
    report_denied_consent: bool,
    active: Arc<AtomicBool>,
    completed: bool,
}

impl HandshakeSession {
    #[must_use]
    pub fn new(
        action: AuthAction,
        window: Option<Box<dyn ChildWindow>>,
        redirect_marker: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            window,
            redirect_marker: redirect_marker.into(),
            report_denied_consent: false,
            active: Arc::new(AtomicBool::new(true)),
            completed: false,
        }
    }

    /// End the session as soon as the redirect reports an `error`
    #[must_use]
    pub fn with_denial_reporting(mut self, report_denied_consent: bool) -> Self {
        self.report_denied_consent = report_denied_consent;
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn action(&self) -> AuthAction {
        self.action
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.completed && self.active.load(Ordering::Acquire)
    }

    /// Evaluate the child once
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_active() {
            self.release();
            return TickOutcome::Stopped;
        }

        let location = match &self.window {
            Some(window) if !window.is_closed() => Some(window.location()),
            _ => None,
        };
        let Some(location) = location else {
            self.release();
            LoggingHelper::log_popup_abandoned(self.action, self.id);
            return TickOutcome::Abandoned;
        };

        let url = match location {
            Ok(url) => url,
            Err(LocationError::CrossOrigin) => {
                return TickOutcome::Pending(Pending::CrossOrigin);
            }
            Err(LocationError::Unavailable(reason)) => {
                LoggingHelper::log_tick_failure(self.id, &reason);
                return TickOutcome::Pending(Pending::Unavailable(reason));
            }
        };

        if !is_redirect(&url, &self.redirect_marker) {
            return TickOutcome::Pending(Pending::AwaitingRedirect);
        }

        let fragment = RedirectFragment::parse(&url);
        if let Some(token) = fragment.access_token {
            self.close_child();
            self.release();
            LoggingHelper::log_token_detected(self.action, self.id);
            return TickOutcome::TokenFound(token);
        }

        if self.report_denied_consent {
            if let Some(message) = fragment.denial_message() {
                self.close_child();
                self.release();
                LoggingHelper::log_consent_denied(self.action, self.id, &message);
                return TickOutcome::Denied(message);
            }
        }

        TickOutcome::Pending(Pending::RedirectWithoutToken)
    }

    fn close_child(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.close();
        }
    }

    /// Single release point for every terminal branch
    fn release(&mut self) {
        self.completed = true;
        self.active.store(false, Ordering::Release);
        self.window = None;
    }
}

/// Handle used to force-stop a running poller
#[derive(Clone)]
pub struct PollerHandle {
    session_id: Uuid,
    active: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl PollerHandle {
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the poller. Returns `false` when it had already stopped.
    pub fn stop(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        if was_active {
            self.stop.notify_one();
        }
        was_active
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives [`HandshakeSession::tick`] on a fixed interval
#[derive(Debug, Clone, Copy)]
pub struct HandshakePoller {
    interval: Duration,
}

impl HandshakePoller {
    /// A zero `interval` is raised to one millisecond
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling `session` on the current tokio runtime
    ///
    /// The first tick runs one full interval after the call. The returned
    /// receiver yields exactly one [`PollOutcome`].
    #[must_use]
    pub fn spawn(
        &self,
        mut session: HandshakeSession,
    ) -> (PollerHandle, oneshot::Receiver<PollOutcome>, JoinHandle<()>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let stop = Arc::new(Notify::new());
        let handle = PollerHandle {
            session_id: session.id,
            active: Arc::clone(&session.active),
            stop: Arc::clone(&stop),
        };
        let period = self.interval;

        let task = tokio::spawn(async move {
            let action = session.action;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let outcome = loop {
                tokio::select! {
                    () = stop.notified() => {
                        session.release();
                        LoggingHelper::log_poller_stopped(action, session.id);
                        break PollOutcome::Stopped { action };
                    }
                    _ = ticker.tick() => {}
                }

                match session.tick() {
                    TickOutcome::Pending(_) => {}
                    TickOutcome::Abandoned => break PollOutcome::Abandoned { action },
                    TickOutcome::TokenFound(token) => {
                        break PollOutcome::TokenFound { action, token }
                    }
                    TickOutcome::Denied(message) => break PollOutcome::Denied { action, message },
                    TickOutcome::Stopped => break PollOutcome::Stopped { action },
                }
            };

            // The receiver may be gone if nobody awaits the outcome any more
            let _ = outcome_tx.send(outcome);
        });

        (handle, outcome_rx, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::ScriptedWindow;
    use tokio::time::Instant;

    const MARKER: &str = "http://localhost:4200/auth/callback";

    fn session_for(window: &ScriptedWindow) -> HandshakeSession {
        HandshakeSession::new(AuthAction::Google, Some(Box::new(window.clone())), MARKER)
    }

    #[test]
    fn test_cross_origin_reads_keep_polling() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        for _ in 0..5 {
            assert_eq!(session.tick(), TickOutcome::Pending(Pending::CrossOrigin));
        }
        assert!(session.is_active());
        assert_eq!(window.close_calls(), 0);
    }

    #[test]
    fn test_unavailable_location_only_affects_one_tick() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        window.fail_reads("renderer crashed");
        assert!(matches!(
            session.tick(),
            TickOutcome::Pending(Pending::Unavailable(_))
        ));

        window.navigate(&format!("{MARKER}#access_token=ABC123&token_type=bearer"));
        assert_eq!(
            session.tick(),
            TickOutcome::TokenFound(AccessToken::new("ABC123"))
        );
    }

    #[test]
    fn test_token_found_closes_child_and_ends_session() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        assert_eq!(session.tick(), TickOutcome::Pending(Pending::CrossOrigin));
        window.navigate(&format!("{MARKER}#access_token=ABC123&token_type=bearer"));

        assert_eq!(
            session.tick(),
            TickOutcome::TokenFound(AccessToken::new("ABC123"))
        );
        assert_eq!(window.close_calls(), 1);
        assert!(!session.is_active());

        // The URL still carries the token, but the session never hands off twice
        assert_eq!(session.tick(), TickOutcome::Stopped);
        assert_eq!(session.tick(), TickOutcome::Stopped);
        assert_eq!(window.close_calls(), 1);
    }

    #[test]
    fn test_closed_window_is_abandoned_silently() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        window.close_by_user();
        assert_eq!(session.tick(), TickOutcome::Abandoned);
        assert_eq!(session.tick(), TickOutcome::Stopped);
        assert_eq!(window.close_calls(), 0);
    }

    #[test]
    fn test_missing_window_is_abandoned() {
        let mut session = HandshakeSession::new(AuthAction::Facebook, None, MARKER);
        assert_eq!(session.tick(), TickOutcome::Abandoned);
    }

    #[test]
    fn test_closed_wins_over_token_on_same_tick() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        window.navigate(&format!("{MARKER}#access_token=ABC123"));
        window.close_by_user();

        assert_eq!(session.tick(), TickOutcome::Abandoned);
    }

    #[test]
    fn test_redirect_without_token_keeps_polling_by_default() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        window.navigate(&format!("{MARKER}#error=access_denied"));
        assert_eq!(
            session.tick(),
            TickOutcome::Pending(Pending::RedirectWithoutToken)
        );
        assert!(session.is_active());

        window.close_by_user();
        assert_eq!(session.tick(), TickOutcome::Abandoned);
    }

    #[test]
    fn test_denial_reporting_ends_session_immediately() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window).with_denial_reporting(true);

        window.navigate(&format!(
            "{MARKER}?error=access_denied&error_description=User+denied+access"
        ));
        assert_eq!(
            session.tick(),
            TickOutcome::Denied("User denied access".to_string())
        );
        assert_eq!(window.close_calls(), 1);
    }

    #[test]
    fn test_foreign_readable_page_is_not_the_redirect() {
        let window = ScriptedWindow::new();
        let mut session = session_for(&window);

        window.navigate("https://evil.example/#access_token=stolen");
        assert_eq!(
            session.tick(),
            TickOutcome::Pending(Pending::AwaitingRedirect)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_detected_within_one_interval() {
        let window = ScriptedWindow::new();
        let poller = HandshakePoller::new(Duration::from_millis(1000));
        let started = Instant::now();

        let (handle, outcome, _task) = poller.spawn(session_for(&window));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        window.navigate(&format!("{MARKER}#access_token=ABC123&token_type=bearer"));
        let redirected_at = Instant::now();

        let outcome = outcome.await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::TokenFound {
                action: AuthAction::Google,
                token: AccessToken::new("ABC123"),
            }
        );
        assert!(Instant::now() - redirected_at <= Duration::from_millis(1000));
        assert_eq!(Instant::now() - started, Duration::from_millis(3000));
        assert!(!handle.is_active());
        assert_eq!(window.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let window = ScriptedWindow::new();
        window.navigate(&format!("{MARKER}#access_token=ABC123"));
        let started = Instant::now();

        let (_handle, outcome, _task) =
            HandshakePoller::new(Duration::from_millis(1000)).spawn(session_for(&window));

        assert!(matches!(
            outcome.await.unwrap(),
            PollOutcome::TokenFound { .. }
        ));
        assert_eq!(Instant::now() - started, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_polls() {
        let window = ScriptedWindow::new();
        window.navigate(&format!("{MARKER}#access_token=ABC123"));

        let poller = HandshakePoller::new(Duration::ZERO);
        assert_eq!(poller.interval(), Duration::from_millis(1));

        let (_handle, outcome, task) = poller.spawn(session_for(&window));
        assert_eq!(
            outcome.await.unwrap(),
            PollOutcome::TokenFound {
                action: AuthAction::Google,
                token: AccessToken::new("ABC123"),
            }
        );
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_popup_ends_poll_without_handoff() {
        let window = ScriptedWindow::new();
        let (handle, outcome, task) =
            HandshakePoller::new(Duration::from_millis(1000)).spawn(session_for(&window));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        window.close_by_user();

        assert_eq!(
            outcome.await.unwrap(),
            PollOutcome::Abandoned {
                action: AuthAction::Google
            }
        );
        task.await.unwrap();
        assert!(!handle.is_active());
        assert!(!handle.stop(), "stopping a finished poller is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_stop_releases_the_poller() {
        let window = ScriptedWindow::new();
        let (handle, outcome, task) =
            HandshakePoller::new(Duration::from_millis(1000)).spawn(session_for(&window));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(handle.stop());
        assert!(!handle.stop());

        assert_eq!(
            outcome.await.unwrap(),
            PollOutcome::Stopped {
                action: AuthAction::Google
            }
        );
        task.await.unwrap();

        // A token appearing afterwards is never picked up
        window.navigate(&format!("{MARKER}#access_token=late"));
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(window.close_calls(), 0);
    }
}
