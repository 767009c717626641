// Centralized logging utilities to keep handshake events consistent
use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::handshake::HandshakeState;
use crate::oauth::{AuthAction, OAuthError};
use crate::popup::PopupFeatures;
use crate::session::{BackendError, ReconcileError};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log provider configuration status at startup
    pub fn log_provider_init(action: AuthAction, configured: bool) {
        if configured {
            info!("✅ {} OAuth configured", action);
        } else {
            info!("❌ {} OAuth not configured - missing client id", action);
        }
    }

    /// Log that the host refused to open the popup
    pub fn log_popup_blocked(action: AuthAction) {
        debug!("Popup for {} was blocked by the host", action);
    }

    /// Log a successfully opened popup
    pub fn log_popup_opened(action: AuthAction, features: &PopupFeatures) {
        info!("🔍 Opened {} authorization popup ({})", action, features);
    }

    /// Log that the user closed the popup before a token arrived
    pub fn log_popup_abandoned(action: AuthAction, session_id: Uuid) {
        debug!("{} popup closed before redirect (session {})", action, session_id);
    }

    /// Log a tick whose location read failed for a reason other than cross-origin
    pub fn log_tick_failure(session_id: Uuid, reason: &str) {
        trace!("Popup location unavailable for session {}: {}", session_id, reason);
    }

    /// Log token detection. The token itself is never logged.
    pub fn log_token_detected(action: AuthAction, session_id: Uuid) {
        info!("🔄 {} access token received (session {})", action, session_id);
    }

    pub fn log_consent_denied(action: AuthAction, session_id: Uuid, message: &str) {
        warn!("{} consent denied (session {}): {}", action, session_id, message);
    }

    pub fn log_poller_stopped(action: AuthAction, session_id: Uuid) {
        debug!("Stopped {} poller for session {}", action, session_id);
    }

    pub fn log_view_teardown(stopped: usize) {
        debug!("View torn down, stopped {} live poller(s)", stopped);
    }

    pub fn log_profile_failed(action: AuthAction, err: &OAuthError) {
        warn!("Failed to fetch {} profile: {}", action, err);
    }

    /// Log a stored session record
    pub fn log_session_persisted(via: &str, email: Option<&str>) {
        info!(
            "Successfully stored session for user: {} (via: {})",
            email.unwrap_or("<no email>"),
            via
        );
    }

    pub fn log_reconcile_failed(via: &str, err: &ReconcileError) {
        match err {
            ReconcileError::Backend(BackendError::Rejected { .. }) => {
                warn!("Backend rejected {} login: {}", via, err);
            }
            _ => error!("{} login failed: {}", via, err),
        }
    }

    pub fn log_backend_rejected(request: &str, err: &BackendError) {
        warn!("Backend rejected {}: {}", request, err);
    }

    pub fn log_poller_lost(action: AuthAction, session_id: Uuid) {
        error!(
            "Poller for {} handshake {} ended without an outcome",
            action, session_id
        );
    }

    pub fn log_handshake_finished(
        action: AuthAction,
        session_id: Uuid,
        state: HandshakeState,
        opened_at: DateTime<Utc>,
    ) {
        let elapsed_ms = (Utc::now() - opened_at).num_milliseconds();
        info!(
            "🎯 {} handshake {} finished after {}ms: {}",
            action, session_id, elapsed_ms, state
        );
    }

    /// Log the loopback redirect server binding
    pub fn log_loopback_started(address: &str) {
        info!("Loopback redirect host listening on http://{}", address);
    }

    pub fn log_redirect_reported(window_id: Uuid) {
        debug!("Redirect page reported its location (window {})", window_id);
    }

    pub fn log_browser_open_failed(err: &std::io::Error) {
        error!("Failed to open the system browser: {}", err);
    }
}
