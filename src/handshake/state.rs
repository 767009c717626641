use crate::models::SessionRecord;
use crate::oauth::OAuthError;
use crate::session::ReconcileError;
use std::fmt;

/// Where a single handshake currently is
///
/// `Idle → PopupOpen → Polling → {Abandoned | Denied | Cancelled |
/// TokenFound → FetchingProfile → {ProfileError | ProfileOk → Reconciling →
/// {ReconcileError | ReconcileOk → Completed}}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    PopupOpen,
    Polling,
    Abandoned,
    Denied,
    /// Polling force-stopped by view teardown or an explicit cancel
    Cancelled,
    TokenFound,
    FetchingProfile,
    ProfileError,
    ProfileOk,
    Reconciling,
    ReconcileError,
    ReconcileOk,
    Completed,
}

impl HandshakeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandshakeState::Abandoned
                | HandshakeState::Denied
                | HandshakeState::Cancelled
                | HandshakeState::ProfileError
                | HandshakeState::ReconcileError
                | HandshakeState::Completed
        )
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a handshake ended
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// The user closed the popup before a token arrived
    Abandoned,
    /// The provider redirected back with an error
    Denied(String),
    /// Polling was stopped from outside
    Stopped,
    ProfileFailed(OAuthError),
    ReconcileFailed(ReconcileError),
    Completed(SessionRecord),
}

impl HandshakeOutcome {
    /// The state this outcome leaves the handshake in
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        match self {
            HandshakeOutcome::Abandoned => HandshakeState::Abandoned,
            HandshakeOutcome::Denied(_) => HandshakeState::Denied,
            HandshakeOutcome::Stopped => HandshakeState::Cancelled,
            HandshakeOutcome::ProfileFailed(_) => HandshakeState::ProfileError,
            HandshakeOutcome::ReconcileFailed(_) => HandshakeState::ReconcileError,
            HandshakeOutcome::Completed(_) => HandshakeState::Completed,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, HandshakeOutcome::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(HandshakeState::Completed.is_terminal());
        assert!(HandshakeState::Abandoned.is_terminal());
        assert!(HandshakeState::ProfileError.is_terminal());
        assert!(!HandshakeState::ReconcileOk.is_terminal());
        assert!(!HandshakeState::Polling.is_terminal());
    }

    #[test]
    fn test_outcome_state_mapping() {
        assert_eq!(HandshakeOutcome::Stopped.state(), HandshakeState::Cancelled);
        assert_eq!(
            HandshakeOutcome::ProfileFailed(OAuthError::Status(401)).state(),
            HandshakeState::ProfileError
        );
        assert!(!HandshakeOutcome::Abandoned.is_success());
    }
}
