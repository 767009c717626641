//! Handshake orchestration
//!
//! Ties the popup side (launcher, poller) to the session side (profile
//! fetch, reconciler) for one login attempt at a time, and scopes every
//! running attempt to the view that started it.

pub mod controller;
pub mod scope;
pub mod state;

pub use controller::{HandshakeController, HandshakeTicket};
pub use scope::ViewScope;
pub use state::{HandshakeOutcome, HandshakeState};

use crate::oauth::OAuthError;
use std::fmt;

#[derive(Debug)]
pub enum HandshakeError {
    /// The authorization URL could not be built
    Launch(OAuthError),
    /// The hosting view was torn down before the handshake started
    ViewClosed,
    /// The handoff task panicked or was aborted
    Task(String),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Launch(err) => write!(f, "Failed to launch popup: {err}"),
            HandshakeError::ViewClosed => write!(f, "The hosting view is gone"),
            HandshakeError::Task(msg) => write!(f, "Handshake task failed: {msg}"),
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandshakeError::Launch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OAuthError> for HandshakeError {
    fn from(err: OAuthError) -> Self {
        HandshakeError::Launch(err)
    }
}
