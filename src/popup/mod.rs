//! Popup side of the handshake
//!
//! Opening the provider's authorization page in a child context, watching
//! that context until it either comes back with a token or disappears, and
//! pulling the token out of the redirect.

pub mod launcher;
pub mod poller;
pub mod token;
pub mod window;

pub use launcher::{LaunchedPopup, PopupLauncher};
pub use poller::{
    HandshakePoller, HandshakeSession, Pending, PollOutcome, PollerHandle, TickOutcome,
};
pub use token::{extract_access_token, AccessToken, RedirectFragment};
pub use window::{ChildWindow, LocationError, PopupFeatures, PopupHost, ScreenSize};
