#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the popauth library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod feedback;
pub mod handshake;
pub mod host;
pub mod models;
pub mod oauth;
pub mod popup;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use feedback::{Feedback, ProgressMode, Severity};
pub use handshake::{HandshakeController, HandshakeOutcome, HandshakeState, ViewScope};
pub use models::{ExternalProfile, SessionRecord};
pub use oauth::{AuthAction, ProfileFetcher};
pub use session::{FileStore, HttpAuthBackend, SessionReconciler};
pub use settings::PopauthSettings;
