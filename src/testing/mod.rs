//! Unified testing utilities for popauth
//!
//! Available to unit tests and, behind the `testing` feature, to the
//! integration tests under `tests/`.
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built test data (settings, profiles, request bodies)
//! - [`mock`] - Scripted popup host, provider, backend and feedback sinks
//!
//! ## Usage
//!
//! ```ignore
//! use popauth::testing::mock::{MockPopupHost, ScriptedWindow};
//! use popauth::testing::TestFixtures;
//!
//! let window = ScriptedWindow::new();
//! let host = MockPopupHost::default().with_window(window.clone());
//! let settings = TestFixtures::settings();
//! # let _ = (host, settings);
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    /// Default test email address
    pub const TEST_EMAIL: &str = "a@x.com";

    /// Default test user name
    pub const TEST_USER_NAME: &str = "Ada";

    /// Default provider-scoped user id
    pub const TEST_PROVIDER_ID: &str = "42";

    pub const TEST_GOOGLE_CLIENT_ID: &str = "test-google-client";

    pub const TEST_FACEBOOK_APP_ID: &str = "test-facebook-app";
}
