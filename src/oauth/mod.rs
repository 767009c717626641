//! OAuth provider module
//!
//! This module covers everything that talks to an identity provider:
//! the closed set of supported providers with their authorization URL and
//! user-info strategies, and the profile fetcher that turns an implicit-grant
//! access token into a normalized profile.

pub mod profile;
pub mod providers;

pub use profile::{ProfileFetcher, ProfileSource};
pub use providers::AuthAction;

use std::fmt;

/// Errors raised while talking to an identity provider
#[derive(Debug)]
pub enum OAuthError {
    /// Missing client id, unparsable endpoint, unknown provider name
    Configuration(String),
    /// The request never produced a response
    Network(String),
    /// The provider answered with a non-success status
    Status(u16),
    /// The response body could not be mapped to a profile
    InvalidResponse(String),
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            OAuthError::Network(msg) => write!(f, "Network error: {msg}"),
            OAuthError::Status(code) => write!(f, "Provider responded with status {code}"),
            OAuthError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
        }
    }
}

impl std::error::Error for OAuthError {}
