//! Access-token extraction from implicit-grant redirects
//!
//! The provider hands the token back in the URL fragment
//! (`#access_token=...&token_type=bearer&...`). The fragment is parsed as an
//! `application/x-www-form-urlencoded` string.

use std::fmt;
use url::Url;

/// Bearer token obtained from the redirect fragment
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw token, for building provider requests only
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED; {} chars])", self.0.len())
    }
}

/// Parameters the provider placed after `#` on the redirect
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedirectFragment {
    pub access_token: Option<AccessToken>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl RedirectFragment {
    /// Parse the fragment of `url`. Providers that report errors on the query
    /// string instead of the fragment are covered as well.
    #[must_use]
    pub fn parse(url: &Url) -> Self {
        let mut fragment = Self::parse_pairs(url.fragment().unwrap_or_default());

        if fragment.error.is_none() {
            let query = Self::parse_pairs(url.query().unwrap_or_default());
            fragment.error = query.error;
            fragment.error_description = query.error_description;
        }

        fragment
    }

    fn parse_pairs(raw: &str) -> Self {
        let mut fragment = Self::default();

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "access_token" if !value.is_empty() && fragment.access_token.is_none() => {
                    fragment.access_token = Some(AccessToken::new(value.into_owned()));
                }
                "error" if fragment.error.is_none() => fragment.error = Some(value.into_owned()),
                "error_description" if fragment.error_description.is_none() => {
                    fragment.error_description = Some(value.into_owned());
                }
                _ => {}
            }
        }

        fragment
    }

    /// Human-readable reason for a denied authorization
    #[must_use]
    pub fn denial_message(&self) -> Option<String> {
        self.error.as_ref().map(|error| {
            self.error_description
                .clone()
                .filter(|description| !description.is_empty())
                .unwrap_or_else(|| error.clone())
        })
    }
}

/// Whether `url` is the redirect back to our own origin
#[must_use]
pub fn is_redirect(url: &Url, marker: &str) -> bool {
    !marker.is_empty() && url.as_str().contains(marker)
}

/// Extract `access_token` from the fragment of `url`
#[must_use]
pub fn extract_access_token(url: &Url) -> Option<AccessToken> {
    RedirectFragment::parse(url).access_token
}
