//! Test fixtures providing pre-built test objects

use crate::models::auth::{Login, Signup};
use crate::models::ExternalProfile;
use crate::settings::PopauthSettings;
use serde_json::{json, Value};

use super::constants::{
    TEST_EMAIL, TEST_FACEBOOK_APP_ID, TEST_GOOGLE_CLIENT_ID, TEST_PROVIDER_ID, TEST_USER_NAME,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Default settings with both providers configured
    ///
    /// Client id env variables point at names that are never set, so the
    /// developer's real environment cannot leak into tests.
    #[must_use]
    pub fn settings() -> PopauthSettings {
        let mut settings = PopauthSettings::default();
        settings.providers.google.client_id = Some(TEST_GOOGLE_CLIENT_ID.to_string());
        settings.providers.google.client_id_env =
            Some("POPAUTH_TEST_UNSET_GOOGLE_CLIENT_ID".to_string());
        settings.providers.facebook.client_id = Some(TEST_FACEBOOK_APP_ID.to_string());
        settings.providers.facebook.client_id_env =
            Some("POPAUTH_TEST_UNSET_FACEBOOK_APP_ID".to_string());
        settings
    }

    /// Settings whose provider and backend endpoints all live under `base`
    #[must_use]
    pub fn settings_against(base: &str) -> PopauthSettings {
        let mut settings = Self::settings();
        settings.providers.google.userinfo_endpoint = Some(format!("{base}/oauth2/v2/userinfo"));
        settings.providers.facebook.userinfo_endpoint = Some(format!("{base}/me"));
        settings.backend.base_url = base.to_string();
        settings
    }

    #[must_use]
    pub fn google_profile() -> ExternalProfile {
        ExternalProfile {
            name: TEST_USER_NAME.to_string(),
            id: TEST_PROVIDER_ID.to_string(),
            email: Some(TEST_EMAIL.to_string()),
            photo_url: Some("http://p".to_string()),
        }
    }

    #[must_use]
    pub fn facebook_profile() -> ExternalProfile {
        ExternalProfile {
            name: TEST_USER_NAME.to_string(),
            id: "10001".to_string(),
            email: Some(TEST_EMAIL.to_string()),
            photo_url: None,
        }
    }

    /// Google user-info document for [`Self::google_profile`]
    #[must_use]
    pub fn google_userinfo() -> Value {
        json!({
            "id": TEST_PROVIDER_ID,
            "name": TEST_USER_NAME,
            "email": TEST_EMAIL,
            "picture": "http://p",
            "verified_email": true
        })
    }

    /// Graph API document for [`Self::facebook_profile`]
    #[must_use]
    pub fn facebook_userinfo() -> Value {
        json!({
            "id": "10001",
            "name": TEST_USER_NAME,
            "email": TEST_EMAIL
        })
    }

    #[must_use]
    pub fn login() -> Login {
        Login {
            email: TEST_EMAIL.to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[must_use]
    pub fn signup() -> Signup {
        Signup {
            name: TEST_USER_NAME.to_string(),
            email: TEST_EMAIL.to_string(),
            mobile: "5550100".to_string(),
            password: "correct horse".to_string(),
        }
    }
}
