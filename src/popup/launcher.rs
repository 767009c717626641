//! Popup launcher
//!
//! Builds the provider's authorization URL and opens it in a fixed-size,
//! centered child context through a [`PopupHost`].

use crate::oauth::{AuthAction, OAuthError};
use crate::popup::window::{ChildWindow, PopupFeatures, PopupHost, ScreenSize};
use crate::settings::PopauthSettings;
use crate::utils::logging::LoggingHelper;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A popup that the host actually opened
pub struct LaunchedPopup {
    pub action: AuthAction,
    pub window: Box<dyn ChildWindow>,
    pub opened_at: DateTime<Utc>,
}

impl fmt::Debug for LaunchedPopup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedPopup")
            .field("action", &self.action)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct PopupLauncher {
    settings: Arc<PopauthSettings>,
}

impl PopupLauncher {
    #[must_use]
    pub fn new(settings: Arc<PopauthSettings>) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn features(&self, screen: ScreenSize) -> PopupFeatures {
        PopupFeatures::centered(self.settings.popup.width, self.settings.popup.height, screen)
    }

    /// Open the authorization popup for `action`
    ///
    /// `Ok(None)` means the host blocked the popup; callers treat that as a
    /// silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization URL cannot be built (missing
    /// client id or invalid endpoint).
    pub fn launch(
        &self,
        action: AuthAction,
        host: &dyn PopupHost,
    ) -> Result<Option<LaunchedPopup>, OAuthError> {
        let url: Url = action.authorization_url(&self.settings)?;
        let features = self.features(host.screen_size());

        let Some(window) = host.open(&url, &self.settings.popup.window_name, &features) else {
            LoggingHelper::log_popup_blocked(action);
            return Ok(None);
        };

        LoggingHelper::log_popup_opened(action, &features);
        Ok(Some(LaunchedPopup {
            action,
            window,
            opened_at: Utc::now(),
        }))
    }
}
