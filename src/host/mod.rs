//! Loopback popup host
//!
//! A [`PopupHost`] for desktop use. The authorization URL opens in the
//! system browser, and the provider redirects to a small page served by an
//! actix-web server on the loopback interface. That page posts its own
//! location back, which is how the poller gets to "read" the child.

pub mod handlers;
pub mod registry;

pub use handlers::{configure, REPORT_PATH};
pub use registry::{LoopbackWindow, PopupRegistry, RedirectReport, ReportEvent};

use crate::popup::{ChildWindow, PopupFeatures, PopupHost, ScreenSize};
use crate::settings::PopauthSettings;
use crate::utils::logging::LoggingHelper;
use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use url::Url;

/// Opens URLs outside the application
pub trait BrowserOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no browser could be launched
    fn open(&self, url: &Url) -> io::Result<()>;
}

/// The user's default browser, through the `open` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &Url) -> io::Result<()> {
        open::that(url.as_str())
    }
}

pub struct LoopbackHost {
    registry: Arc<PopupRegistry>,
    screen: ScreenSize,
    opener: Arc<dyn BrowserOpener>,
}

impl LoopbackHost {
    /// Host opening tabs in the system browser. The screen size comes from
    /// settings since a browser tab has no position to center.
    #[must_use]
    pub fn new(registry: Arc<PopupRegistry>, settings: &PopauthSettings) -> Self {
        Self {
            registry,
            screen: ScreenSize {
                width: settings.popup.screen_width,
                height: settings.popup.screen_height,
            },
            opener: Arc::new(SystemBrowser),
        }
    }

    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn BrowserOpener>) -> Self {
        self.opener = opener;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PopupRegistry> {
        &self.registry
    }
}

impl PopupHost for LoopbackHost {
    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn open(
        &self,
        url: &Url,
        _name: &str,
        _features: &PopupFeatures,
    ) -> Option<Box<dyn ChildWindow>> {
        let window = self.registry.open_window();
        if let Err(err) = self.opener.open(url) {
            LoggingHelper::log_browser_open_failed(&err);
            // Dropping the window forgets it
            return None;
        }
        Some(Box::new(window))
    }
}

/// Path component of the configured redirect URL
///
/// # Errors
///
/// Returns an error if `application.redirect_url` is not an absolute URL
pub fn callback_path(settings: &PopauthSettings) -> io::Result<String> {
    let url = Url::parse(&settings.application.redirect_url).map_err(|e| {
        io::Error::other(format!(
            "Invalid redirect URL {}: {e}",
            settings.application.redirect_url
        ))
    })?;
    Ok(url.path().to_string())
}

/// Bind the loopback server. The returned [`Server`] must be spawned or awaited.
///
/// # Errors
///
/// Returns an error if the redirect URL is invalid or binding fails
pub fn start(settings: &PopauthSettings, registry: Arc<PopupRegistry>) -> io::Result<Server> {
    let bind_address = settings.get_bind_address();
    let callback_path = callback_path(settings)?;
    let registry = web::Data::from(registry);

    let server = HttpServer::new(move || {
        let callback_path = callback_path.clone();
        App::new()
            .app_data(registry.clone())
            .wrap(Logger::default())
            .configure(move |cfg| configure(cfg, &callback_path))
    })
    .workers(1)
    .bind(&bind_address)?
    .run();

    LoggingHelper::log_loopback_started(&bind_address);
    Ok(server)
}
