#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use popauth::{
    feedback::Feedback,
    handshake::{HandshakeController, HandshakeOutcome, ViewScope},
    host::{self, LoopbackHost, PopupRegistry},
    oauth::{AuthAction, ProfileFetcher},
    session::{FileStore, HttpAuthBackend, SessionReconciler},
    settings::PopauthSettings,
    utils::logging::LoggingHelper,
};
use anyhow::{anyhow, Context};
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = PopauthSettings::load()
        .map_err(|e| io::Error::other(format!("Failed to load settings: {e}")))?;

    let action: AuthAction = std::env::args()
        .nth(1)
        .ok_or_else(|| io::Error::other("Usage: popauth <google|facebook>"))?
        .parse()
        .map_err(|e| io::Error::other(format!("{e}")))?;

    for provider in AuthAction::ALL {
        let configured = provider
            .settings(&settings)
            .get_client_id(provider.default_client_id_env())
            .is_some();
        LoggingHelper::log_provider_init(provider, configured);
    }

    let settings = Arc::new(settings);
    let registry = PopupRegistry::new();
    let server = host::start(&settings, Arc::clone(&registry))?;
    let server_handle = server.handle();
    actix_web::rt::spawn(server);

    print_startup_info(action, &settings);
    let result = run_handshake(action, &settings, registry)
        .await
        .map_err(|e| io::Error::other(format!("{e:#}")));

    server_handle.stop(true).await;
    result
}

/// Run one handshake to its terminal state
///
/// # Errors
///
/// Returns an error if the handshake cannot start or ends in a failure
async fn run_handshake(
    action: AuthAction,
    settings: &Arc<PopauthSettings>,
    registry: Arc<PopupRegistry>,
) -> anyhow::Result<()> {
    let backend = HttpAuthBackend::from_settings(&settings.backend)
        .context("Failed to initialize backend client")?;
    let store = FileStore::new(&settings.storage.directory);
    let feedback = Feedback::logging();

    let reconciler = SessionReconciler::new(
        Arc::new(backend),
        Arc::new(store),
        feedback.clone(),
        settings.completion_delay(),
        settings.application.home_path.clone(),
    );
    let controller = HandshakeController::new(
        Arc::clone(settings),
        Arc::new(ProfileFetcher::new(Arc::clone(settings))),
        reconciler,
        feedback,
        ViewScope::new(),
    );
    let host = LoopbackHost::new(registry, settings);

    // Ctrl-C tears the view down, which stops the poller
    let scope = controller.scope().clone();
    actix_web::rt::spawn(async move {
        if actix_web::rt::signal::ctrl_c().await.is_ok() {
            scope.teardown();
        }
    });

    let ticket = controller
        .begin(action, &host)?
        .ok_or_else(|| anyhow!("Could not open the system browser"))?;

    let outcome = ticket.outcome().await?;

    match outcome {
        HandshakeOutcome::Completed(record) => {
            println!(
                "✓ Logged in as {}",
                record.email().unwrap_or("<no email>")
            );
            Ok(())
        }
        HandshakeOutcome::Abandoned => {
            println!("Sign-in window closed before the login finished");
            Ok(())
        }
        HandshakeOutcome::Stopped => {
            println!("Sign-in cancelled");
            Ok(())
        }
        HandshakeOutcome::Denied(message) => Err(anyhow!("Sign-in denied: {message}")),
        HandshakeOutcome::ProfileFailed(err) => {
            Err(anyhow!(err).context(format!("Failed to fetch {action} profile")))
        }
        HandshakeOutcome::ReconcileFailed(err) => Err(err.into()),
    }
}

fn print_startup_info(action: AuthAction, settings: &PopauthSettings) {
    println!("Starting {action} sign-in");
    println!();
    println!("Loopback redirect host: http://{}", settings.get_bind_address());
    println!(
        "  GET  {}  - Redirect landing page",
        settings.application.redirect_url
    );
    println!("  POST {}  - Location report", host::REPORT_PATH);
    println!();
    println!("Backend: {}", settings.backend.base_url);
    println!("Session store: {}", settings.storage.directory);
    println!();
    println!("Finish the login in your browser, or press Ctrl-C to cancel.");
}
