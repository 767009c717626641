//! Presentation collaborators
//!
//! Toasts, the progress bar, navigation and the completion delay are owned
//! by the hosting application. The handshake only talks to them through the
//! traits below, bundled in [`Feedback`]. A `Feedback` attached to a
//! [`ViewScope`] goes quiet once that view is torn down.

use crate::handshake::ViewScope;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Indeterminate,
    /// Percentage, clamped to 100
    Determinate(u8),
}

pub trait NotificationSink: Send + Sync {
    fn show(&self, message: &str, severity: Severity);
}

pub trait ProgressSink: Send + Sync {
    fn show(&self, mode: ProgressMode);
    fn hide(&self);
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Delay backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sinks that only write to the log, for headless runs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFeedback;

impl NotificationSink for LogFeedback {
    fn show(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => log::error!("[{severity}] {message}"),
            Severity::Warning => log::warn!("[{severity}] {message}"),
            Severity::Success | Severity::Info => log::info!("[{severity}] {message}"),
        }
    }
}

impl ProgressSink for LogFeedback {
    fn show(&self, mode: ProgressMode) {
        match mode {
            ProgressMode::Indeterminate => log::debug!("Progress: working..."),
            ProgressMode::Determinate(percent) => log::debug!("Progress: {percent}%"),
        }
    }

    fn hide(&self) {
        log::debug!("Progress: done");
    }
}

impl Navigator for LogFeedback {
    fn navigate(&self, path: &str) {
        log::info!("Navigating to {path}");
    }
}

/// The collaborator set handed to the reconciler and the controller
#[derive(Clone)]
pub struct Feedback {
    notifications: Arc<dyn NotificationSink>,
    progress: Arc<dyn ProgressSink>,
    navigator: Arc<dyn Navigator>,
    delay: Arc<dyn Delay>,
    view: Option<ViewScope>,
}

impl Feedback {
    #[must_use]
    pub fn new(
        notifications: Arc<dyn NotificationSink>,
        progress: Arc<dyn ProgressSink>,
        navigator: Arc<dyn Navigator>,
        delay: Arc<dyn Delay>,
    ) -> Self {
        Self {
            notifications,
            progress,
            navigator,
            delay,
            view: None,
        }
    }

    /// Log-only sinks with a real timer
    #[must_use]
    pub fn logging() -> Self {
        let sink = Arc::new(LogFeedback);
        Self::new(sink.clone(), sink.clone(), sink, Arc::new(TokioDelay))
    }

    /// Same sinks, silenced once `view` is torn down
    #[must_use]
    pub fn attached_to(&self, view: &ViewScope) -> Self {
        Self {
            view: Some(view.clone()),
            ..self.clone()
        }
    }

    /// `false` once the attached view is gone
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.view.as_ref().is_none_or(ViewScope::is_alive)
    }

    pub fn notify(&self, message: &str, severity: Severity) {
        if self.is_attached() {
            self.notifications.show(message, severity);
        }
    }

    pub fn show_progress(&self, mode: ProgressMode) {
        if self.is_attached() {
            let mode = match mode {
                ProgressMode::Determinate(percent) => ProgressMode::Determinate(percent.min(100)),
                ProgressMode::Indeterminate => ProgressMode::Indeterminate,
            };
            self.progress.show(mode);
        }
    }

    pub fn hide_progress(&self) {
        if self.is_attached() {
            self.progress.hide();
        }
    }

    pub fn navigate(&self, path: &str) {
        if self.is_attached() {
            self.navigator.navigate(path);
        }
    }

    pub async fn delay(&self, duration: Duration) {
        self.delay.sleep(duration).await;
    }
}
