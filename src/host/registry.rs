//! Popups opened through the loopback host, and what their redirect page
//! has reported so far

use crate::popup::{ChildWindow, LocationError};
use crate::utils::logging::LoggingHelper;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;
use uuid::Uuid;

/// What the redirect page posts back
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectReport {
    /// The page's full `location.href`, fragment included
    pub href: String,
    #[serde(default)]
    pub event: ReportEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportEvent {
    /// The page finished loading
    #[default]
    Load,
    /// The page is going away
    Pagehide,
}

#[derive(Debug, Default)]
struct WindowSlot {
    /// `None` until the redirect page reports
    location: Option<Url>,
    /// A loaded location nobody has read yet
    unread: bool,
    closed: bool,
}

impl WindowSlot {
    /// A close waits until the last loaded location has been read
    fn reads_as_closed(&self) -> bool {
        self.closed && !self.unread
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    windows: HashMap<Uuid, WindowSlot>,
    latest: Option<Uuid>,
}

/// Shared between the HTTP handlers and every [`LoopbackWindow`]
///
/// The redirect URL carries no window id, so a report always goes to the
/// most recently opened window that is still tracked.
#[derive(Debug, Default)]
pub struct PopupRegistry {
    inner: Mutex<RegistryInner>,
}

impl PopupRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new window and make it the report target
    #[must_use]
    pub fn open_window(self: &Arc<Self>) -> LoopbackWindow {
        let id = Uuid::new_v4();
        let mut inner = self.lock();
        inner.windows.insert(id, WindowSlot::default());
        inner.latest = Some(id);
        LoopbackWindow {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Apply a report from the redirect page
    ///
    /// Returns the window it was applied to, or `None` when no window is
    /// waiting.
    pub fn report(&self, location: Url, event: ReportEvent) -> Option<Uuid> {
        let mut inner = self.lock();
        let id = inner.latest?;
        let slot = inner.windows.get_mut(&id)?;
        match event {
            ReportEvent::Load => {
                slot.location = Some(location);
                slot.unread = true;
            }
            ReportEvent::Pagehide => {
                if slot.location.is_none() {
                    slot.location = Some(location);
                }
                slot.closed = true;
            }
        }
        drop(inner);
        LoggingHelper::log_redirect_reported(id);
        Some(id)
    }

    /// Number of windows still tracked
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.lock().windows.len()
    }

    fn forget(&self, id: Uuid) {
        let mut inner = self.lock();
        inner.windows.remove(&id);
        if inner.latest == Some(id) {
            inner.latest = None;
        }
    }

    fn with_slot<T>(&self, id: Uuid, f: impl FnOnce(&mut WindowSlot) -> T) -> Option<T> {
        self.lock().windows.get_mut(&id).map(f)
    }
}

/// A browser tab opened by the loopback host
///
/// Reads fail with [`LocationError::CrossOrigin`] until the redirect page
/// reports, the same way a real popup hides a foreign origin. Dropping the
/// handle stops tracking the tab without touching the browser.
#[derive(Debug)]
pub struct LoopbackWindow {
    id: Uuid,
    registry: Arc<PopupRegistry>,
}

impl LoopbackWindow {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl ChildWindow for LoopbackWindow {
    fn is_closed(&self) -> bool {
        self.registry
            .with_slot(self.id, |slot| slot.reads_as_closed())
            .unwrap_or(true)
    }

    fn location(&self) -> Result<Url, LocationError> {
        let read = self.registry.with_slot(self.id, |slot| {
            slot.unread = false;
            slot.location.clone()
        });
        match read {
            Some(Some(url)) => Ok(url),
            Some(None) => Err(LocationError::CrossOrigin),
            None => Err(LocationError::Unavailable("window is no longer tracked".to_string())),
        }
    }

    fn close(&mut self) {
        // The tab closes itself after reporting
        self.registry.forget(self.id);
    }
}

impl Drop for LoopbackWindow {
    fn drop(&mut self) {
        self.registry.forget(self.id);
    }
}
