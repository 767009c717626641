//! Child browsing context abstraction
//!
//! The application never owns the popup: the user or the browser can close it
//! at any time, and while it shows the provider's own pages its location is
//! unreadable. [`ChildWindow`] models exactly those three observations, and
//! [`PopupHost`] is whatever can open one (a webview shell, the loopback host
//! in [`crate::host`], or a fake in tests).

use std::fmt;
use url::Url;

/// Why the child's location could not be read on this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// The child is still on another origin. Expected while the user is
    /// talking to the identity provider.
    CrossOrigin,
    /// Anything else the host reported; only this tick is affected.
    Unavailable(String),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::CrossOrigin => write!(f, "Cross-origin location access blocked"),
            LocationError::Unavailable(msg) => write!(f, "Location unavailable: {msg}"),
        }
    }
}

impl std::error::Error for LocationError {}

/// Handle to an open popup
///
/// Implementations are observers, not owners: dropping the handle must not
/// close the popup, and `is_closed` must keep answering after the user
/// closed it.
pub trait ChildWindow: Send {
    fn is_closed(&self) -> bool;

    /// Current location of the child
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::CrossOrigin`] while the child shows a page of
    /// another origin, or [`LocationError::Unavailable`] for host failures.
    fn location(&self) -> Result<Url, LocationError>;

    /// Ask the child to close. Best effort, never fails.
    fn close(&mut self);
}

/// Screen geometry used to center the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Window features passed to [`PopupHost::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: i64,
    pub top: i64,
}

impl PopupFeatures {
    /// Fixed-size popup centered on `screen`. Offsets go negative when the
    /// screen is smaller than the popup.
    #[must_use]
    pub fn centered(width: u32, height: u32, screen: ScreenSize) -> Self {
        Self {
            width,
            height,
            left: (i64::from(screen.width) - i64::from(width)) / 2,
            top: (i64::from(screen.height) - i64::from(height)) / 2,
        }
    }
}

impl fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={},height={},top={},left={}",
            self.width, self.height, self.top, self.left
        )
    }
}

/// Something that can open top-level child browsing contexts
pub trait PopupHost {
    fn screen_size(&self) -> ScreenSize;

    /// Open `url` in a new context named `name`
    ///
    /// Returns `None` when the popup was blocked.
    fn open(&self, url: &Url, name: &str, features: &PopupFeatures) -> Option<Box<dyn ChildWindow>>;
}
