//! Lifetime of the hosting view
//!
//! A [`ViewScope`] stands for the screen that started one or more
//! handshakes. Live pollers register with it; tearing the scope down stops
//! all of them and silences every [`crate::feedback::Feedback`] attached to it.

use crate::popup::PollerHandle;
use crate::utils::logging::LoggingHelper;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct ScopeInner {
    torn_down: AtomicBool,
    pollers: Mutex<HashMap<Uuid, PollerHandle>>,
}

#[derive(Clone, Default)]
pub struct ViewScope {
    inner: Arc<ScopeInner>,
}

impl ViewScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.inner.torn_down.load(Ordering::Acquire)
    }

    /// Track a running poller. A handle registered after teardown is
    /// stopped right away.
    pub fn register(&self, handle: PollerHandle) {
        if !self.is_alive() {
            handle.stop();
            return;
        }
        self.inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.session_id(), handle);
    }

    /// Drop a finished poller
    pub fn forget(&self, session_id: Uuid) {
        self.inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
    }

    /// Number of registered pollers still running
    #[must_use]
    pub fn live_pollers(&self) -> usize {
        self.inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|handle| handle.is_active())
            .count()
    }

    /// Tear the view down, force-stopping every live poller
    ///
    /// Returns how many pollers were actually stopped. Calling it again is a
    /// no-op returning 0.
    pub fn teardown(&self) -> usize {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let handles: Vec<PollerHandle> = self
            .inner
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let stopped = handles.iter().filter(|handle| handle.stop()).count();
        LoggingHelper::log_view_teardown(stopped);
        stopped
    }
}

impl std::fmt::Debug for ViewScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewScope")
            .field("alive", &self.is_alive())
            .field("live_pollers", &self.live_pollers())
            .finish()
    }
}
