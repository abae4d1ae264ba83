//! # Store Router
//!
//! Decides, per operation, where a write goes and where a read comes from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   mode                    online    route()                             │
//! │   ─────────────────────   ──────    ─────────────────────────────────   │
//! │   local-mirror            any       LocalOnly  (local store only)       │
//! │   remote-authoritative    yes       Mirror     (local + remote)         │
//! │   remote-authoritative    no        Defer      (local + sync queue)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The router is a cheap cloneable handle. Every component reads it at the
//! start of each operation, so flipping the mode or the online flag takes
//! effect on the next call without restarting anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::StoreMode;

/// Where the current operation should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Local store is authoritative.
    LocalOnly,
    /// Remote is authoritative and reachable.
    Mirror,
    /// Remote is authoritative but unreachable; queue the remote half.
    Defer,
}

#[derive(Debug)]
struct RouterState {
    remote_authoritative: AtomicBool,
    online: AtomicBool,
}

/// Shared mode + connectivity state.
#[derive(Debug, Clone)]
pub struct StoreRouter {
    state: Arc<RouterState>,
}

impl StoreRouter {
    pub fn new(mode: StoreMode, online: bool) -> Self {
        StoreRouter {
            state: Arc::new(RouterState {
                remote_authoritative: AtomicBool::new(mode.is_remote_authoritative()),
                online: AtomicBool::new(online),
            }),
        }
    }

    /// Router that never touches the remote store.
    pub fn local() -> Self {
        Self::new(StoreMode::LocalMirror, false)
    }

    pub fn current_mode(&self) -> StoreMode {
        if self.state.remote_authoritative.load(Ordering::SeqCst) {
            StoreMode::RemoteAuthoritative
        } else {
            StoreMode::LocalMirror
        }
    }

    pub fn set_mode(&self, mode: StoreMode) {
        let previous = self
            .state
            .remote_authoritative
            .swap(mode.is_remote_authoritative(), Ordering::SeqCst);
        if previous != mode.is_remote_authoritative() {
            info!(%mode, "Store mode changed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.online.load(Ordering::SeqCst)
    }

    /// Updates the online flag. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.state.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "Remote connectivity changed");
        }
        previous != online
    }

    pub fn route(&self) -> Route {
        match (self.current_mode(), self.is_online()) {
            (StoreMode::LocalMirror, _) => Route::LocalOnly,
            (StoreMode::RemoteAuthoritative, true) => Route::Mirror,
            (StoreMode::RemoteAuthoritative, false) => Route::Defer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        let router = StoreRouter::new(StoreMode::LocalMirror, true);
        assert_eq!(router.route(), Route::LocalOnly);

        router.set_mode(StoreMode::RemoteAuthoritative);
        assert_eq!(router.route(), Route::Mirror);

        router.set_online(false);
        assert_eq!(router.route(), Route::Defer);
    }

    #[test]
    fn test_clones_share_state() {
        let router = StoreRouter::new(StoreMode::RemoteAuthoritative, true);
        let clone = router.clone();

        assert!(clone.set_online(false));
        assert!(!clone.set_online(false));
        assert!(!router.is_online());
        assert_eq!(router.route(), Route::Defer);
    }
}
