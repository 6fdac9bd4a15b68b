use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// How long the guard stays engaged after the action settles, so taps
/// queued behind the action's UI updates are still swallowed
pub const RELEASE_DELAY: Duration = Duration::from_millis(100);

/// Re-entry guard for user-triggered async actions (submit buttons and the
/// like). While an action runs, further `run` calls are rejected.
#[derive(Debug, Clone, Default)]
pub struct ActionGuard {
    engaged: Arc<AtomicBool>,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the trigger should render disabled
    pub fn is_disabled(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Run `action` unless another action is in progress.
    ///
    /// Returns `None` without polling `action` when rejected. The guard is
    /// released `RELEASE_DELAY` after the action settles, also when the
    /// action panics or the returned future is dropped.
    pub async fn run<F>(&self, action: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self
            .engaged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Action already in progress, ignoring");
            return None;
        }

        let _release = Release {
            engaged: Arc::clone(&self.engaged),
        };
        Some(action.await)
    }
}

struct Release {
    engaged: Arc<AtomicBool>,
}

impl Drop for Release {
    fn drop(&mut self) {
        let engaged = Arc::clone(&self.engaged);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(RELEASE_DELAY).await;
                    engaged.store(false, Ordering::SeqCst);
                });
            }
            Err(_) => engaged.store(false, Ordering::SeqCst),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
