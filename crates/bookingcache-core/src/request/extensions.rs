//! Standard extensions for `compose_request`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use super::pipeline::{Extension, Request};
use crate::cache::{Cacheable, DataStore};

/// How long a request may take before the loading indicator is shown
pub const LOADING_DELAY: Duration = Duration::from_millis(250);

/// Show a loading indicator for requests slower than `LOADING_DELAY`.
///
/// `set_loading(false)` is called up front and again on settlement, so fast
/// requests never flicker the indicator.
pub fn loading<'a, T>(set_loading: impl Fn(bool) + Send + Sync + 'a) -> Extension<'a, T>
where
    T: Send + 'a,
{
    loading_with_delay(LOADING_DELAY, set_loading)
}

pub fn loading_with_delay<'a, T>(
    delay: Duration,
    set_loading: impl Fn(bool) + Send + Sync + 'a,
) -> Extension<'a, T>
where
    T: Send + 'a,
{
    Box::new(move |mut request: Request<'a, T>| {
        async move {
            set_loading(false);

            let timer = tokio::time::sleep(delay);
            tokio::pin!(timer);
            let response = tokio::select! {
                biased;
                response = &mut request => response,
                _ = &mut timer => {
                    set_loading(true);
                    request.await
                }
            };

            set_loading(false);
            response
        }
        .boxed()
    })
}

/// A pull-to-refresh control
pub trait Refresher: Send + Sync {
    fn is_refreshing(&self) -> bool;
    fn complete(&self);
}

/// Plain `Refresher` for headless consumers and tests
#[derive(Debug, Default)]
pub struct RefresherState {
    refreshing: AtomicBool,
    completions: AtomicUsize,
}

impl RefresherState {
    pub fn new() -> Self {
        Self::default()
    }

    /// User pulled to refresh
    pub fn begin(&self) {
        self.refreshing.store(true, Ordering::SeqCst);
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl Refresher for RefresherState {
    fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    fn complete(&self) {
        self.refreshing.store(false, Ordering::SeqCst);
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Complete `refresher` when the request settles, if it is refreshing
pub fn with_refresher<'a, T>(refresher: Arc<dyn Refresher>) -> Extension<'a, T>
where
    T: Send + 'a,
{
    Box::new(move |request: Request<'a, T>| {
        async move {
            let response = request.await;
            if refresher.is_refreshing() {
                refresher.complete();
            }
            response
        }
        .boxed()
    })
}

/// Where user-facing alerts go
pub trait Alerter: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Logs alerts instead of showing them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerter;

impl Alerter for TracingAlerter {
    fn alert(&self, title: &str, message: &str) {
        warn!(title = %title, "{}", message);
    }
}

/// Alert errors the caller is expected to handle itself.
/// Errors handled globally (unreachable server, 5xx) are left alone.
pub fn alert_error<'a, T>(alerter: Arc<dyn Alerter>) -> Extension<'a, T>
where
    T: Send + 'a,
{
    Box::new(move |request: Request<'a, T>| {
        async move {
            let response = request.await;
            if let Some(error) = &response.error {
                if !error.handle_globally() {
                    alerter.alert("", &error.message());
                }
            }
            response
        }
        .boxed()
    })
}

/// Put a successful response into `store`, e.g. a profile update
/// refreshing the cached profile without another GET.
pub fn update_store_with_response<'a, T>(store: DataStore<T>) -> Extension<'a, T>
where
    T: Cacheable,
{
    Box::new(move |request: Request<'a, T>| {
        async move {
            let response = request.await;
            match &response.response {
                Some(value) if response.is_ok() => {
                    debug!(key = %store.key(), "Updating store from response");
                    store.set(value.clone()).await;
                }
                _ => {}
            }
            response
        }
        .boxed()
    })
}

// ============================================================================
// Tests
// ============================================================================
