use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use crate::api::ApiResponse;

/// One pending request, as seen by extensions
pub type Request<'a, T> = BoxFuture<'a, ApiResponse<T>>;

/// Wraps a request with extra behavior around its settlement.
///
/// Extensions must not poll the request themselves; they return a new
/// request that drives the wrapped one exactly once.
pub type Extension<'a, T> = Box<dyn FnOnce(Request<'a, T>) -> Request<'a, T> + Send + 'a>;

/// Apply `extensions` in order around `request` and drive it to completion.
///
/// The first extension wraps the request directly and the last one is the
/// outermost: `extN(...ext1(request))`.
///
/// ```ignore
/// let profile = compose_request!(
///     loading(move |on| spinner.set(on)),
///     alert_error(alerter.clone()),
///     store.get(GetOptions::cached()),
/// )
/// .await;
/// ```
pub async fn compose_request<'a, T, F>(extensions: Vec<Extension<'a, T>>, request: F) -> ApiResponse<T>
where
    T: Send + 'a,
    F: Future<Output = ApiResponse<T>> + Send + 'a,
{
    if extensions.is_empty() {
        warn!("compose_request called without extensions; await the request directly instead");
    }

    let request = extensions
        .into_iter()
        .fold(request.boxed(), |request, extension| extension(request));
    request.await
}

/// Macro form of [`compose_request`]: extensions first, the request last.
#[macro_export]
macro_rules! compose_request {
    (@collect [$($ext:expr,)*] $request:expr $(,)?) => {
        $crate::request::compose_request(::std::vec![$($ext),*], $request)
    };
    (@collect [$($ext:expr,)*] $next:expr, $($rest:tt)+) => {
        $crate::compose_request!(@collect [$($ext,)* $next,] $($rest)+)
    };
    ($($args:tt)+) => {
        $crate::compose_request!(@collect [] $($args)+)
    };
}

// ============================================================================
// Tests
// ============================================================================
