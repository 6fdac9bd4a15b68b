use std::future::Future;

use async_trait::async_trait;

use crate::api::ApiError;

/// The source of truth behind a `DataStore`, usually one API endpoint.
///
/// Callers of one store share a single `fetch` at a time. A fetch overtaken
/// by `set` or `clear` is not awaited before the next one starts, so
/// implementations must tolerate overlapping calls.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, ApiError>;
}

/// Adapter that lets a closure returning a future act as a `Fetcher`.
pub struct FnFetcher<F> {
    f: F,
}

/// Wrap `f` as a `Fetcher`.
///
/// ```ignore
/// let fetcher = fetcher_fn(move || {
///     let api = api.clone();
///     async move { api.get_json::<Profile>("/client/profile").await }
/// });
/// ```
pub fn fetcher_fn<F, Fut, T>(f: F) -> FnFetcher<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    FnFetcher { f }
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, ApiError> {
        (self.f)().await
    }
}
