//! Request pipeline: cross-cutting UI behavior composed around one request.
//!
//! `compose_request` (and the `compose_request!` macro) wraps a request in
//! extensions such as `loading`, `with_refresher`, `alert_error` and
//! `update_store_with_response`, then drives it exactly once.
//! `ActionGuard` keeps user-triggered actions from running twice.

pub mod extensions;
pub mod guard;
pub mod pipeline;

pub use extensions::{
    alert_error, loading, loading_with_delay, update_store_with_response, with_refresher, Alerter,
    Refresher, RefresherState, TracingAlerter, LOADING_DELAY,
};
pub use guard::{ActionGuard, RELEASE_DELAY};
pub use pipeline::{compose_request, Extension, Request};
