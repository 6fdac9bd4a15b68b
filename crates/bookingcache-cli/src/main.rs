//! bookingcache - fetch a booking API endpoint through a cached data store.
//!
//! ```text
//! bookingcache <path> [--refresh]
//! bookingcache --clear
//! ```
//!
//! The response is printed as JSON. Values are kept in the durable cache
//! directory, so a second run within the TTL (or while offline) is served
//! from disk.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookingcache_core::api::ApiClient;
use bookingcache_core::request::{alert_error, loading_with_delay, TracingAlerter};
use bookingcache_core::cache::STORAGE_KEY_PREFIX;
use bookingcache_core::{compose_request, AppConfig, FileStorage, GetOptions, StoreRegistry};

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "bookingcache.log";

struct Args {
    path: Option<String>,
    refresh: bool,
    clear: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        path: None,
        refresh: false,
        clear: false,
    };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--refresh" => args.refresh = true,
            "--clear" => args.clear = true,
            flag if flag.starts_with("--") => bail!("Unknown flag: {}", flag),
            path if args.path.is_none() => args.path = Some(path.to_string()),
            extra => bail!("Unexpected argument: {}", extra),
        }
    }

    if args.path.is_none() && !args.clear {
        bail!("Usage: bookingcache <path> [--refresh] | bookingcache --clear");
    }
    Ok(args)
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file appender and must outlive `main`'s work.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load()?;
    let _log_guard = init_tracing(&config);
    let args = parse_args()?;

    let cache_dir = config.cache_dir()?;
    let storage = Arc::new(
        FileStorage::new(cache_dir.clone())
            .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?,
    );
    let registry = StoreRegistry::with_storage(storage.clone());
    debug!(cache_dir = %cache_dir.display(), "Durable cache ready");

    let Some(path) = args.path else {
        // --clear only: remove every store's record, nothing else in the directory
        let removed = storage
            .clear_prefix(STORAGE_KEY_PREFIX)
            .await
            .with_context(|| format!("Failed to clear {}", cache_dir.display()))?;
        info!(cache_dir = %cache_dir.display(), removed, "Cache cleared");
        return Ok(());
    };

    let base_url = config
        .api_base_url
        .clone()
        .context("No API base URL configured (set BOOKINGCACHE_API_BASE_URL)")?;
    let api = ApiClient::new(base_url)?;

    let store = registry.register::<Value>(
        path.trim_matches('/').replace('/', "_"),
        api.fetcher(path.clone()),
        config.store_config(),
    )?;

    if args.clear {
        store.clear().await;
    }

    let options = if args.refresh {
        GetOptions::refresh()
    } else {
        GetOptions::cached()
    };
    let result = compose_request!(
        loading_with_delay(config.loading_delay(), |on| {
            if on {
                eprintln!("Loading {}...", path);
            }
        }),
        alert_error(Arc::new(TracingAlerter)),
        store.get(options),
    )
    .await;

    if let Some(age) = store.cached_age() {
        debug!(age_secs = age.as_secs(), "Cached value age");
    }

    if let Some(response) = &result.response {
        println!("{}", serde_json::to_string_pretty(response)?);
    }
    if let Some(error) = result.error {
        if result.response.is_some() {
            eprintln!("Showing cached data: {}", error.message());
        } else {
            bail!(error);
        }
    }

    Ok(())
}
