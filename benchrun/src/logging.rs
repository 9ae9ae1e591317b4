//! Diagnostic tracing for experiment runs.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. It is not
//! part of the experiment's product output: result files under the output
//! root are the only durable record of a run.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVES: &str = "warn";

/// Install the global subscriber.
///
/// Events carry the worker thread name (`benchrun-worker-<i>`) so interleaved
/// runs can be told apart. If the embedding application already installed a
/// subscriber, that one stays in place.
///
/// # Example
/// ```bash
/// RUST_LOG=benchrun=info benchrun status
/// ```
pub fn init() {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .compact(),
        )
        .try_init();
}

/// Filter from `RUST_LOG` directives; unset, blank or unparsable falls back
/// to `warn`.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
