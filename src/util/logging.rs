// noveldup - util/logging.rs
//
// Structured logging. The library never installs a global subscriber on its
// own behalf — only a binary or test harness embedding this crate decides
// when and how to initialise tracing. `init_for_tests` exists purely so
// unit and integration tests can opt into visible output without
// duplicating the filter-priority logic at every call site.

use tracing_subscriber::EnvFilter;

/// Install a `tracing-subscriber` `fmt` layer for test runs.
///
/// Priority: `RUST_LOG` env var, else [`super::constants::DEFAULT_LOG_LEVEL`].
/// Safe to call more than once per process: `tracing_subscriber`'s global
/// default can only be installed once, and later calls silently no-op.
pub fn init_for_tests() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init();
}
