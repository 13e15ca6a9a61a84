//! Tracing setup. Filter directives come from `CMON_LOG`; without it the
//! level is `warn`, or `debug` under `--verbose`. Output goes to stderr so
//! JSON on stdout stays clean.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CMON_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Call once, at startup.
pub fn init(verbose: bool) {
    fmt()
        .with_env_filter(build_filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
