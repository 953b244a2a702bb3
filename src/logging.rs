//! Tracing bootstrap for the command line front end.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,inapp_billing=info";

/// Install a global subscriber writing to stderr.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `INAPP_BILLING_LOG`
/// 3) internal default filter
///
/// Stdout is reserved for the purchase report, so logs never go there.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(value) = env::var("INAPP_BILLING_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
