//! Tracing subscriber setup for the `gti` binary.
//!
//! `RUST_LOG` sets the filter (default `info`); `LOG_FORMAT=json` switches
//! from the human-readable output to one JSON object per line. Logs go to
//! stderr so frame output on stdout stays pipeable.

use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
}
