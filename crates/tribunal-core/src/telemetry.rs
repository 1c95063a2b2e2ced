//! Tracing initialisation for tribunal binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable selecting JSON log lines when set to `json`.
pub const LOG_FORMAT_ENV: &str = "TRIBUNAL_LOG_FORMAT";

/// Whether `TRIBUNAL_LOG_FORMAT` asks for JSON output.
pub fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Initialise the global tracing subscriber.
///
/// * `json`: newline-delimited JSON log lines instead of the human format;
///   also enabled by `TRIBUNAL_LOG_FORMAT=json`.
/// * `level`: default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let json = json || json_requested();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
