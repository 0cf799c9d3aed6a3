//! Stderr diagnostics for the comlink CLI.
//!
//! The library crates only emit `tracing` events; this module decides what
//! reaches the terminal. `--log-level` applies to the comlink crates
//! (frame drops, parser resets, port failures); dependencies such as
//! `serialport` are held at `warn`. Setting `COMLINK_LOG` to a full filter
//! directive (for example `comlink_frame=trace,info`) replaces both.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive that overrides
/// `--log-level`.
pub const LOG_ENV: &str = "COMLINK_LOG";

const COMLINK_TARGETS: [&str; 4] = [
    "comlink",
    "comlink_transport",
    "comlink_frame",
    "comlink_port",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event, for log collectors.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    /// Dropped frames, parser resets and dispatch failures.
    Debug,
    /// Every byte count moved across a transport.
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Event targets name the crate that dropped a frame; only worth the
    /// column when the events that carry them are shown.
    fn shows_targets(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Filter directive for `level` on the comlink crates, `warn` elsewhere.
pub fn default_directive(level: LogLevel) -> String {
    let level = level.as_filter().to_string().to_lowercase();
    let mut directive = String::from("warn");
    for target in COMLINK_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the stderr subscriber. Nothing the library crates log is
/// printed until this runs; a second call is a no-op.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .with_ansi(false)
        .with_target(level.shows_targets());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_comlink_crates() {
        let directive = default_directive(LogLevel::Debug);
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("comlink_frame=debug"));
        assert!(directive.contains("comlink_port=debug"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn targets_only_at_verbose_levels() {
        assert!(!LogLevel::Info.shows_targets());
        assert!(LogLevel::Trace.shows_targets());
    }
}
