//! Structured logging setup.
//!
//! | Variable          | Default | Meaning                              |
//! |-------------------|---------|--------------------------------------|
//! | `NGSI_LOG_LEVEL`  | `info`  | trace / debug / info / warn / error  |
//! | `NGSI_LOG_FORMAT` | `json`  | `json` or `pretty`                   |
//! | `NGSI_LOG_FILTER` | unset   | extra comma-separated directives     |
//!
//! `RUST_LOG`, when set, replaces the level.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra directives, comma-separated (`ngsi_rest::headers=debug,...`).
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("NGSI_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("NGSI_LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.format),
            target_filter: lookup("NGSI_LOG_FILTER").filter(|f| !f.trim().is_empty()),
            include_location: defaults.include_location,
        }
    }

    /// Pretty output with file and line, for local runs.
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Filter for this configuration. Invalid extra directives are reported
    /// on stderr and skipped.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let level = self.level();
        let mut env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

        // connection resets are logged by the transport at info
        env_filter = env_filter.add_directive(
            "may_minihttp::http_server=warn"
                .parse::<Directive>()
                .context("transport log directive")?,
        );

        if let Some(target_filter) = &self.target_filter {
            for filter in target_filter.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                match filter.parse::<Directive>() {
                    Ok(directive) => env_filter = env_filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
                }
            }
        }
        Ok(env_filter)
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when a subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use ngsi_rest::logging::{init_logging_with_config, LogConfig};
///
/// init_logging_with_config(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn reads_variables() {
        let config = LogConfig::from_lookup(|name| match name {
            "NGSI_LOG_LEVEL" => Some("DEBUG".into()),
            "NGSI_LOG_FORMAT" => Some("pretty".into()),
            "NGSI_LOG_FILTER" => Some("ngsi_rest::reply=trace".into()),
            _ => None,
        });
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.target_filter.as_deref(), Some("ngsi_rest::reply=trace"));
    }

    #[test]
    fn unknown_values_fall_back() {
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
        let config = LogConfig {
            log_level: "loud".into(),
            ..LogConfig::default()
        };
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn bad_directives_are_skipped() {
        let config = LogConfig {
            target_filter: Some("ngsi_rest=debug,=[".into()),
            ..LogConfig::default()
        };
        assert!(config.env_filter().is_ok());
    }
}
