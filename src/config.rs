//! # Broker Configuration
//!
//! Process-wide settings, established at startup and read-only afterwards.
//! The server shares one [`BrokerConfig`] between all request coroutines as an
//! `Arc<BrokerConfig>`.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `NGSI_MULTITENANCY` | accept tenant headers (`true`/`false`) | `false` |
//! | `NGSI_CORS_ORIGIN` | allowed origin, or `__ALL` for any origin | unset (CORS off) |
//! | `NGSI_CORS_MAX_AGE` | preflight cache, seconds | `86400` |
//! | `NGSI_MAX_RESPONSE_SIZE` | largest answer the transport accepts, bytes | 16 MiB |
//! | `NGSI_STACK_SIZE` | coroutine stack size, decimal or `0x` hex | `0x8000` |
//! | `NGSI_METRICS` | count reply sizes and transport errors | `true` |
//!
//! ```bash
//! export NGSI_MULTITENANCY=true
//! export NGSI_CORS_ORIGIN=__ALL
//! export NGSI_STACK_SIZE=0x10000
//! ngsi-rest serve --addr 0.0.0.0:1026
//! ```

use std::env;
use std::fmt;

use crate::reply::cors::{CorsConfigError, CorsPolicy, CorsPolicyBuilder};

pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_STACK_SIZE: usize = 0x8000;

/// Configuration error raised while loading [`BrokerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A boolean variable holds something other than `true`/`false`/`1`/`0`.
    InvalidBool { var: &'static str, value: String },
    /// A numeric variable could not be parsed.
    InvalidNumber { var: &'static str, value: String },
    /// The CORS section was rejected by [`CorsPolicyBuilder::build`].
    Cors(CorsConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBool { var, value } => {
                write!(f, "Configuration error: {var} must be true or false, got '{value}'")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "Configuration error: {var} must be a number, got '{value}'")
            }
            ConfigError::Cors(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Cors(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CorsConfigError> for ConfigError {
    fn from(err: CorsConfigError) -> Self {
        ConfigError::Cors(err)
    }
}

/// Read-only broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Accept `NGSILD-Tenant` / `Fiware-Service`.
    pub multitenancy: bool,
    /// `None` disables CORS.
    pub cors: Option<CorsPolicy>,
    /// Answers larger than this fail transport construction.
    pub max_response_size: usize,
    /// Coroutine stack size in bytes.
    pub stack_size: usize,
    /// Record reply metrics.
    pub metrics: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            multitenancy: false,
            cors: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            metrics: true,
        }
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_size(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

impl BrokerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from any variable source. Unset variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BrokerConfig::default();

        if let Some(v) = lookup("NGSI_MULTITENANCY") {
            config.multitenancy = parse_bool("NGSI_MULTITENANCY", &v)?;
        }
        if let Some(v) = lookup("NGSI_METRICS") {
            config.metrics = parse_bool("NGSI_METRICS", &v)?;
        }
        if let Some(v) = lookup("NGSI_MAX_RESPONSE_SIZE") {
            config.max_response_size = parse_size("NGSI_MAX_RESPONSE_SIZE", &v)?;
        }
        if let Some(v) = lookup("NGSI_STACK_SIZE") {
            config.stack_size = parse_size("NGSI_STACK_SIZE", &v)?;
        }

        if let Some(origin) = lookup("NGSI_CORS_ORIGIN").filter(|o| !o.trim().is_empty()) {
            let mut builder = CorsPolicyBuilder::new().allowed_origin(origin.trim());
            if let Some(v) = lookup("NGSI_CORS_MAX_AGE") {
                let max_age = parse_size("NGSI_CORS_MAX_AGE", &v)?;
                let max_age = u32::try_from(max_age).map_err(|_| ConfigError::InvalidNumber {
                    var: "NGSI_CORS_MAX_AGE",
                    value: v,
                })?;
                builder = builder.max_age(max_age);
            }
            config.cors = Some(builder.build()?);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BrokerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BrokerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert!(!config.multitenancy);
        assert!(config.cors.is_none());
        assert!(config.metrics);
        assert_eq!(config.max_response_size, DEFAULT_MAX_RESPONSE_SIZE);
        assert_eq!(config.stack_size, 0x8000);
    }

    #[test]
    fn stack_size_hex_and_decimal() {
        assert_eq!(load(&[("NGSI_STACK_SIZE", "0x4000")]).unwrap().stack_size, 0x4000);
        assert_eq!(load(&[("NGSI_STACK_SIZE", "65536")]).unwrap().stack_size, 65536);
        assert!(matches!(
            load(&[("NGSI_STACK_SIZE", "big")]),
            Err(ConfigError::InvalidNumber { var: "NGSI_STACK_SIZE", .. })
        ));
    }

    #[test]
    fn bad_boolean_is_rejected() {
        let err = load(&[("NGSI_MULTITENANCY", "maybe")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBool {
                var: "NGSI_MULTITENANCY",
                value: "maybe".into()
            }
        );
    }

    #[test]
    fn cors_wildcard_with_max_age() {
        let config = load(&[("NGSI_CORS_ORIGIN", "__ALL"), ("NGSI_CORS_MAX_AGE", "600")]).unwrap();
        let cors = config.cors.unwrap();
        assert!(cors.is_wildcard());
        assert_eq!(cors.max_age, 600);
    }

    #[test]
    fn cors_invalid_origin() {
        let err = load(&[("NGSI_CORS_ORIGIN", "example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Cors(CorsConfigError::InvalidOriginFormat { .. })));
    }
}
