use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::backend::MemoryBackend;
use crate::config::{BrokerConfig, ConfigError};
use crate::logging::{init_logging_with_config, LogConfig};
use crate::metrics::CounterMetrics;
use crate::pipeline::Pipeline;
use crate::reply::cors::CorsPolicyBuilder;
use crate::server::{AppService, HttpServer};

/// Command-line interface of the broker
#[derive(Parser)]
#[command(name = "ngsi-rest")]
#[command(version, about = "NGSI / NGSI-LD REST broker front end", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the NGSIv1, NGSIv2 and NGSI-LD REST API
    Serve {
        /// Address and port to bind the server to
        #[arg(long, env = "NGSI_ADDR", default_value = "0.0.0.0:1026")]
        addr: String,

        /// Accept tenant headers
        #[arg(long, default_value_t = false)]
        multitenancy: bool,

        /// Allowed CORS origin (`__ALL` for any); enables CORS
        #[arg(long)]
        cors_origin: Option<String>,

        /// CORS preflight cache lifetime in seconds
        #[arg(long)]
        cors_max_age: Option<u32>,

        /// Log level: trace, debug, info, warn or error
        #[arg(long)]
        log_level: Option<String>,
    },
}

/// Apply command-line overrides to the configuration read from the
/// environment.
///
/// `--cors-max-age` without `--cors-origin` only changes an already
/// configured policy.
pub fn broker_config(
    mut base: BrokerConfig,
    multitenancy: bool,
    cors_origin: Option<&str>,
    cors_max_age: Option<u32>,
) -> Result<BrokerConfig, ConfigError> {
    if multitenancy {
        base.multitenancy = true;
    }
    match (cors_origin, base.cors.as_mut()) {
        (Some(origin), _) => {
            let mut builder = CorsPolicyBuilder::new().allowed_origin(origin);
            if let Some(max_age) = cors_max_age {
                builder = builder.max_age(max_age);
            }
            base.cors = Some(builder.build()?);
        }
        (None, Some(policy)) => {
            if let Some(max_age) = cors_max_age {
                policy.max_age = max_age;
            }
        }
        (None, None) => {}
    }
    Ok(base)
}

/// Execute the CLI command provided by the user
///
/// # Errors
///
/// Returns an error if:
/// - logging cannot be initialized
/// - the environment or flags hold invalid configuration
/// - the address cannot be bound
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            addr,
            multitenancy,
            cors_origin,
            cors_max_age,
            log_level,
        } => {
            let mut log_config = LogConfig::from_env();
            if let Some(level) = log_level {
                log_config.log_level = level;
            }
            init_logging_with_config(&log_config)?;

            let config = broker_config(
                BrokerConfig::from_env()?,
                multitenancy,
                cors_origin.as_deref(),
                cors_max_age,
            )?;
            may::config().set_stack_size(config.stack_size);
            info!(
                multitenancy = config.multitenancy,
                cors = config.cors.is_some(),
                stack_size = config.stack_size,
                max_response_size = config.max_response_size,
                "Broker configuration loaded"
            );

            let pipeline = Pipeline::new(Arc::new(config), Arc::new(MemoryBackend::new()))
                .with_metrics(Arc::new(CounterMetrics::new()));
            let handle = HttpServer(AppService::new(pipeline))
                .start(addr.as_str())
                .with_context(|| format!("failed to bind {addr}"))?;
            handle
                .join()
                .map_err(|e| anyhow!("server coroutine panicked: {e:?}"))
        }
    }
}
