//! Unit tests for CLI commands

use crate::cli::{broker_config, Cli, Commands};
use crate::config::BrokerConfig;
use crate::reply::cors::{AllowedOrigin, DEFAULT_MAX_AGE};
use clap::Parser;

#[test]
fn test_serve_defaults() {
    let cli = Cli::try_parse_from(["ngsi-rest", "serve"]).unwrap();
    match cli.command {
        Commands::Serve {
            addr,
            multitenancy,
            cors_origin,
            cors_max_age,
            log_level,
        } => {
            if std::env::var("NGSI_ADDR").is_err() {
                assert_eq!(addr, "0.0.0.0:1026");
            }
            assert!(!multitenancy);
            assert!(cors_origin.is_none());
            assert!(cors_max_age.is_none());
            assert!(log_level.is_none());
        }
    }
}

#[test]
fn test_serve_with_flags() {
    let cli = Cli::try_parse_from([
        "ngsi-rest",
        "serve",
        "--addr",
        "127.0.0.1:1026",
        "--multitenancy",
        "--cors-origin",
        "__ALL",
        "--cors-max-age",
        "600",
        "--log-level",
        "debug",
    ])
    .unwrap();

    let Commands::Serve {
        addr,
        multitenancy,
        cors_origin,
        cors_max_age,
        log_level,
    } = cli.command;
    assert_eq!(addr, "127.0.0.1:1026");
    assert!(multitenancy);
    assert_eq!(cors_origin.as_deref(), Some("__ALL"));
    assert_eq!(cors_max_age, Some(600));
    assert_eq!(log_level.as_deref(), Some("debug"));
}

#[test]
fn test_flags_override_environment() {
    let config = broker_config(BrokerConfig::default(), true, Some("https://a.example"), Some(60)).unwrap();
    assert!(config.multitenancy);
    let cors = config.cors.unwrap();
    assert_eq!(cors.allowed_origin, AllowedOrigin::Exact("https://a.example".into()));
    assert_eq!(cors.max_age, 60);
}

#[test]
fn test_max_age_alone_needs_a_policy() {
    let config = broker_config(BrokerConfig::default(), false, None, Some(60)).unwrap();
    assert!(config.cors.is_none());

    let with_cors = broker_config(BrokerConfig::default(), false, Some("__ALL"), None).unwrap();
    assert_eq!(with_cors.cors.as_ref().unwrap().max_age, DEFAULT_MAX_AGE);
    let adjusted = broker_config(with_cors, false, None, Some(5)).unwrap();
    assert_eq!(adjusted.cors.unwrap().max_age, 5);
}

#[test]
fn test_bad_origin_is_rejected() {
    assert!(broker_config(BrokerConfig::default(), false, Some("not a url"), None).is_err());
}
