//! # CLI Module
//!
//! Command-line entry point of the `ngsi-rest` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Start the broker front end on an address:
//!
//! ```bash
//! ngsi-rest serve --addr 0.0.0.0:1026
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Address to bind (env `NGSI_ADDR`, default `0.0.0.0:1026`)
//! - `--multitenancy` - Accept `NGSILD-Tenant` / `Fiware-Service`
//! - `--cors-origin <ORIGIN>` - Allowed CORS origin, `__ALL` for any
//! - `--cors-max-age <SECONDS>` - Preflight cache lifetime
//! - `--log-level <LEVEL>` - trace / debug / info / warn / error
//!
//! Every other setting comes from the environment, see [`crate::config`] and
//! [`crate::logging`]. Flags given on the command line win over the
//! environment.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{broker_config, run_cli, Cli, Commands};
