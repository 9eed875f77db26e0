//! # ngsi-rest
//!
//! **ngsi-rest** is the HTTP boundary layer of an NGSI / NGSI-LD context broker,
//! running one `may` coroutine per request on top of `may_minihttp`.
//!
//! ## Overview
//!
//! Every request gets a [`ConnectionState`]: a per-request aggregate that
//! borrows the raw header values, holds the parsed URI parameters and payload,
//! and collects what the reply will carry (status, content type, staged
//! headers, answer). The state is filled by the header receiver, read and
//! updated by a service routine, consumed by the reply builder and finally
//! torn down, releasing everything registered for deferred release.
//!
//! ## Architecture
//!
//! - **[`mime`]** - the closed set of media types and their names
//! - **[`negotiate`]** - `Accept` and `Content-Type` parsing
//! - **[`state`]** - [`ConnectionState`], URI parameters, problem details,
//!   deferred releases
//! - **[`headers`]** - the per-header receiver: scopes, tenants, negotiation
//! - **[`reply`]** - the reply builder, CORS policy and NGSIv1 error envelopes
//! - **[`router`]** - the service table and path matching
//! - **[`routines`]** - the service routines
//! - **[`backend`]** - the storage seam and an in-memory backend
//! - **[`pipeline`]** - one request from raw input to queued reply
//! - **[`server`]** - the `may_minihttp` service and server handle
//! - **[`config`]**, **[`logging`]**, **[`metrics`]**, **[`cli`]** - process setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may_minihttp)
//!     participant Headers as Header Receiver
//!     participant Router as Router
//!     participant Routine as Service Routine
//!     participant Reply as ReplyBuilder
//!
//!     Client->>Server: GET /v2/entities?type=Room
//!     Server->>Server: Copy request (RawRequest)
//!     Server->>Headers: receive_header(name, value) per header
//!     Headers->>Headers: Scope split, tenant check,<br/>Accept / Content-Type
//!
//!     alt Header rejected
//!         Headers-->>Reply: status 400 + problem
//!     end
//!
//!     Server->>Router: route(verb, path)
//!     alt Unknown path or verb
//!         Router-->>Reply: 400 / 404 / 405 + problem
//!     end
//!
//!     Router->>Routine: routine(state, backend)
//!     Routine-->>Reply: answer, or problem
//!     Reply->>Reply: Staged headers, Content-Type,<br/>CORS
//!     Reply-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ngsi_rest::backend::MemoryBackend;
//! use ngsi_rest::config::BrokerConfig;
//! use ngsi_rest::pipeline::Pipeline;
//! use ngsi_rest::server::{AppService, HttpServer};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Arc::new(BrokerConfig::from_env()?);
//! let pipeline = Pipeline::new(config, Arc::new(MemoryBackend::new()));
//! let handle = HttpServer(AppService::new(pipeline)).start("0.0.0.0:1026")?;
//! handle.wait_ready()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Request coroutines run on a fixed stack (`NGSI_STACK_SIZE`, default
//! `0x8000`). The connection state keeps its small collections inline
//! (`SmallVec`) so that a request does not allocate for scopes, service paths
//! or staged headers in the common case.

pub mod backend;
pub mod cli;
pub mod config;
pub mod headers;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod mime;
pub mod negotiate;
pub mod pipeline;
pub mod reply;
pub mod router;
pub mod routines;
pub mod server;
pub mod state;

pub use backend::{Backend, MemoryBackend};
pub use config::BrokerConfig;
pub use headers::{receive_header, HeaderAck};
pub use mime::MimeType;
pub use pipeline::Pipeline;
pub use reply::{OutgoingResponse, ReplyBuilder, ReplyOutcome, ReplySink};
pub use state::{ApiVersion, ConnectionState, ProblemDetails, ProblemKind, Verb};
