//! `may_minihttp` transport: request copy, reply sink, service and server
//! handle.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::RawRequest;
pub use response::{header_line, status_reason, ResponseSink};
pub use service::AppService;
