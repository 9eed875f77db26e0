//! # Router Module
//!
//! Maps a request's verb and path to the service routine that answers it.
//!
//! ## Overview
//!
//! The broker's service table is a flat list of [`RestService`] entries. Each
//! entry names a verb, a path template and the routine to run. Templates are
//! literal path segments with `*` standing for exactly one segment:
//!
//! ```text
//! GET  /v2/entities
//! GET  /ngsi-ld/v1/csourceRegistrations/*
//! POST /v1/updateContextSubscription
//! ```
//!
//! Segments captured by `*` are handed to the routine through
//! [`crate::state::ConnectionState::wildcards`], in template order.
//!
//! ## Outcomes
//!
//! [`Router::route`] distinguishes three cases:
//!
//! - a template and verb matched: [`RouteResult::Matched`]
//! - a template matched for other verbs only: [`RouteResult::MethodNotAllowed`],
//!   carrying the verbs for the `Allow` header
//! - nothing matched: [`RouteResult::NotFound`]
//!
//! ## Performance
//!
//! The table is compiled once at startup into pre-split segments. Matching is
//! a linear scan with no allocation on the hit path beyond the inline
//! wildcard vector.

mod core;
#[cfg(test)]
mod tests;

pub use core::{allow_header, AllowedVerbs, RestService, RouteMatch, RouteResult, Router, ServiceRoutine};
