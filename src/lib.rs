//! # restflow
//!
//! **restflow** is a per-request dispatch engine for Rust HTTP services,
//! built on the `may` coroutine runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! Every inbound request gets one [`dispatch::RequestContext`] and one
//! cooperative dispatch chain: an ordered list of before-handlers runs
//! first, then exactly one terminal route is invoked through the
//! [`registry::Registry`] collaborator, and a not-found fallback fires if
//! the route ran without closing the response. Layered on top is an
//! `Accept`-header negotiation facility that selects a response
//! representation by the order the client listed acceptable types.
//!
//! ## Architecture
//!
//! - **[`dispatch`]** — the chain state machine, the request-scoped context
//!   facade with its populate-once caches, body accumulation, and the
//!   staged response handle
//! - **[`negotiation`]** — `Accept` header parsing and preferred
//!   content-type selection
//! - **[`registry`]** — the before-handler/route collaborator seam and an
//!   in-memory implementation
//! - **[`server`]** — HTTP adapter built on `may_minihttp`
//! - **[`ids`]** — ULID request identifiers for log correlation
//! - **[`runtime_config`]** — environment-driven runtime settings
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::Method;
//! use restflow::registry::{BeforeHandler, HandlerRegistry};
//! use restflow::server::{AppService, HttpServer};
//! use serde_json::json;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.add_before(BeforeHandler::new(|ctx| {
//!     // pre-processing, then continue the chain
//!     ctx.advance();
//! }));
//! registry.add_route(Method::GET, "/health", |ctx| {
//!     ctx.send(json!({ "status": "ok" }));
//! });
//!
//! let service = AppService::new(Arc::new(registry));
//! let handle = HttpServer(service).start("0.0.0.0:8080").unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Dispatch Model
//!
//! The chain is cooperative: it makes no progress unless a handler calls
//! `advance()` (directly, or from a downstream completion) or closes the
//! response. A response can close at any point — every re-entry into
//! `advance()` re-checks the closed flag first, so no work happens after
//! close. There is no internal timeout: a handler that neither advances nor
//! closes stalls its chain, and a supervising layer has to impose its own
//! deadline.
//!
//! ## Runtime Considerations
//!
//! restflow runs on the `may` coroutine runtime, not tokio or async-std.
//! Stack size is configurable via the `RESTFLOW_STACK_SIZE` environment
//! variable, and blocking operations should use `may`'s facilities.

pub mod dispatch;
pub mod ids;
pub mod negotiation;
pub mod registry;
pub mod runtime_config;
pub mod server;

pub use dispatch::{
    BasicCredentials, BodyError, DispatchChain, DispatchStep, RequestContext, RequestHead,
    ResponseHandle,
};
pub use negotiation::{AcceptEntry, AcceptSet, NegotiationError};
pub use registry::{BeforeHandler, HandlerRegistry, Registry};
