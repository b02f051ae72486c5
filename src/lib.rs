//! Spanline - request-scoped Zipkin instrumentation engine.
//!
//! Spanline opens one root span per inbound request, derives child spans
//! for outgoing calls to dependent services (object storage, database,
//! cache), and ships completed spans to a Zipkin-compatible collector as
//! v2 JSON batches.
//!
//! # Features
//!
//! - **B3 propagation**: single and multi-header extraction; absent or
//!   malformed context starts a new trace instead of failing
//! - **Span lifecycle protocol**: exactly-once open/close with the close
//!   allowed on a different execution path than the open
//! - **Best-effort tag heuristics**: SQL verb/table inference and hostname
//!   resolution that degrade to `unknown`/missing values, never to errors
//! - **Transparent client decoration**: an allow-list of storage operations
//!   is wrapped with spans while the rest pass through untouched
//!
//! # Architecture
//!
//! - `core`: span record, identifiers, errors and configuration
//! - `context`: propagation-context extraction
//! - `span`: per-kind tag derivation strategies
//! - `tracer`: request-scoped orchestration
//! - `reporter`: Zipkin v2 batching and transport
//! - `storage`: the instrumented object-storage boundary
//!
//! # Example
//!
//! ```no_run
//! use spanline::core::TracingConfig;
//! use spanline::tracer::InboundRequest;
//! use spanline::Tracer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TracingConfig::default();
//!     let tracer = match Tracer::from_config(&config)? {
//!         Some(tracer) => tracer,
//!         None => return Ok(()), // tracing disabled
//!     };
//!
//!     let request = InboundRequest::new("GET", "/orders/42", "api.example.com").with_port(443);
//!     tracer.start_request_span(&request)?;
//!     // ... handle the request, starting and finishing child spans ...
//!     tracer.finish_request_span().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod core;
pub mod reporter;
pub mod span;
pub mod storage;
pub mod tracer;

// Re-export the host-facing surface for convenience
pub use crate::core::{Result, SpanlineError, TracingConfig};
pub use crate::tracer::{InboundRequest, SpanHandle, Tracer};
