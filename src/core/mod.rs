//! Core domain models for the tracing engine.
//!
//! This module contains the span record, identifier newtypes, error
//! taxonomy and configuration surface shared by the rest of the crate.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{CacheConfig, DatabaseConfig, StorageConfig, TracingConfig};
pub use error::{Result, SpanlineError};
pub use types::{resolve_ipv4, Endpoint, Span, SpanId, SpanKind, SpanState, TraceId};
