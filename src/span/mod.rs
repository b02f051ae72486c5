//! Span-kind strategies.
//!
//! Each outbound dependency (and the inbound request itself) gets its own
//! descriptor variant carrying typed construction parameters. A descriptor
//! is inert until [`SpanDescriptor::derive`] runs at span start, which keeps
//! every heuristic failure at a single catchable point instead of scattering
//! it across construction sites.

pub mod sql;

use crate::core::{CacheConfig, DatabaseConfig, Endpoint, Result, SpanKind, SpanlineError};
use serde_json::Value;
use std::collections::HashMap;

/// Service label reported for database spans
pub const DATABASE_SERVICE: &str = "mysql";
/// Service label reported for cache spans
pub const CACHE_SERVICE: &str = "redis";
/// Service label reported for object-storage spans
pub const STORAGE_SERVICE: &str = "S3";

/// Statement verb of a structured SQL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StatementVerb {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementVerb {
    /// Returns the lowercase span name for this verb
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementVerb::Select => "select",
            StatementVerb::Insert => "insert",
            StatementVerb::Update => "update",
            StatementVerb::Delete => "delete",
        }
    }
}

/// Table reference carried by a structured statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    /// A plain name, possibly already qualified as `schema.table`
    Named(String),
    /// An explicit schema/table pair; schema falls back to the configured one
    Qualified {
        /// Schema the table belongs to, when the caller knows it
        schema: Option<String>,
        /// Bare table name
        table: String,
    },
}

impl TableRef {
    fn qualify(&self, default_schema: &str) -> String {
        match self {
            TableRef::Named(name) if name.contains('.') => name.clone(),
            TableRef::Named(name) => format!("{}.{}", default_schema, name),
            TableRef::Qualified { schema, table } => {
                format!("{}.{}", schema.as_deref().unwrap_or(default_schema), table)
            },
        }
    }
}

/// A database statement in one of the representations callers hand us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Raw SQL text; verb and table are inferred heuristically
    Raw(String),
    /// A prepared statement that still exposes its SQL text
    Prepared {
        /// The SQL text behind the prepared statement
        sql: String,
    },
    /// A structured statement with explicit verb and table references.
    ///
    /// The first table is treated as the primary one. An empty table list
    /// is a hard integration error: the caller built a statement this
    /// engine cannot describe.
    Structured {
        /// Verb of the statement
        verb: StatementVerb,
        /// Referenced tables, primary first
        tables: Vec<TableRef>,
    },
}

/// Everything a kind strategy derives at start time.
#[derive(Debug, Clone)]
pub struct SpanSeed {
    /// Operation name for the span
    pub name: String,
    /// Server for the root request span, client for dependency spans
    pub kind: SpanKind,
    /// Kind-derived tags
    pub tags: HashMap<String, String>,
    /// Remote endpoint of the dependency, if any
    pub remote_endpoint: Option<Endpoint>,
}

impl SpanSeed {
    /// Applies the derived name, kind, tags and endpoint to a span.
    pub fn apply_to(self, span: &mut crate::core::Span) {
        span.set_name(self.name);
        span.set_kind(self.kind);
        for (key, value) in self.tags {
            span.tag(key, value);
        }
        if let Some(remote) = self.remote_endpoint {
            span.set_remote_endpoint(remote);
        }
    }
}

/// Typed construction parameters for each span kind.
///
/// This is the closed set of span kinds the tracer knows how to start;
/// selection happens by pattern matching rather than runtime type lookup.
#[derive(Debug, Clone)]
pub enum SpanDescriptor {
    /// Root span of the inbound request
    Request {
        /// HTTP method, used as the span name
        method: String,
        /// Request path, tagged as `http.path`
        path: String,
    },
    /// Outbound database call
    Database {
        /// The statement being executed
        statement: Statement,
        /// Connection settings for tag and endpoint derivation
        config: DatabaseConfig,
    },
    /// Outbound cache call
    Cache {
        /// Cache server settings for endpoint derivation
        config: CacheConfig,
        /// Operation name (get, set, delete, ...)
        operation: String,
        /// Cache hash being operated on
        hash: String,
        /// Specific key within the hash, if any
        key: Option<String>,
        /// Time-to-live of the entry, if any
        ttl: Option<String>,
    },
    /// Outbound object-storage call
    Storage {
        /// Storage host reported as the remote endpoint
        host: String,
        /// Operation name
        name: String,
        /// Caller-supplied tag bag; non-string values are silently dropped
        tags: HashMap<String, Value>,
    },
}

impl SpanDescriptor {
    /// Derives name, kind, tags and remote endpoint for this descriptor.
    ///
    /// Evaluated exactly once, at span start. Heuristic failures degrade to
    /// `unknown` tag values or missing endpoint addresses; the only error
    /// path is a statement representation the engine does not support.
    pub fn derive(&self) -> Result<SpanSeed> {
        match self {
            SpanDescriptor::Request { method, path } => {
                let mut tags = HashMap::new();
                tags.insert("http.path".to_string(), path.clone());
                Ok(SpanSeed {
                    name: method.clone(),
                    kind: SpanKind::Server,
                    tags,
                    remote_endpoint: None,
                })
            },

            SpanDescriptor::Database { statement, config } => {
                let (verb, table) = describe_statement(statement, &config.schema)?;
                let mut tags = HashMap::new();
                tags.insert("table".to_string(), table);
                Ok(SpanSeed {
                    name: verb,
                    kind: SpanKind::Client,
                    tags,
                    remote_endpoint: Some(Endpoint::resolved(
                        DATABASE_SERVICE,
                        &config.hostname,
                        Some(config.port),
                    )),
                })
            },

            SpanDescriptor::Cache {
                config,
                operation,
                hash,
                key,
                ttl,
            } => {
                let mut tags = HashMap::new();
                tags.insert("hash".to_string(), hash.clone());
                if let Some(key) = key {
                    tags.insert("key".to_string(), key.clone());
                }
                if let Some(ttl) = ttl {
                    tags.insert("ttl".to_string(), ttl.clone());
                }
                Ok(SpanSeed {
                    name: operation.clone(),
                    kind: SpanKind::Client,
                    tags,
                    remote_endpoint: Some(Endpoint::resolved(
                        CACHE_SERVICE,
                        &config.host,
                        Some(config.port),
                    )),
                })
            },

            SpanDescriptor::Storage { host, name, tags } => {
                let tags = tags
                    .iter()
                    .filter_map(|(key, value)| match value {
                        Value::String(s) => Some((key.clone(), s.clone())),
                        _ => None,
                    })
                    .collect();
                Ok(SpanSeed {
                    name: name.clone(),
                    kind: SpanKind::Client,
                    tags,
                    remote_endpoint: Some(Endpoint::resolved(STORAGE_SERVICE, host, Some(80))),
                })
            },
        }
    }
}

/// Resolves a statement to its (verb, primary table) pair.
fn describe_statement(statement: &Statement, default_schema: &str) -> Result<(String, String)> {
    match statement {
        Statement::Raw(sql) | Statement::Prepared { sql } => Ok((
            sql::infer_verb(sql),
            sql::infer_table(sql, default_schema),
        )),
        Statement::Structured { verb, tables } => {
            let primary = tables.first().ok_or_else(|| {
                SpanlineError::unsupported_statement(
                    "structured statement carries no table references",
                )
            })?;
            Ok((verb.as_str().to_string(), primary.qualify(default_schema)))
        },
    }
}
