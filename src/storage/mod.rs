//! Transparent instrumentation of an object-storage client.
//!
//! [`InstrumentedStore`] presents the same [`ObjectStore`] capability
//! surface as the client it wraps, so callers are wired against the trait
//! and never notice the decorator. Only a curated allow-list of hot
//! operations is instrumented: command execution (both waiting and
//! deferred), existence checks, listing, bulk deletes. Everything else
//! (presigned URLs, plain URL construction, region lookup) is delegated
//! untouched; the list is a policy choice, not exhaustive coverage.
//!
//! The wrapped client's own failures are captured only long enough to tag
//! the span with an `error` description and are then re-raised unchanged.

use crate::span::SpanDescriptor;
use crate::tracer::{SpanHandle, Tracer};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures surfaced by an object-storage client.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("object not found: {0}")]
    NotFound(String),
    /// Any other backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type alias for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A named storage command with its parameters.
#[derive(Debug, Clone)]
pub struct StoreCommand {
    /// Command name (e.g. GetObject, PutObject)
    pub name: String,
    /// Command parameters; only string values end up as span tags
    pub params: HashMap<String, Value>,
}

impl StoreCommand {
    /// Creates a command with no parameters
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            params: HashMap::new(),
        }
    }

    /// Adds a parameter
    pub fn with_param<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Result of an executed storage command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Number of items the command touched or returned
    pub count: usize,
    /// Raw response payload
    pub body: Value,
}

/// Capability surface of an object-storage client.
///
/// The concrete client library is out of scope; this trait is the boundary
/// both the host application and the decorator are written against.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Executes a command and waits for its result.
    async fn execute(&self, command: StoreCommand) -> StoreResult<CommandOutput>;

    /// Dispatches a command without blocking the caller; completion is
    /// observed through the returned future.
    fn execute_async(&self, command: StoreCommand)
        -> BoxFuture<'static, StoreResult<CommandOutput>>;

    /// Checks whether an object exists.
    async fn does_object_exist(
        &self,
        bucket: &str,
        key: &str,
        options: HashMap<String, Value>,
    ) -> StoreResult<bool>;

    /// Lists object keys via a named iterator.
    async fn list_objects(
        &self,
        name: &str,
        args: HashMap<String, Value>,
    ) -> StoreResult<Vec<String>>;

    /// Deletes every object under a prefix matching a pattern.
    async fn delete_matching_objects(
        &self,
        bucket: &str,
        prefix: &str,
        regex: &str,
        options: HashMap<String, Value>,
    ) -> StoreResult<()>;

    /// Builds a presigned request URL. Not instrumented.
    async fn presigned_url(&self, command: StoreCommand, expires_secs: u64) -> StoreResult<String>;

    /// Returns the public URL of an object. Not instrumented.
    fn object_url(&self, bucket: &str, key: &str) -> String;

    /// Looks up the region a bucket lives in. Not instrumented.
    async fn bucket_region(&self, bucket: &str) -> StoreResult<String>;
}

/// Decorator wrapping an [`ObjectStore`] with storage spans.
pub struct InstrumentedStore<C> {
    inner: C,
    tracer: Arc<Tracer>,
    host: String,
}

impl<C: ObjectStore> InstrumentedStore<C> {
    /// Wraps a client, reporting `host` as the remote endpoint of every
    /// storage span.
    pub fn new<H: Into<String>>(inner: C, tracer: Arc<Tracer>, host: H) -> Self {
        Self {
            inner,
            tracer,
            host: host.into(),
        }
    }

    /// Returns the wrapped client.
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn start_storage_span(
        &self,
        operation: &str,
        tags: HashMap<String, Value>,
    ) -> Option<SpanHandle> {
        // Storage tag derivation has no failure path, so the only possible
        // outcome besides a handle is "not tracing this request".
        self.tracer
            .start_span(SpanDescriptor::Storage {
                host: self.host.clone(),
                name: operation.to_string(),
                tags,
            })
            .unwrap_or_default()
    }

    fn finish_with(&self, span: Option<&SpanHandle>, key: &str, value: String) {
        let mut tags = HashMap::new();
        tags.insert(key.to_string(), value);
        self.tracer.finish_span(span, tags);
    }
}

/// Copies every entry of `map` into `tags` under `prefix.key`.
fn namespace_into(tags: &mut HashMap<String, Value>, prefix: &str, map: &HashMap<String, Value>) {
    for (key, value) in map {
        tags.insert(format!("{}.{}", prefix, key), value.clone());
    }
}

#[async_trait]
impl<C: ObjectStore> ObjectStore for InstrumentedStore<C> {
    async fn execute(&self, command: StoreCommand) -> StoreResult<CommandOutput> {
        let mut tags = HashMap::new();
        tags.insert("name".to_string(), Value::String(command.name.clone()));
        namespace_into(&mut tags, "command", &command.params);
        let span = self.start_storage_span("execute", tags);

        match self.inner.execute(command).await {
            Ok(output) => {
                self.finish_with(span.as_ref(), "count", output.count.to_string());
                Ok(output)
            },
            Err(err) => {
                self.finish_with(span.as_ref(), "error", err.to_string());
                Err(err)
            },
        }
    }

    fn execute_async(
        &self,
        command: StoreCommand,
    ) -> BoxFuture<'static, StoreResult<CommandOutput>> {
        let mut tags = HashMap::new();
        tags.insert("name".to_string(), Value::String(command.name.clone()));
        namespace_into(&mut tags, "command", &command.params);
        // The span opens here, synchronously, before dispatch; it closes
        // inside the continuation below, on whatever execution path drives
        // the future to completion.
        let span = self.start_storage_span("execute_async", tags);

        let tracer = Arc::clone(&self.tracer);
        let inner = self.inner.execute_async(command);
        async move {
            let result = inner.await;
            let mut tags = HashMap::new();
            match &result {
                Ok(output) => tags.insert("count".to_string(), output.count.to_string()),
                Err(err) => tags.insert("error".to_string(), err.to_string()),
            };
            tracer.finish_span(span.as_ref(), tags);
            result
        }
        .boxed()
    }

    async fn does_object_exist(
        &self,
        bucket: &str,
        key: &str,
        options: HashMap<String, Value>,
    ) -> StoreResult<bool> {
        let mut tags = HashMap::new();
        tags.insert("bucket".to_string(), Value::String(bucket.to_string()));
        tags.insert("key".to_string(), Value::String(key.to_string()));
        namespace_into(&mut tags, "options", &options);
        let span = self.start_storage_span("does_object_exist", tags);

        match self.inner.does_object_exist(bucket, key, options).await {
            Ok(exists) => {
                self.finish_with(span.as_ref(), "exists", exists.to_string());
                Ok(exists)
            },
            Err(err) => {
                self.finish_with(span.as_ref(), "error", err.to_string());
                Err(err)
            },
        }
    }

    async fn list_objects(
        &self,
        name: &str,
        args: HashMap<String, Value>,
    ) -> StoreResult<Vec<String>> {
        let mut tags = HashMap::new();
        tags.insert("name".to_string(), Value::String(name.to_string()));
        namespace_into(&mut tags, "args", &args);
        let span = self.start_storage_span("list_objects", tags);

        match self.inner.list_objects(name, args).await {
            Ok(keys) => {
                self.finish_with(span.as_ref(), "count", keys.len().to_string());
                Ok(keys)
            },
            Err(err) => {
                self.finish_with(span.as_ref(), "error", err.to_string());
                Err(err)
            },
        }
    }

    async fn delete_matching_objects(
        &self,
        bucket: &str,
        prefix: &str,
        regex: &str,
        options: HashMap<String, Value>,
    ) -> StoreResult<()> {
        let mut tags = HashMap::new();
        tags.insert("bucket".to_string(), Value::String(bucket.to_string()));
        tags.insert("prefix".to_string(), Value::String(prefix.to_string()));
        tags.insert("regex".to_string(), Value::String(regex.to_string()));
        namespace_into(&mut tags, "options", &options);
        let span = self.start_storage_span("delete_matching_objects", tags);

        match self
            .inner
            .delete_matching_objects(bucket, prefix, regex, options)
            .await
        {
            Ok(()) => {
                self.finish_with(span.as_ref(), "success", "true".to_string());
                Ok(())
            },
            Err(err) => {
                self.finish_with(span.as_ref(), "error", err.to_string());
                Err(err)
            },
        }
    }

    async fn presigned_url(&self, command: StoreCommand, expires_secs: u64) -> StoreResult<String> {
        self.inner.presigned_url(command, expires_secs).await
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        self.inner.object_url(bucket, key)
    }

    async fn bucket_region(&self, bucket: &str) -> StoreResult<String> {
        self.inner.bucket_region(bucket).await
    }
}
