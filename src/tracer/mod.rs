//! Request-scoped tracing orchestration.
//!
//! One [`Tracer`] serves exactly one inbound request: it opens the root
//! request span, mints child spans for dependency calls, finishes them, and
//! flushes the reporter when the request completes. The tracer is explicitly
//! passed (or cloned as an `Arc`) to whatever needs it; there is no implicit
//! global lookup.
//!
//! Session state lives behind locks so span completion may run on a deferred
//! continuation (for example a spawned task awaiting an asynchronous storage
//! call), as long as it is sequenced after `start_request_span` and before
//! `finish_request_span`.

use crate::context::TraceContext;
use crate::core::{Endpoint, Result, Span, TracingConfig};
use crate::reporter::ZipkinReporter;
use crate::span::{SpanDescriptor, SpanSeed};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to a span; completion may happen on a different logical
/// continuation than the one that opened it.
pub type SpanHandle = Arc<Mutex<Span>>;

/// The slice of the host request the tracer needs.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Host the request declared; resolved to the local endpoint's IPv4
    pub host: String,
    /// Local service port, if known
    pub port: Option<u16>,
    /// Inbound headers, searched for propagation context
    pub headers: HashMap<String, String>,
}

impl InboundRequest {
    /// Creates a request view with no headers and no port.
    pub fn new<M: Into<String>, P: Into<String>, H: Into<String>>(
        method: M,
        path: P,
        host: H,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            host: host.into(),
            port: None,
            headers: HashMap::new(),
        }
    }

    /// Sets the local service port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Adds an inbound header.
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-request session state, created by `start_request_span` and torn down
/// by `finish_request_span`.
struct Session {
    context: TraceContext,
    root: SpanHandle,
    reporter: Arc<ZipkinReporter>,
    children: Mutex<Vec<SpanHandle>>,
}

/// Process-facing orchestrator for one request's trace.
pub struct Tracer {
    collector_url: String,
    local_service_name: String,
    flush_timeout: Duration,
    session: RwLock<Option<Session>>,
}

impl Tracer {
    /// Creates a tracer shipping to the given collector URL.
    pub fn new<U: Into<String>, S: Into<String>>(collector_url: U, local_service_name: S) -> Self {
        Self {
            collector_url: collector_url.into(),
            local_service_name: local_service_name.into(),
            flush_timeout: Duration::from_secs(5),
            session: RwLock::new(None),
        }
    }

    /// Builds a tracer from configuration, or `None` when tracing is
    /// disabled; the host wires the plain, uninstrumented path in that
    /// case.
    pub fn from_config(config: &TracingConfig) -> Result<Option<Arc<Self>>> {
        config.validate()?;
        if !config.enabled {
            return Ok(None);
        }
        Ok(Some(Arc::new(Self {
            collector_url: config.collector_url.clone(),
            local_service_name: config.local_service_name.clone(),
            flush_timeout: config.flush_timeout,
            session: RwLock::new(None),
        })))
    }

    /// Returns the root span handle of the active request, if any.
    pub fn root_span(&self) -> Option<SpanHandle> {
        self.session.read().as_ref().map(|s| Arc::clone(&s.root))
    }

    /// Returns how many finished spans are queued for the next flush.
    pub fn pending_spans(&self) -> usize {
        self.session
            .read()
            .as_ref()
            .map_or(0, |session| session.reporter.pending())
    }

    /// Opens the root span for an inbound request.
    ///
    /// Extracts propagation context from the request headers (absent or
    /// malformed context starts a new trace), resolves the local endpoint,
    /// connects the reporter and retains the started span as session state.
    /// Calling this twice replaces the previous session; guarding against
    /// double invocation is the caller's job.
    pub fn start_request_span(&self, request: &InboundRequest) -> Result<()> {
        let local_endpoint = Endpoint::resolved(
            self.local_service_name.clone(),
            &request.host,
            request.port,
        );
        let reporter = Arc::new(ZipkinReporter::new(
            self.collector_url.clone(),
            local_endpoint,
            self.flush_timeout,
        )?);

        let context = TraceContext::extract(&request.headers);
        let seed = SpanDescriptor::Request {
            method: request.method.clone(),
            path: request.path.clone(),
        }
        .derive()?;

        let mut root = Span::new(
            context.trace_id.clone(),
            context.span_id.clone(),
            context.parent_span_id.clone(),
        );
        seed.apply_to(&mut root);
        root.start()?;

        tracing::debug!(
            trace_id = %context.trace_id,
            span_id = %context.span_id,
            "request span started"
        );

        let mut session = self.session.write();
        if session.is_some() {
            tracing::warn!("start_request_span called twice; replacing the active root span");
        }
        *session = Some(Session {
            context,
            root: Arc::new(Mutex::new(root)),
            reporter,
            children: Mutex::new(Vec::new()),
        });
        Ok(())
    }

    /// Starts a child span under the current request.
    ///
    /// Returns `Ok(None)` when no root span is active: tracing is simply
    /// off for this request and every call site must treat that as the
    /// normal silent case. Errors only on integration defects (an
    /// unsupported statement representation).
    pub fn start_span(&self, descriptor: SpanDescriptor) -> Result<Option<SpanHandle>> {
        let session_guard = self.session.read();
        let session = match session_guard.as_ref() {
            Some(session) => session,
            None => return Ok(None),
        };

        let seed: SpanSeed = descriptor.derive()?;
        let child_context = session.context.child();
        let mut span = Span::new(
            child_context.trace_id,
            child_context.span_id,
            child_context.parent_span_id,
        );
        seed.apply_to(&mut span);
        span.start()?;

        let handle = Arc::new(Mutex::new(span));
        session.children.lock().push(Arc::clone(&handle));
        Ok(Some(handle))
    }

    /// Finishes a span, merging caller result metadata under the `result.`
    /// namespace so it can never collide with kind-derived tags.
    ///
    /// A `None` handle and an already-closed span are both silent no-ops.
    pub fn finish_span(&self, span: Option<&SpanHandle>, result_tags: HashMap<String, String>) {
        let handle = match span {
            Some(handle) => handle,
            None => return,
        };

        let session_guard = self.session.read();
        let mut span = handle.lock();
        if !span.is_open() {
            return;
        }
        for (key, value) in result_tags {
            span.tag(format!("result.{}", key), value);
        }
        // The open check above makes this transition infallible.
        if span.finish().is_ok() {
            match session_guard.as_ref() {
                Some(session) => session.reporter.report(span.clone()),
                None => {
                    tracing::warn!(
                        span_id = %span.span_id(),
                        "span finished after its request session ended; dropping"
                    );
                },
            }
        }
    }

    /// Closes the root span and flushes the reporter, sweeping up any child
    /// spans that were opened but never finished. No-op when no request
    /// span was ever started. Returns the number of spans shipped.
    pub async fn finish_request_span(&self) -> Result<usize> {
        let session = match self.session.write().take() {
            Some(session) => session,
            None => return Ok(0),
        };

        // Safety net, not a substitute for caller discipline: abandoned
        // children are closed here so their linkage still reaches the
        // collector with the rest of the trace.
        for handle in session.children.lock().drain(..) {
            let mut child = handle.lock();
            if child.is_open() {
                tracing::warn!(span_id = %child.span_id(), "closing abandoned child span");
                if child.finish().is_ok() {
                    session.reporter.report(child.clone());
                }
            }
        }

        {
            let mut root = session.root.lock();
            if root.is_open() && root.finish().is_ok() {
                session.reporter.report(root.clone());
            }
        }

        session.reporter.flush().await
    }
}
