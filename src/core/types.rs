use crate::core::error::{Result, SpanlineError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, SystemTime};

/// Unique identifier for a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

/// Unique identifier for a span within a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

impl TraceId {
    /// Creates a new TraceId after validation
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(SpanlineError::InvalidSpan("TraceId cannot be empty".to_string()));
        }
        // Zipkin trace IDs are 8 or 16 bytes = at most 32 hex characters
        if id.len() > 32 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SpanlineError::InvalidSpan(format!(
                "TraceId must be at most 32 hex characters, got {:?}",
                id
            )));
        }
        Ok(TraceId(id.to_ascii_lowercase()))
    }

    /// Generates a fresh 128-bit trace ID
    pub fn random() -> Self {
        TraceId(hex::encode(rand::random::<[u8; 16]>()))
    }

    /// Returns the string representation of the trace ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SpanId {
    /// Creates a new SpanId after validation
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(SpanlineError::InvalidSpan("SpanId cannot be empty".to_string()));
        }
        // Zipkin span IDs are 8 bytes = 16 hex characters
        if id.len() > 16 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SpanlineError::InvalidSpan(format!(
                "SpanId must be at most 16 hex characters, got {:?}",
                id
            )));
        }
        Ok(SpanId(id.to_ascii_lowercase()))
    }

    /// Generates a fresh 64-bit span ID
    pub fn random() -> Self {
        SpanId(hex::encode(rand::random::<[u8; 8]>()))
    }

    /// Returns the string representation of the span ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a span plays in the trace tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    /// The root span of an inbound request
    Server,
    /// An outbound call to a dependency
    Client,
}

impl SpanKind {
    /// Returns the Zipkin v2 wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Server => "SERVER",
            SpanKind::Client => "CLIENT",
        }
    }
}

/// Lifecycle state of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    /// Constructed but not yet started
    Created,
    /// Started, accumulating tags and timing
    Open,
    /// Finished exactly once; owned by the reporter from here on
    Closed,
}

/// Network endpoint of the local service or a remote dependency.
///
/// IPv6 is never populated; resolution is IPv4-only and resolution failure
/// leaves the address empty rather than failing span creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Logical service name
    pub service_name: String,
    /// Resolved IPv4 address, if resolution succeeded
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address; deliberately always absent
    pub ipv6: Option<Ipv6Addr>,
    /// Port, if known
    pub port: Option<u16>,
}

impl Endpoint {
    /// Creates an endpoint with an already-known address
    pub fn new<S: Into<String>>(service_name: S, ipv4: Option<Ipv4Addr>, port: Option<u16>) -> Self {
        Self {
            service_name: service_name.into(),
            ipv4,
            ipv6: None,
            port,
        }
    }

    /// Creates an endpoint by resolving a hostname to IPv4.
    ///
    /// Resolution failure yields an endpoint without an address; spans must
    /// still be emitted with partial endpoint information.
    pub fn resolved<S: Into<String>>(service_name: S, hostname: &str, port: Option<u16>) -> Self {
        Self::new(service_name, resolve_ipv4(hostname), port)
    }
}

/// Resolves a hostname to its first IPv4 address, or None on failure.
pub fn resolve_ipv4(hostname: &str) -> Option<Ipv4Addr> {
    if let Ok(addr) = hostname.parse::<Ipv4Addr>() {
        return Some(addr);
    }
    (hostname, 0u16)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
}

/// A timed, tagged record of one unit of work within a trace.
///
/// The span owns its lifecycle: `Created` at construction, `Open` after
/// [`Span::start`], `Closed` after [`Span::finish`]. Finishing is valid
/// exactly once and only from `Open`.
#[derive(Debug, Clone)]
pub struct Span {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    name: String,
    kind: SpanKind,
    tags: HashMap<String, String>,
    remote_endpoint: Option<Endpoint>,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    state: SpanState,
}

impl Span {
    /// Creates a span in the `Created` state under the given identifiers.
    pub fn new(trace_id: TraceId, span_id: SpanId, parent_span_id: Option<SpanId>) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
            name: String::new(),
            kind: SpanKind::Client,
            tags: HashMap::new(),
            remote_endpoint: None,
            started_at: None,
            finished_at: None,
            state: SpanState::Created,
        }
    }

    /// Returns the trace this span belongs to
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns this span's identifier
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// Returns the parent span identifier, if any
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    /// Returns the operation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span kind
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the current lifecycle state
    pub fn state(&self) -> SpanState {
        self.state
    }

    /// Returns true while the span is started but not yet finished
    pub fn is_open(&self) -> bool {
        self.state == SpanState::Open
    }

    /// Returns the accumulated tags
    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// Gets a tag value by key
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|s| s.as_str())
    }

    /// Returns the remote endpoint, if one was derived
    pub fn remote_endpoint(&self) -> Option<&Endpoint> {
        self.remote_endpoint.as_ref()
    }

    /// Returns when the span was started
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// Returns the open-to-close duration of a finished span
    pub fn duration(&self) -> Option<Duration> {
        let (start, finish) = (self.started_at?, self.finished_at?);
        Some(finish.duration_since(start).unwrap_or(Duration::ZERO))
    }

    /// Sets the operation name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Sets the span kind
    pub fn set_kind(&mut self, kind: SpanKind) {
        self.kind = kind;
    }

    /// Adds or overwrites a tag
    pub fn tag<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.tags.insert(key.into(), value.into());
    }

    /// Sets the remote endpoint
    pub fn set_remote_endpoint(&mut self, endpoint: Endpoint) {
        self.remote_endpoint = Some(endpoint);
    }

    /// Transitions `Created` → `Open` and records the start timestamp.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SpanState::Created => {
                self.started_at = Some(SystemTime::now());
                self.state = SpanState::Open;
                Ok(())
            },
            SpanState::Open => Err(SpanlineError::lifecycle(format!(
                "span {} is already started",
                self.span_id
            ))),
            SpanState::Closed => Err(SpanlineError::lifecycle(format!(
                "span {} is already closed",
                self.span_id
            ))),
        }
    }

    /// Transitions `Open` → `Closed` and records the finish timestamp.
    ///
    /// Finishing a span that was never started or was already finished is a
    /// wiring defect and fails rather than being swallowed.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            SpanState::Open => {
                self.finished_at = Some(SystemTime::now());
                self.state = SpanState::Closed;
                Ok(())
            },
            SpanState::Created => Err(SpanlineError::lifecycle(format!(
                "tried to finish span {} before it was started",
                self.span_id
            ))),
            SpanState::Closed => Err(SpanlineError::lifecycle(format!(
                "span {} was already finished",
                self.span_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_validation() {
        assert!(TraceId::new("abc123".to_string()).is_ok());
        assert!(TraceId::new(String::new()).is_err());
        assert!(TraceId::new("g".repeat(8)).is_err());
        assert!(TraceId::new("a".repeat(33)).is_err());
    }

    #[test]
    fn test_random_ids_have_wire_length() {
        assert_eq!(TraceId::random().as_str().len(), 32);
        assert_eq!(SpanId::random().as_str().len(), 16);
    }

    #[test]
    fn test_span_lifecycle_happy_path() {
        let mut span = Span::new(TraceId::random(), SpanId::random(), None);
        assert_eq!(span.state(), SpanState::Created);

        span.start().unwrap();
        assert!(span.is_open());
        assert!(span.started_at().is_some());

        span.finish().unwrap();
        assert_eq!(span.state(), SpanState::Closed);
        assert!(span.duration().is_some());
    }

    #[test]
    fn test_finish_before_start_rejected() {
        let mut span = Span::new(TraceId::random(), SpanId::random(), None);
        let err = span.finish().unwrap_err();
        assert!(err.is_integration_error());
    }

    #[test]
    fn test_double_finish_rejected() {
        let mut span = Span::new(TraceId::random(), SpanId::random(), None);
        span.start().unwrap();
        span.finish().unwrap();
        assert!(span.finish().is_err());
    }

    #[test]
    fn test_double_start_rejected() {
        let mut span = Span::new(TraceId::random(), SpanId::random(), None);
        span.start().unwrap();
        assert!(span.start().is_err());
    }

    #[test]
    fn test_resolve_ipv4_literal() {
        assert_eq!(resolve_ipv4("127.0.0.1"), Some(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn test_resolve_ipv4_failure_is_none() {
        assert_eq!(resolve_ipv4("definitely-not-a-real-host.invalid"), None);
    }
}
