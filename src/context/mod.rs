//! Propagation-context extraction from inbound request headers.
//!
//! Understands both B3 forms: the single `b3` header
//! (`{trace}-{span}[-{sampling}[-{parent}]]`) and the multi-header
//! `X-B3-TraceId` / `X-B3-SpanId` / `X-B3-Sampled` set. Extraction never
//! fails: any absent or malformed upstream context means "start a new
//! trace". Outbound injection is deliberately not implemented.

use crate::core::{SpanId, TraceId};
use std::collections::HashMap;

/// The (traceId, spanId, parentId, sampled) tuple threading a request and
/// its children together. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// Trace identifier shared by every span in the trace
    pub trace_id: TraceId,
    /// Identifier of the span this context belongs to
    pub span_id: SpanId,
    /// Parent span identifier; None for the first span of a new trace
    pub parent_span_id: Option<SpanId>,
    /// Upstream sampling decision; recorded but never used to suppress
    /// spans, since this engine always samples
    pub sampled: bool,
}

impl TraceContext {
    /// Creates the context of a brand-new trace with no upstream parent.
    pub fn new_root() -> Self {
        Self {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Extracts a context from inbound headers.
    ///
    /// When valid upstream identifiers are present, the returned context
    /// continues that trace: it keeps the upstream trace ID, mints a fresh
    /// span ID for the local root span, and records the upstream span as
    /// its parent. Otherwise a new-trace context is returned.
    pub fn extract(headers: &HashMap<String, String>) -> Self {
        if let Some(ctx) = extract_single(headers).or_else(|| extract_multi(headers)) {
            return ctx;
        }
        Self::new_root()
    }

    /// Derives the context for a child span: same trace, fresh span ID,
    /// this context's span as the parent.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id.clone()),
            sampled: self.sampled,
        }
    }
}

/// Case-insensitive header lookup.
fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

/// Parses the single `b3` header form.
fn extract_single(headers: &HashMap<String, String>) -> Option<TraceContext> {
    let value = header(headers, "b3")?;
    let mut parts = value.split('-');
    let trace_id = TraceId::new(parts.next()?.to_string()).ok()?;
    let upstream_span = SpanId::new(parts.next()?.to_string()).ok()?;
    let sampled = parts.next().map_or(true, |flag| flag != "0");

    Some(continue_trace(trace_id, upstream_span, sampled))
}

/// Parses the multi-header `X-B3-*` form.
fn extract_multi(headers: &HashMap<String, String>) -> Option<TraceContext> {
    let trace_id = TraceId::new(header(headers, "x-b3-traceid")?.to_string()).ok()?;
    let upstream_span = SpanId::new(header(headers, "x-b3-spanid")?.to_string()).ok()?;
    let sampled = header(headers, "x-b3-sampled").map_or(true, |flag| {
        flag != "0" && !flag.eq_ignore_ascii_case("false")
    });

    Some(continue_trace(trace_id, upstream_span, sampled))
}

fn continue_trace(trace_id: TraceId, upstream_span: SpanId, sampled: bool) -> TraceContext {
    TraceContext {
        trace_id,
        span_id: SpanId::random(),
        parent_span_id: Some(upstream_span),
        sampled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_headers_starts_new_trace() {
        let ctx = TraceContext::extract(&HashMap::new());
        assert!(ctx.parent_span_id.is_none());
        assert!(ctx.sampled);
    }

    #[test]
    fn test_multi_header_extraction() {
        let ctx = TraceContext::extract(&headers(&[
            ("X-B3-TraceId", "463ac35c9f6413ad48485a3953bb6124"),
            ("X-B3-SpanId", "a2fb4a1d1a96d312"),
        ]));
        assert_eq!(ctx.trace_id.as_str(), "463ac35c9f6413ad48485a3953bb6124");
        assert_eq!(
            ctx.parent_span_id.as_ref().map(|id| id.as_str()),
            Some("a2fb4a1d1a96d312")
        );
        assert_ne!(ctx.span_id.as_str(), "a2fb4a1d1a96d312");
        assert!(ctx.sampled);
    }

    #[test]
    fn test_multi_header_names_are_case_insensitive() {
        let ctx = TraceContext::extract(&headers(&[
            ("x-b3-traceid", "463ac35c9f6413ad48485a3953bb6124"),
            ("x-b3-spanid", "a2fb4a1d1a96d312"),
            ("x-b3-sampled", "0"),
        ]));
        assert!(ctx.parent_span_id.is_some());
        assert!(!ctx.sampled);
    }

    #[test]
    fn test_single_header_extraction() {
        let ctx = TraceContext::extract(&headers(&[(
            "b3",
            "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1",
        )]));
        assert_eq!(ctx.trace_id.as_str(), "80f198ee56343ba864fe8b2a57d3eff7");
        assert_eq!(
            ctx.parent_span_id.as_ref().map(|id| id.as_str()),
            Some("e457b5a2e4d86bd1")
        );
        assert!(ctx.sampled);
    }

    #[test]
    fn test_single_header_deny_flag() {
        let ctx = TraceContext::extract(&headers(&[(
            "b3",
            "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-0",
        )]));
        assert!(!ctx.sampled);
    }

    #[test]
    fn test_garbage_headers_start_new_trace() {
        let ctx = TraceContext::extract(&headers(&[
            ("b3", "not-a-context"),
            ("X-B3-TraceId", "zzzz"),
            ("X-B3-SpanId", ""),
        ]));
        assert!(ctx.parent_span_id.is_none());
    }

    #[test]
    fn test_child_links_to_parent() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id.as_ref(), Some(&root.span_id));
        assert_ne!(child.span_id, root.span_id);
    }
}
