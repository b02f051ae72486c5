//! Zipkin v2 collector transport.
//!
//! Finished spans are converted to the public v2 JSON span shape, buffered,
//! and shipped as one JSON array per flush via HTTP POST. The buffer is the
//! single piece of state shared by concurrently-finishing spans, so appends
//! are serialized behind a mutex. No retry and no backpressure: a failed
//! flush drops the batch and surfaces the error to the caller.

use crate::core::{Endpoint, Result, Span, SpanlineError};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};

/// Zipkin v2 endpoint shape
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEndpoint {
    service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}

impl From<&Endpoint> for WireEndpoint {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            service_name: endpoint.service_name.clone(),
            ipv4: endpoint.ipv4.map(|ip| ip.to_string()),
            ipv6: endpoint.ipv6.map(|ip| ip.to_string()),
            port: endpoint.port,
        }
    }
}

/// Zipkin v2 span shape
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpan {
    trace_id: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    name: String,
    kind: &'static str,
    /// Start of the span in microseconds since the Unix epoch
    timestamp: u64,
    /// Open-to-close duration in microseconds
    duration: u64,
    local_endpoint: WireEndpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_endpoint: Option<WireEndpoint>,
    tags: HashMap<String, String>,
}

impl WireSpan {
    /// Converts a finished span into its wire representation.
    pub fn from_span(span: &Span, local_endpoint: &Endpoint) -> Self {
        let timestamp = span
            .started_at()
            .and_then(|start| start.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since_epoch| since_epoch.as_micros() as u64);
        let duration = span.duration().map_or(0, |d| d.as_micros() as u64);

        Self {
            trace_id: span.trace_id().as_str().to_string(),
            id: span.span_id().as_str().to_string(),
            parent_id: span.parent_span_id().map(|id| id.as_str().to_string()),
            name: span.name().to_string(),
            kind: span.kind().as_str(),
            timestamp,
            duration,
            local_endpoint: WireEndpoint::from(local_endpoint),
            remote_endpoint: span.remote_endpoint().map(WireEndpoint::from),
            tags: span.tags().clone(),
        }
    }
}

/// Batches finished spans and POSTs them to a Zipkin-compatible collector.
pub struct ZipkinReporter {
    client: reqwest::Client,
    collector_url: String,
    local_endpoint: Endpoint,
    buffer: Mutex<Vec<WireSpan>>,
}

impl ZipkinReporter {
    /// Creates a reporter for the given collector URL and local endpoint.
    pub fn new(
        collector_url: String,
        local_endpoint: Endpoint,
        flush_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(flush_timeout).build()?;
        Ok(Self {
            client,
            collector_url,
            local_endpoint,
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Takes ownership of a finished span and queues it for the next flush.
    pub fn report(&self, span: Span) {
        if span.is_open() {
            // Only closed spans carry a duration; this is a caller bug but
            // the batch must stay well-formed either way.
            tracing::warn!(span_id = %span.span_id(), "reported span is still open");
        }
        let wire = WireSpan::from_span(&span, &self.local_endpoint);
        self.buffer.lock().push(wire);
    }

    /// Returns how many spans are waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Sends every buffered span to the collector as one JSON array.
    ///
    /// Returns the number of spans shipped. The batch is dropped whether or
    /// not the POST succeeds; retrying is the collector client's non-goal.
    pub async fn flush(&self) -> Result<usize> {
        let batch: Vec<WireSpan> = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        tracing::debug!(count, url = %self.collector_url, "flushing span batch");

        let response = self
            .client
            .post(&self.collector_url)
            .json(&batch)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "span batch POST failed");
                SpanlineError::from(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "collector rejected span batch");
            return Err(SpanlineError::CollectorRejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(count, "span batch accepted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SpanId, SpanKind, TraceId};

    fn closed_span(parent: Option<SpanId>) -> Span {
        let mut span = Span::new(TraceId::random(), SpanId::random(), parent);
        span.set_name("GET");
        span.set_kind(SpanKind::Server);
        span.tag("http.path", "/orders");
        span.start().unwrap();
        span.finish().unwrap();
        span
    }

    #[test]
    fn test_wire_span_shape() {
        let span = closed_span(None);
        let local = Endpoint::new("api", Some("10.0.0.1".parse().unwrap()), Some(8080));
        let wire = WireSpan::from_span(&span, &local);
        let value = serde_json::to_value(&wire).unwrap();

        assert_eq!(value["traceId"], span.trace_id().as_str());
        assert_eq!(value["id"], span.span_id().as_str());
        assert_eq!(value["kind"], "SERVER");
        assert_eq!(value["localEndpoint"]["serviceName"], "api");
        assert_eq!(value["localEndpoint"]["ipv4"], "10.0.0.1");
        assert_eq!(value["tags"]["http.path"], "/orders");
        // Root spans must not serialize a parentId at all
        assert!(value.get("parentId").is_none());
        assert!(value.get("remoteEndpoint").is_none());
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_wire_span_parent_id_present_for_children() {
        let parent = SpanId::random();
        let span = closed_span(Some(parent.clone()));
        let local = Endpoint::new("api", None, None);
        let value = serde_json::to_value(WireSpan::from_span(&span, &local)).unwrap();

        assert_eq!(value["parentId"], parent.as_str());
        // Unresolved local endpoint omits the address but keeps the name
        assert!(value["localEndpoint"].get("ipv4").is_none());
    }

    #[test]
    fn test_report_and_pending() {
        let reporter = ZipkinReporter::new(
            "http://127.0.0.1:9411/api/v2/spans".to_string(),
            Endpoint::new("api", None, None),
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(reporter.pending(), 0);
        reporter.report(closed_span(None));
        reporter.report(closed_span(None));
        assert_eq!(reporter.pending(), 2);
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_is_noop() {
        let reporter = ZipkinReporter::new(
            "http://127.0.0.1:1/api/v2/spans".to_string(),
            Endpoint::new("api", None, None),
            Duration::from_secs(1),
        )
        .unwrap();

        // No spans buffered, so no request is attempted even though the
        // collector URL is unreachable.
        assert_eq!(reporter.flush().await.unwrap(), 0);
    }
}
