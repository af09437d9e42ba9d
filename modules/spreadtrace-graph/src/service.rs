use std::sync::Arc;
use std::time::Duration;

use spreadtrace_common::{with_deadline, QueryExecutionError, TraceError, TraceResult};
use tracing::{info, warn};

use crate::backend::GraphBackend;
use crate::query::{self, GraphQuery};
use crate::reconstruct::{reconstruct, vertex_from_fetch, PropagationGraph, VertexRecord};
use crate::schema::PropertySchema;
use crate::value::GraphRow;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ORIGINAL_POST_LABEL: &str = "Original_Tweet";

/// Propagation queries over a graph backend: validates input, checks the
/// anchor exists, runs the traversal under a deadline and decodes the rows.
pub struct PropagationService<B> {
    backend: B,
    schema: Arc<PropertySchema>,
    original_post_label: String,
    query_timeout: Duration,
}

impl<B: GraphBackend> PropagationService<B> {
    pub fn new(backend: B, schema: Arc<PropertySchema>) -> Self {
        Self {
            backend,
            schema,
            original_post_label: DEFAULT_ORIGINAL_POST_LABEL.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_original_post_label(mut self, label: impl Into<String>) -> Self {
        self.original_post_label = label.into();
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    async fn run(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, QueryExecutionError> {
        let result = with_deadline(self.query_timeout, &query.text, self.backend.execute(query)).await;
        if let Err(e) = &result {
            warn!(kind = ?e.kind, error = %e.error, "Graph query failed");
        }
        result
    }

    /// Origin posts of an event plus their reshare chains (bounded depth).
    pub async fn by_event(&self, event: &str) -> TraceResult<PropagationGraph> {
        let event = require("event", event)?;

        if self.run(&query::event_lookup(event)).await?.is_empty() {
            return Err(TraceError::NotFound(format!("event {event:?}")));
        }

        let rows = self.run(&query::propagation_by_event(event)).await?;
        let graph = PropagationGraph::from_edges(reconstruct(&rows, &self.schema));
        info!(event, edges = graph.edges.len(), vertices = graph.vertex_count, "Event propagation built");
        Ok(graph)
    }

    /// Distinct reshare edges leading back to one post.
    pub async fn by_post(&self, vertex_id: &str) -> TraceResult<PropagationGraph> {
        let vertex_id = require("id", vertex_id)?;

        if self.run(&query::vertex_lookup(vertex_id)).await?.is_empty() {
            return Err(TraceError::NotFound(format!("vertex {vertex_id:?}")));
        }

        let rows = self.run(&query::propagation_by_post(vertex_id)).await?;
        let graph = PropagationGraph::from_edges(reconstruct(&rows, &self.schema));
        info!(vertex_id, edges = graph.edges.len(), vertices = graph.vertex_count, "Post propagation built");
        Ok(graph)
    }

    /// Properties of one original post vertex.
    pub async fn original_post(&self, vertex_id: &str) -> TraceResult<VertexRecord> {
        let vertex_id = require("id", vertex_id)?;
        let q = query::fetch_vertex(vertex_id, &self.original_post_label)?;
        let rows = self.run(&q).await?;
        let row = rows.first().ok_or_else(|| {
            TraceError::NotFound(format!("{} {vertex_id:?}", self.original_post_label))
        })?;
        Ok(vertex_from_fetch(row, &self.original_post_label, &self.schema))
    }
}

fn require<'a>(name: &str, value: &'a str) -> TraceResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TraceError::Validation(format!("missing required parameter: {name}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::TypedValue;
    use crate::memory::MemoryGraph;
    use crate::value::GraphValue;
    use spreadtrace_common::QueryErrorKind;

    fn service(graph: MemoryGraph) -> PropagationService<MemoryGraph> {
        PropagationService::new(graph, Arc::new(PropertySchema::builtin()))
    }

    fn sample() -> MemoryGraph {
        let mut g = MemoryGraph::new();
        g.add_event("ev1", "减重版司美格鲁正式在中国上市");
        g.add_event("ev2", "quiet event");
        g.add_vertex(
            "p0",
            "Original_Tweet",
            [
                ("content", GraphValue::from("origin")),
                ("forwardcount", GraphValue::Int(2)),
                ("publishtimestamp", GraphValue::Int(1_700_000_000_000)),
            ],
        );
        g.add_vertex("r1", "Retweet", [("retext", GraphValue::from("b'\\xe8\\xbd\\xac'"))]);
        g.add_vertex("r2", "Retweet", Vec::<(String, GraphValue)>::new());
        g.add_belong("p0", "ev1").add_forward("r1", "p0").add_forward("r2", "r1");
        g
    }

    #[tokio::test]
    async fn event_propagation_decodes_vertices() {
        let svc = service(sample());
        let graph = svc.by_event("减重版司美格鲁正式在中国上市").await.unwrap();
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.vertex_count, 4);

        let r1 = graph.edges.iter().find(|e| e.src_vertex_id == "r1").unwrap();
        assert_eq!(r1.dst_vertex_id, "p0");
        assert_eq!(
            r1.src_vertex.properties.get("retext"),
            Some(&TypedValue::String("转".into()))
        );
    }

    #[tokio::test]
    async fn empty_propagation_is_not_an_error() {
        let svc = service(sample());
        let graph = svc.by_event("quiet event").await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let svc = service(sample());
        let err = svc.by_event("no such event").await.unwrap_err();
        assert!(matches!(err, TraceError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_parameters_are_validation_errors() {
        let svc = service(sample());
        assert!(matches!(svc.by_event("  ").await, Err(TraceError::Validation(_))));
        assert!(matches!(svc.by_post("").await, Err(TraceError::Validation(_))));
        assert!(matches!(svc.original_post("").await, Err(TraceError::Validation(_))));
    }

    #[tokio::test]
    async fn failed_query_is_distinct_from_empty_result() {
        let svc = service(MemoryGraph::unavailable("graphd down"));
        let err = svc.by_post("p0").await.unwrap_err();
        match err {
            TraceError::Query(e) => {
                assert_eq!(e.kind, QueryErrorKind::Backend);
                assert!(e.query.contains("vid: $id"));
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let svc = service(sample().with_latency(Duration::from_millis(200)))
            .with_query_timeout(Duration::from_millis(20));
        let err = svc.by_post("p0").await.unwrap_err();
        assert!(matches!(err, TraceError::Query(e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn post_propagation_and_original_fetch() {
        let svc = service(sample());
        let graph = svc.by_post("p0").await.unwrap();
        assert_eq!(graph.edges.len(), 2);

        let vertex = svc.original_post("p0").await.unwrap();
        assert_eq!(vertex.vertex_type, "Original_Tweet");
        assert_eq!(vertex.properties.get("forwardcount"), Some(&TypedValue::Int(2)));
        assert!(matches!(
            vertex.properties.get("publishtimestamp"),
            Some(TypedValue::Timestamp(_))
        ));

        let err = svc.original_post("r1").await.unwrap_err();
        assert!(matches!(err, TraceError::NotFound(_)));
    }
}
