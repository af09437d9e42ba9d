//! In-process graph backend.
//!
//! Evaluates [`TraversalShape`]s over an adjacency list with the same row
//! semantics as the Cypher rendering: one row per path (its last edge),
//! `UNION ALL` for the event shape and `DISTINCT` for the post shape.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use spreadtrace_common::QueryExecutionError;

use crate::backend::GraphBackend;
use crate::query::{GraphQuery, TraversalShape, BELONG, EVENT_LABEL, FORWARDED};
use crate::value::{GraphRow, GraphValue};

#[derive(Debug, Clone)]
struct Vertex {
    vid: String,
    label: String,
    props: BTreeMap<String, GraphValue>,
}

#[derive(Debug, Clone)]
struct Edge {
    src: usize,
    dst: usize,
    edge_type: String,
    rank: i64,
    props: BTreeMap<String, GraphValue>,
}

/// Graph held entirely in memory. Build it with `&mut self`, then share it.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    fail_with: Option<String>,
    latency: Option<Duration>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every query fails with `message`.
    pub fn unavailable(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Delay every query, for deadline tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a vertex. `vid` is also stored as a property, as in the real store.
    pub fn add_vertex<I, K>(&mut self, vid: &str, label: &str, props: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, GraphValue)>,
        K: Into<String>,
    {
        let mut props: BTreeMap<String, GraphValue> =
            props.into_iter().map(|(k, v)| (k.into(), v)).collect();
        props.insert("vid".to_string(), GraphValue::from(vid));
        self.vertices.push(Vertex {
            vid: vid.to_string(),
            label: label.to_string(),
            props,
        });
        self
    }

    pub fn add_event(&mut self, vid: &str, eventstr: &str) -> &mut Self {
        self.add_vertex(vid, EVENT_LABEL, [("eventstr", GraphValue::from(eventstr))])
    }

    /// Add an edge between existing vertices. Unknown ids are ignored.
    pub fn add_edge(&mut self, src: &str, dst: &str, edge_type: &str, rank: i64) -> &mut Self {
        if let (Some(src), Some(dst)) = (self.index_of(src), self.index_of(dst)) {
            self.edges.push(Edge {
                src,
                dst,
                edge_type: edge_type.to_string(),
                rank,
                props: BTreeMap::new(),
            });
        }
        self
    }

    pub fn add_belong(&mut self, post: &str, event: &str) -> &mut Self {
        self.add_edge(post, event, BELONG, 0)
    }

    /// `resharer` forwarded `original`.
    pub fn add_forward(&mut self, resharer: &str, original: &str) -> &mut Self {
        self.add_edge(resharer, original, FORWARDED, 0)
    }

    fn index_of(&self, vid: &str) -> Option<usize> {
        self.vertices.iter().position(|v| v.vid == vid)
    }

    fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.vertices.iter().enumerate().filter_map(move |(i, v)| {
            let matches = v.label == EVENT_LABEL
                && v.props.get("eventstr") == Some(&GraphValue::from(name));
            matches.then_some(i)
        })
    }

    fn incoming<'a>(&'a self, dst: usize, edge_type: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.dst == dst && e.edge_type == edge_type)
            .map(|(i, _)| i)
    }

    /// Last edge of every backward path of length 1..=max_hops from `start`.
    /// No edge repeats within a path.
    fn backward_paths(&self, start: usize, edge_type: &str, max_hops: u32) -> Vec<usize> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.walk(start, edge_type, max_hops, &mut path, &mut out);
        out
    }

    fn walk(
        &self,
        at: usize,
        edge_type: &str,
        remaining: u32,
        path: &mut Vec<usize>,
        out: &mut Vec<usize>,
    ) {
        if remaining == 0 {
            return;
        }
        for edge in self.incoming(at, edge_type) {
            if path.contains(&edge) {
                continue;
            }
            out.push(edge);
            path.push(edge);
            self.walk(self.edges[edge].src, edge_type, remaining - 1, path, out);
            path.pop();
        }
    }

    fn edge_row(&self, edge: usize) -> GraphRow {
        let e = &self.edges[edge];
        let src = &self.vertices[e.src];
        let dst = &self.vertices[e.dst];
        GraphRow::new()
            .with("vid", src.vid.as_str())
            .with("end_vid", dst.vid.as_str())
            .with("src_type", src.label.as_str())
            .with("src_props", GraphValue::Map(src.props.clone()))
            .with("e", GraphValue::Map(e.props.clone()))
            .with("e_rank", e.rank)
            .with("e_type", e.edge_type.as_str())
            .with("e_src", src.vid.as_str())
            .with("e_dst", dst.vid.as_str())
    }

    fn evaluate(&self, shape: &TraversalShape) -> Vec<GraphRow> {
        match shape {
            TraversalShape::EventLookup { event } => self
                .events_named(event)
                .take(1)
                .map(|i| GraphRow::new().with("vid", self.vertices[i].vid.as_str()))
                .collect(),
            TraversalShape::VertexLookup { vertex_id } => self
                .index_of(vertex_id)
                .map(|i| GraphRow::new().with("vid", self.vertices[i].vid.as_str()))
                .into_iter()
                .collect(),
            TraversalShape::ByEvent { event, max_hops } => {
                let events: Vec<usize> = self.events_named(event).collect();
                let origins: Vec<usize> = events
                    .iter()
                    .flat_map(|ev| self.incoming(*ev, BELONG))
                    .collect();

                let mut rows: Vec<GraphRow> = origins.iter().map(|e| self.edge_row(*e)).collect();
                for origin_edge in &origins {
                    let origin = self.edges[*origin_edge].src;
                    for edge in self.backward_paths(origin, FORWARDED, *max_hops) {
                        rows.push(self.edge_row(edge));
                    }
                }
                rows
            }
            TraversalShape::ByPost {
                vertex_id,
                max_hops,
            } => {
                let Some(start) = self.index_of(vertex_id) else {
                    return Vec::new();
                };
                let mut seen = HashSet::new();
                self.backward_paths(start, FORWARDED, *max_hops)
                    .into_iter()
                    .filter(|edge| seen.insert(*edge))
                    .map(|edge| self.edge_row(edge))
                    .collect()
            }
            TraversalShape::FetchVertex { vertex_id, label } => self
                .vertices
                .iter()
                .filter(|v| &v.vid == vertex_id && &v.label == label)
                .map(|v| {
                    GraphRow::new()
                        .with("vid", v.vid.as_str())
                        .with("src_v", GraphValue::Map(v.props.clone()))
                })
                .collect(),
        }
    }
}

#[async_trait]
impl GraphBackend for MemoryGraph {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, QueryExecutionError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(QueryExecutionError::backend(message, &query.text));
        }
        Ok(self.evaluate(&query.shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;

    fn chain(depth: usize) -> MemoryGraph {
        let mut g = MemoryGraph::new();
        g.add_event("ev1", "launch");
        g.add_vertex("p0", "Original_Tweet", [("content", GraphValue::from("origin"))]);
        g.add_belong("p0", "ev1");
        for i in 1..=depth {
            g.add_vertex(&format!("p{i}"), "Retweet", Vec::<(String, GraphValue)>::new());
            g.add_forward(&format!("p{i}"), &format!("p{}", i - 1));
        }
        g
    }

    #[tokio::test]
    async fn post_traversal_follows_whole_seven_hop_chain() {
        let g = chain(7);
        let rows = g.execute(&query::propagation_by_post("p0")).await.unwrap();
        assert_eq!(rows.len(), 7);
    }

    #[tokio::test]
    async fn event_traversal_caps_reshares_at_five_hops() {
        let g = chain(7);
        let rows = g.execute(&query::propagation_by_event("launch")).await.unwrap();
        // one BELONG row plus five FORWARDED hops
        assert_eq!(rows.len(), 6);
        let forwarded: Vec<_> = rows
            .iter()
            .filter(|r| r.get("e_type") == Some(&GraphValue::from(FORWARDED)))
            .collect();
        assert_eq!(forwarded.len(), 5);
        assert!(!rows.iter().any(|r| r.get("vid") == Some(&GraphValue::from("p6"))));
    }

    #[tokio::test]
    async fn post_traversal_deduplicates_overlapping_paths() {
        let mut g = MemoryGraph::new();
        for vid in ["a", "b", "c", "d", "e"] {
            g.add_vertex(vid, "Retweet", Vec::<(String, GraphValue)>::new());
        }
        // d reshared both b and c, both of which reshared a; e reshared d.
        // e->d is reachable along two paths but reported once.
        g.add_forward("b", "a")
            .add_forward("c", "a")
            .add_forward("d", "b")
            .add_forward("d", "c")
            .add_forward("e", "d");
        let rows = g.execute(&query::propagation_by_post("a")).await.unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn fetch_requires_matching_label() {
        let g = chain(1);
        let hit = g
            .execute(&query::fetch_vertex("p0", "Original_Tweet").unwrap())
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        let miss = g
            .execute(&query::fetch_vertex("p1", "Original_Tweet").unwrap())
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn unavailable_backend_reports_query_text() {
        let g = MemoryGraph::unavailable("connection refused");
        let q = query::propagation_by_post("p0");
        let err = g.execute(&q).await.unwrap_err();
        assert_eq!(err.query, q.text);
        assert_eq!(err.error, "connection refused");
    }
}
