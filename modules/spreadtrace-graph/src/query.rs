//! Traversal query construction.
//!
//! Every query is a [`GraphQuery`]: the structured shape, the rendered Cypher
//! text and its bound parameters. User input only ever travels as a parameter;
//! hop bounds and labels are formatted into the text from constants or
//! validated identifiers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use spreadtrace_common::TraceError;

use crate::value::GraphValue;

pub const EVENT_LABEL: &str = "Event";
pub const BELONG: &str = "BELONG";
pub const FORWARDED: &str = "FORWARDED";

/// Reshare-chain depth followed from each origin post of an event.
pub const EVENT_RESHARE_HOPS: u32 = 5;
/// Reshare-chain depth followed from a single post.
pub const POST_RESHARE_HOPS: u32 = 10;

/// Columns produced by every edge-yielding traversal, in order.
pub const EDGE_COLUMNS: &[&str] = &[
    "vid", "end_vid", "src_type", "src_props", "e", "e_rank", "e_type", "e_src", "e_dst",
];
pub const FETCH_COLUMNS: &[&str] = &["vid", "src_v"];
pub const LOOKUP_COLUMNS: &[&str] = &["vid"];

#[derive(Debug, Clone, PartialEq)]
pub enum TraversalShape {
    /// Resolve an event vertex by its `eventstr`.
    EventLookup { event: String },
    /// Resolve any vertex by id.
    VertexLookup { vertex_id: String },
    /// One hop back over `BELONG` to the origin posts, UNION ALL the reshare
    /// chains of those posts up to `max_hops` back over `FORWARDED`.
    ByEvent { event: String, max_hops: u32 },
    /// Distinct reshare edges up to `max_hops` back from one post.
    ByPost { vertex_id: String, max_hops: u32 },
    /// Properties of exactly one vertex with the given label.
    FetchVertex { vertex_id: String, label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub shape: TraversalShape,
    pub text: String,
    pub params: BTreeMap<String, GraphValue>,
}

impl GraphQuery {
    fn new(shape: TraversalShape, text: String) -> Self {
        Self {
            shape,
            text,
            params: BTreeMap::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<GraphValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self.shape {
            TraversalShape::EventLookup { .. } | TraversalShape::VertexLookup { .. } => {
                LOOKUP_COLUMNS
            }
            TraversalShape::ByEvent { .. } | TraversalShape::ByPost { .. } => EDGE_COLUMNS,
            TraversalShape::FetchVertex { .. } => FETCH_COLUMNS,
        }
    }
}

/// Projection shared by all edge-yielding branches. Expects `r`, `src`, `dst` in scope.
const EDGE_PROJECTION: &str = "src.vid AS vid, dst.vid AS end_vid, head(labels(src)) AS src_type, \
     properties(src) AS src_props, properties(r) AS e, coalesce(r.rank, 0) AS e_rank, \
     type(r) AS e_type, startNode(r).vid AS e_src, endNode(r).vid AS e_dst";

pub fn event_lookup(event: &str) -> GraphQuery {
    let text = format!(
        "MATCH (ev:{EVENT_LABEL} {{eventstr: $event}}) RETURN ev.vid AS vid LIMIT 1"
    );
    GraphQuery::new(
        TraversalShape::EventLookup {
            event: event.to_string(),
        },
        text,
    )
    .param("event", event)
}

pub fn vertex_lookup(vertex_id: &str) -> GraphQuery {
    let text = "MATCH (v {vid: $id}) RETURN v.vid AS vid LIMIT 1".to_string();
    GraphQuery::new(
        TraversalShape::VertexLookup {
            vertex_id: vertex_id.to_string(),
        },
        text,
    )
    .param("id", vertex_id)
}

pub fn propagation_by_event(event: &str) -> GraphQuery {
    let hops = EVENT_RESHARE_HOPS;
    let text = format!(
        "MATCH (dst:{EVENT_LABEL} {{eventstr: $event}})<-[r:{BELONG}]-(src) \
         RETURN {EDGE_PROJECTION} \
         UNION ALL \
         MATCH (:{EVENT_LABEL} {{eventstr: $event}})<-[:{BELONG}]-(origin) \
         MATCH path = (origin)<-[:{FORWARDED}*1..{hops}]-() \
         WITH last(relationships(path)) AS r \
         WITH r, startNode(r) AS src, endNode(r) AS dst \
         RETURN {EDGE_PROJECTION}"
    );
    GraphQuery::new(
        TraversalShape::ByEvent {
            event: event.to_string(),
            max_hops: hops,
        },
        text,
    )
    .param("event", event)
}

pub fn propagation_by_post(vertex_id: &str) -> GraphQuery {
    let hops = POST_RESHARE_HOPS;
    let text = format!(
        "MATCH path = ({{vid: $id}})<-[:{FORWARDED}*1..{hops}]-() \
         WITH last(relationships(path)) AS r \
         WITH r, startNode(r) AS src, endNode(r) AS dst \
         RETURN DISTINCT {EDGE_PROJECTION}"
    );
    GraphQuery::new(
        TraversalShape::ByPost {
            vertex_id: vertex_id.to_string(),
            max_hops: hops,
        },
        text,
    )
    .param("id", vertex_id)
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Labels cannot be bound as parameters, so they must be plain identifiers.
pub fn fetch_vertex(vertex_id: &str, label: &str) -> Result<GraphQuery, TraceError> {
    if !IDENTIFIER.is_match(label) {
        return Err(TraceError::Validation(format!("invalid vertex label: {label:?}")));
    }
    let text = format!("MATCH (v:{label} {{vid: $id}}) RETURN v.vid AS vid, properties(v) AS src_v");
    Ok(GraphQuery::new(
        TraversalShape::FetchVertex {
            vertex_id: vertex_id.to_string(),
            label: label.to_string(),
        },
        text,
    )
    .param("id", vertex_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_query_binds_name_as_parameter() {
        let q = propagation_by_event("x' OR 1=1 //");
        assert!(!q.text.contains("OR 1=1"));
        assert_eq!(q.params.get("event"), Some(&GraphValue::from("x' OR 1=1 //")));
        assert!(q.text.contains("UNION ALL"));
        assert!(q.text.contains(&format!("*1..{EVENT_RESHARE_HOPS}")));
        assert_eq!(q.columns(), EDGE_COLUMNS);
    }

    #[test]
    fn post_query_is_distinct_with_ten_hops() {
        let q = propagation_by_post("4890");
        assert!(q.text.contains("RETURN DISTINCT"));
        assert!(q.text.contains("*1..10"));
        assert_eq!(
            q.shape,
            TraversalShape::ByPost {
                vertex_id: "4890".into(),
                max_hops: 10
            }
        );
    }

    #[test]
    fn fetch_rejects_non_identifier_labels() {
        assert!(fetch_vertex("1", "Original_Tweet").is_ok());
        let err = fetch_vertex("1", "Tweet) DETACH DELETE (n").unwrap_err();
        assert!(matches!(err, TraceError::Validation(_)));
    }

    #[test]
    fn fetch_yields_vid_and_properties() {
        let q = fetch_vertex("1", "Original_Tweet").unwrap();
        assert_eq!(q.columns(), FETCH_COLUMNS);
        assert!(q.text.contains("MATCH (v:Original_Tweet {vid: $id})"));
    }
}
