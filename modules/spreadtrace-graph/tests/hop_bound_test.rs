//! Hop-bound behavior of the propagation traversals against a real Neo4j.
//!
//! Requirements: Docker (for Neo4j via testcontainers)
//!
//! Run with: cargo test -p spreadtrace-graph --features test-utils --test hop_bound_test

#![cfg(feature = "test-utils")]

use std::sync::Arc;

use spreadtrace_graph::testutil::{neo4j_container, seed_chain};
use spreadtrace_graph::{PropagationService, PropertySchema, TypedValue};

#[tokio::test]
async fn post_traversal_returns_all_seven_hops() {
    let (_container, client) = neo4j_container().await;
    seed_chain(&client, "launch", 7).await;

    let svc = PropagationService::new(client, Arc::new(PropertySchema::builtin()));
    let graph = svc.by_post("p0").await.expect("by_post");

    assert_eq!(graph.edges.len(), 7);
    assert!(graph.edges.iter().all(|e| e.edge_type == "FORWARDED"));
}

#[tokio::test]
async fn event_traversal_stops_at_five_reshare_hops() {
    let (_container, client) = neo4j_container().await;
    seed_chain(&client, "launch", 7).await;

    let svc = PropagationService::new(client, Arc::new(PropertySchema::builtin()));
    let graph = svc.by_event("launch").await.expect("by_event");

    let forwarded: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| e.edge_type == "FORWARDED")
        .collect();
    let belong = graph.edges.len() - forwarded.len();

    assert_eq!(belong, 1);
    assert_eq!(forwarded.len(), 5);
    assert!(forwarded.iter().all(|e| e.src_vertex_id != "p6" && e.src_vertex_id != "p7"));
}

#[tokio::test]
async fn original_post_fetch_decodes_timestamp() {
    let (_container, client) = neo4j_container().await;
    seed_chain(&client, "launch", 1).await;

    let svc = PropagationService::new(client, Arc::new(PropertySchema::builtin()));
    let vertex = svc.original_post("p0").await.expect("original_post");

    assert_eq!(vertex.vertex_id, "p0");
    assert!(matches!(
        vertex.properties.get("publishtimestamp"),
        Some(TypedValue::Timestamp(_))
    ));
}
