use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use spreadtrace_common::Candidate;
use spreadtrace_graph::{PropagationGraph, VertexRecord};

use crate::error::ApiError;
use crate::AppContext;

// --- Request structs ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSearchRequest {
    #[serde(default)]
    query_content: String,
    threshold: Option<f64>,
}

#[derive(Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    event: String,
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/search/text", post(search_text))
        .route("/search/post", get(search_post))
        .route("/graph/event", get(graph_by_event))
        .route("/graph/post", get(graph_by_post))
        .route("/graph/original", get(graph_original))
        .with_state(ctx)
}

// --- Handlers ---

async fn search_text(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TextSearchRequest>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    let threshold = req.threshold.unwrap_or(ctx.default_threshold);
    Ok(Json(ctx.search.search(&req.query_content, threshold).await?))
}

async fn search_post(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<IdQuery>,
) -> Result<Json<Vec<Candidate>>, ApiError> {
    Ok(Json(ctx.search.search_by_post_id(&params.id).await?))
}

async fn graph_by_event(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<EventQuery>,
) -> Result<Json<PropagationGraph>, ApiError> {
    Ok(Json(ctx.graph.by_event(&params.event).await?))
}

async fn graph_by_post(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<IdQuery>,
) -> Result<Json<PropagationGraph>, ApiError> {
    Ok(Json(ctx.graph.by_post(&params.id).await?))
}

async fn graph_original(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<IdQuery>,
) -> Result<Json<VertexRecord>, ApiError> {
    Ok(Json(ctx.graph.original_post(&params.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use spreadtrace_common::QueryExecutionError;
    use spreadtrace_graph::{
        GraphBackend, GraphValue, MemoryGraph, PropagationService, PropertySchema,
    };
    use spreadtrace_search::{RawDoc, SearchBackend, TextSearch};
    use tower::ServiceExt;

    struct OneDoc;

    #[async_trait]
    impl SearchBackend for OneDoc {
        async fn recall(&self, _: &str, _: usize) -> Result<Vec<RawDoc>, QueryExecutionError> {
            Ok(vec![RawDoc {
                id: "1".into(),
                event_id: "E".into(),
                platform: "weibo".into(),
                timestamp: "2024-01-01 00:00:00".into(),
                content: "减重版司美格鲁正式在中国上市".into(),
                is_original_post: true,
                ..RawDoc::default()
            }])
        }

        async fn lookup_by_id(&self, _: &str, _: usize) -> Result<Vec<RawDoc>, QueryExecutionError> {
            Ok(Vec::new())
        }
    }

    fn app() -> Router {
        let mut graph = MemoryGraph::new();
        graph.add_event("ev1", "launch");
        graph.add_vertex("p0", "Original_Tweet", [("content", GraphValue::from("origin"))]);
        graph.add_belong("p0", "ev1");

        let graph: Arc<dyn GraphBackend> = Arc::new(graph);
        let index: Arc<dyn SearchBackend> = Arc::new(OneDoc);
        let ctx = AppContext {
            graph: PropagationService::new(graph, Arc::new(PropertySchema::builtin())),
            search: TextSearch::new(index),
            default_threshold: 0.3,
        };
        router(Arc::new(ctx))
    }

    async fn call(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn text_search_returns_attributed_candidates() {
        let request = Request::post("/search/text")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"queryContent":"减重版司美格鲁正式在中国上市"}"#))
            .unwrap();
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "1");
        assert_eq!(body[0]["sourceState"], "SOURCE");
    }

    #[tokio::test]
    async fn missing_parameters_are_bad_requests() {
        let (status, body) = call(get("/graph/event")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("event"));
    }

    #[tokio::test]
    async fn absent_vertices_are_not_found() {
        assert_eq!(call(get("/graph/post?id=nope")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(call(get("/search/post?id=nope")).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn event_graph_is_served() {
        let (status, body) = call(get("/graph/event?event=launch")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vertexCount"], 2);
        assert_eq!(body["edges"][0]["edgeType"], "BELONG");
    }

    #[tokio::test]
    async fn health_check() {
        let response = app().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
