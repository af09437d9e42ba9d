use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spreadtrace_common::Config;
use spreadtrace_graph::{GraphBackend, GraphClient, PropagationService, PropertySchema};
use spreadtrace_search::{ElasticRecall, SearchBackend, TextSearch};

mod error;
mod routes;

/// Process-wide handles, built once at startup and shared by every request.
pub struct AppContext {
    pub graph: PropagationService<Arc<dyn GraphBackend>>,
    pub search: TextSearch<Arc<dyn SearchBackend>>,
    pub default_threshold: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spreadtrace=info".parse()?))
        .init();

    let config = Config::from_env()?;
    let file = &config.file;

    let schema = Arc::new(PropertySchema::from_config(
        &file.schema,
        file.graph.timestamp_precision,
    )?);

    let graph: Arc<dyn GraphBackend> = Arc::new(
        GraphClient::connect(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
            file.graph.pool_size,
        )
        .await?,
    );
    let index: Arc<dyn SearchBackend> = Arc::new(
        ElasticRecall::connect(
            &config.es_url,
            &config.es_index,
            config.es_user.as_deref(),
            config.es_password.as_deref(),
        )
        .await?,
    );

    let ctx = Arc::new(AppContext {
        graph: PropagationService::new(graph, schema)
            .with_original_post_label(file.graph.original_post_label.clone())
            .with_query_timeout(file.timeouts.query()),
        search: TextSearch::from_config(index, file),
        default_threshold: file.search.default_threshold,
    });

    let app = routes::router(ctx)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Spreadtrace API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
