use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::types::InvalidTransition;

/// Top-level error taxonomy shared by the graph and search crates.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A process-wide client failed to come up. Startup must abort.
    #[error("Failed to initialize {service}: {message}")]
    ConnectionInit { service: String, message: String },

    #[error(transparent)]
    Query(#[from] QueryExecutionError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Attribution(#[from] InvalidTransition),
}

impl TraceError {
    pub fn connection_init(service: &str, err: impl std::fmt::Display) -> Self {
        Self::ConnectionInit {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    Backend,
    Timeout,
}

/// A recall or traversal call that failed at request time. Carries the
/// failing query text so callers can report it back verbatim.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{kind:?} error: {error} (query: {query})")]
pub struct QueryExecutionError {
    pub kind: QueryErrorKind,
    pub error: String,
    pub query: String,
}

impl QueryExecutionError {
    pub fn backend(error: impl std::fmt::Display, query: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Backend,
            error: error.to_string(),
            query: query.into(),
        }
    }

    pub fn timeout(limit: Duration, query: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Timeout,
            error: format!("deadline of {}ms exceeded", limit.as_millis()),
            query: query.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == QueryErrorKind::Timeout
    }
}

/// Run a backend call under a deadline. Expiry surfaces as a
/// `QueryErrorKind::Timeout` carrying the query text.
pub async fn with_deadline<T, F>(
    limit: Duration,
    query: &str,
    fut: F,
) -> Result<T, QueryExecutionError>
where
    F: Future<Output = Result<T, QueryExecutionError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, query, "Backend call timed out");
            Err(QueryExecutionError::timeout(limit, query))
        }
    }
}

pub type TraceResult<T> = std::result::Result<T, TraceError>;
