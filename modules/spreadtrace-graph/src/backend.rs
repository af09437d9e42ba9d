use std::sync::Arc;

use async_trait::async_trait;
use spreadtrace_common::QueryExecutionError;

use crate::query::GraphQuery;
use crate::value::GraphRow;

/// Executes one traversal query and returns its raw rows.
///
/// Implemented by [`GraphClient`](crate::GraphClient) (Neo4j) and
/// [`MemoryGraph`](crate::MemoryGraph) (in-process). Implementations do not retry.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, QueryExecutionError>;
}

#[async_trait]
impl<B: GraphBackend + ?Sized> GraphBackend for Arc<B> {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, QueryExecutionError> {
        (**self).execute(query).await
    }
}
