use std::sync::Arc;

use async_trait::async_trait;
use spreadtrace_common::QueryExecutionError;

/// Nearest-neighbour search over perceptual media signatures.
///
/// Returns one ranked list of post ids per query vector; callers only ever
/// send one vector, so the first list is the answer.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        signature: &[u8],
        top_k: usize,
    ) -> Result<Vec<Vec<String>>, QueryExecutionError>;
}

#[async_trait]
impl<T: VectorSearch + ?Sized> VectorSearch for Arc<T> {
    async fn search(
        &self,
        signature: &[u8],
        top_k: usize,
    ) -> Result<Vec<Vec<String>>, QueryExecutionError> {
        (**self).search(signature, top_k).await
    }
}
