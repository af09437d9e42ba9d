use std::time::Duration;

use futures::future::try_join_all;
use spreadtrace_common::{with_deadline, Candidate, FileConfig, TraceError, TraceResult};
use tracing::{info, warn};

use crate::attribution::AttributionPolicy;
use crate::ngram::{NgramReranker, Reranker};
use crate::recall::{RawDoc, SearchBackend};
use crate::vector::VectorSearch;

const DEFAULT_RECALL_SIZE: usize = 100;
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Recall, rerank, threshold and attribute.
pub struct TextSearch<S, R = NgramReranker> {
    backend: S,
    reranker: R,
    policy: AttributionPolicy,
    recall_size: usize,
    query_timeout: Duration,
}

impl<S: SearchBackend> TextSearch<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            reranker: NgramReranker::default(),
            policy: AttributionPolicy::default(),
            recall_size: DEFAULT_RECALL_SIZE,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn from_config(backend: S, config: &FileConfig) -> Self {
        let reranker = NgramReranker::new(config.search.ngram_length)
            .with_weighting(config.search.weighting);
        Self::new(backend)
            .with_reranker(reranker)
            .with_policy(AttributionPolicy::from_config(&config.attribution))
            .with_recall_size(config.search.recall_size)
            .with_query_timeout(config.timeouts.query())
    }
}

impl<S: SearchBackend, R: Reranker> TextSearch<S, R> {
    pub fn with_reranker<R2: Reranker>(self, reranker: R2) -> TextSearch<S, R2> {
        TextSearch {
            backend: self.backend,
            reranker,
            policy: self.policy,
            recall_size: self.recall_size,
            query_timeout: self.query_timeout,
        }
    }

    pub fn with_policy(mut self, policy: AttributionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_recall_size(mut self, recall_size: usize) -> Self {
        self.recall_size = recall_size;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Candidates scoring strictly above `threshold`, attributed, in recall order.
    pub async fn search(&self, query: &str, threshold: f64) -> TraceResult<Vec<Candidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TraceError::Validation("missing required parameter: queryContent".into()));
        }
        if !threshold.is_finite() {
            return Err(TraceError::Validation(format!("invalid threshold: {threshold}")));
        }

        let docs = with_deadline(
            self.query_timeout,
            query,
            self.backend.recall(query, self.recall_size),
        )
        .await
        .inspect_err(|e| warn!(kind = ?e.kind, error = %e.error, "Recall failed"))?;
        if docs.is_empty() {
            info!(query, "Recall returned nothing");
            return Ok(Vec::new());
        }
        let recalled = docs.len();

        let mut candidates: Vec<Candidate> = docs.into_iter().map(Candidate::from).collect();
        let bodies: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        let scores = self.reranker.score(query, &bodies);
        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.similarity = score;
        }
        candidates.retain(|c| c.similarity > threshold);

        let summary = self.policy.attribute(&mut candidates)?;
        info!(
            query,
            recalled,
            kept = candidates.len(),
            sources = summary.sources,
            "Text search done"
        );
        Ok(candidates)
    }

    /// The indexed post with exactly this id, attributed without a threshold.
    pub async fn search_by_post_id(&self, id: &str) -> TraceResult<Vec<Candidate>> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TraceError::Validation("missing required parameter: id".into()));
        }
        let mut candidates = self.lookup(id).await?;
        if candidates.is_empty() {
            return Err(TraceError::NotFound(format!("post {id:?}")));
        }
        self.policy.attribute(&mut candidates)?;
        Ok(candidates)
    }

    /// Run a media signature through `vectors` and resolve the top-ranked ids
    /// to indexed posts. Ids missing from the index are skipped. The resolved
    /// set is attributed as a whole, so each event keeps at most one source.
    pub async fn resolve_media_hits<V: VectorSearch>(
        &self,
        vectors: &V,
        signature: &[u8],
        top_k: usize,
    ) -> TraceResult<Vec<Candidate>> {
        if signature.is_empty() {
            return Err(TraceError::Validation("empty media signature".into()));
        }
        let ranked = with_deadline(
            self.query_timeout,
            "vector search",
            vectors.search(signature, top_k),
        )
        .await?;
        let ids = ranked.into_iter().next().unwrap_or_default();

        let resolved = try_join_all(ids.iter().map(|id| self.lookup(id))).await?;
        let mut hits: Vec<Candidate> = resolved.into_iter().flatten().collect();
        let summary = self.policy.attribute(&mut hits)?;
        info!(
            ids = ids.len(),
            resolved = hits.len(),
            sources = summary.sources,
            "Media hits resolved"
        );
        Ok(hits)
    }

    /// Exact-id hits, scored 1.0 and still `Unset`.
    async fn lookup(&self, id: &str) -> TraceResult<Vec<Candidate>> {
        let docs: Vec<RawDoc> =
            with_deadline(self.query_timeout, id, self.backend.lookup_by_id(id, 1)).await?;
        Ok(docs
            .into_iter()
            .map(|doc| Candidate {
                similarity: 1.0,
                ..Candidate::from(doc)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use spreadtrace_common::QueryExecutionError;

    struct Fixed(Vec<RawDoc>);

    #[async_trait]
    impl SearchBackend for Fixed {
        async fn recall(&self, _: &str, limit: usize) -> Result<Vec<RawDoc>, QueryExecutionError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }

        async fn lookup_by_id(
            &self,
            id: &str,
            limit: usize,
        ) -> Result<Vec<RawDoc>, QueryExecutionError> {
            Ok(self.0.iter().filter(|d| d.id == id).take(limit).cloned().collect())
        }
    }

    fn doc(id: &str, content: &str) -> RawDoc {
        RawDoc {
            id: id.into(),
            event_id: "E".into(),
            platform: "weibo".into(),
            timestamp: format!("2024-01-0{id} 00:00:00"),
            content: content.into(),
            is_original_post: true,
            ..RawDoc::default()
        }
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let search = TextSearch::new(Fixed(vec![]));
        assert!(matches!(search.search("   ", 0.3).await, Err(TraceError::Validation(_))));
        assert!(matches!(search.search("q", f64::NAN).await, Err(TraceError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_recall_is_empty_result() {
        let search = TextSearch::new(Fixed(vec![]));
        assert!(search.search("正式上市", 0.3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recall_size_bounds_the_candidate_set() {
        let docs = (1..=5).map(|i| doc(&i.to_string(), "正式在中国上市")).collect();
        let search = TextSearch::new(Fixed(docs)).with_recall_size(2);
        let hits = search.search("正式在中国上市", 0.0).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn id_lookup_skips_threshold_and_scores_exact() {
        let search = TextSearch::new(Fixed(vec![doc("1", "abc"), doc("2", "xyz")]));
        let hits = search.search_by_post_id("2").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].similarity, 1.0);
        assert!(hits[0].is_source());

        assert!(matches!(search.search_by_post_id("9").await, Err(TraceError::NotFound(_))));
        assert!(matches!(search.search_by_post_id(" ").await, Err(TraceError::Validation(_))));
    }
}
