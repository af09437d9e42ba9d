use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use spreadtrace_common::{QueryExecutionError, TraceError};
use tracing::{debug, info};

use crate::recall::{RawDoc, SearchBackend, SOURCE_FIELDS};

/// Elasticsearch recall over the `_search` REST endpoint.
#[derive(Debug, Clone)]
pub struct ElasticRecall {
    client: reqwest::Client,
    base_url: String,
    index: String,
    auth: Option<(String, String)>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Option<RawDoc>,
}

impl ElasticRecall {
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            auth: None,
        }
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        self.auth = Some((user.to_string(), password.to_string()));
        self
    }

    /// Build the client and verify the cluster answers. Any failure is fatal.
    pub async fn connect(
        base_url: &str,
        index: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, TraceError> {
        let mut recall = Self::new(base_url, index);
        if let (Some(user), Some(password)) = (user, password) {
            recall = recall.with_basic_auth(user, password);
        }
        recall.ping().await?;
        info!(url = %recall.base_url, index = %recall.index, "Elasticsearch connected");
        Ok(recall)
    }

    pub async fn ping(&self) -> Result<(), TraceError> {
        let resp = self
            .authorized(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(|e| TraceError::connection_init("elasticsearch", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TraceError::connection_init(
                "elasticsearch",
                format!("HTTP {}: {body}", status.as_u16()),
            ));
        }
        Ok(())
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some((user, password)) => req.basic_auth(user, Some(password)),
            None => req,
        }
    }

    async fn search(&self, body: Value) -> Result<Vec<RawDoc>, QueryExecutionError> {
        let query_text = body.to_string();
        let url = format!("{}/{}/_search", self.base_url, self.index);

        let resp = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryExecutionError::backend(e, query_text.as_str()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(QueryExecutionError::backend(
                format!("HTTP {}: {message}", status.as_u16()),
                query_text,
            ));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| QueryExecutionError::backend(e, query_text.as_str()))?;
        let docs = parse_hits(payload).map_err(|e| QueryExecutionError::backend(e, query_text))?;
        debug!(hits = docs.len(), index = %self.index, "Recall returned");
        Ok(docs)
    }
}

/// Relevance query over `content`.
pub fn match_body(query: &str, size: usize) -> Value {
    json!({
        "query": { "match": { "content": query } },
        "_source": SOURCE_FIELDS,
        "size": size,
    })
}

/// Exact lookup on `id`.
pub fn term_body(id: &str, size: usize) -> Value {
    json!({
        "query": { "term": { "id": id } },
        "_source": SOURCE_FIELDS,
        "size": size,
    })
}

/// `hits.hits[]._source`, in response order. Hits without a source are skipped.
pub fn parse_hits(payload: Value) -> Result<Vec<RawDoc>, serde_json::Error> {
    let response: SearchResponse = serde_json::from_value(payload)?;
    Ok(response.hits.hits.into_iter().filter_map(|h| h.source).collect())
}

#[async_trait]
impl SearchBackend for ElasticRecall {
    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<RawDoc>, QueryExecutionError> {
        self.search(match_body(query, limit)).await
    }

    async fn lookup_by_id(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<RawDoc>, QueryExecutionError> {
        self.search(term_body(id, limit)).await
    }
}
