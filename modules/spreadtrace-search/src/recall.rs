//! First-stage recall: the document shape returned by the full-text index and
//! the backend seam the orchestrator calls through.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use spreadtrace_common::{Candidate, QueryExecutionError, SourceState};

/// Fields requested from the index for every hit.
pub const SOURCE_FIELDS: &[&str] = &[
    "id", "title", "content", "publishtime", "event", "uid", "uname", "isrumor", "datasource",
    "istweet", "isretweet", "retext", "pic_ids", "pic_urls",
];

/// One `_source` document as stored in the index.
///
/// Index documents were written by several loaders, so scalar fields are read
/// leniently: ids may be numbers, flags may be `0`/`1` or `"true"`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawDoc {
    #[serde(deserialize_with = "loose_string")]
    pub id: String,
    #[serde(rename = "event", deserialize_with = "loose_string")]
    pub event_id: String,
    #[serde(rename = "datasource", deserialize_with = "loose_string")]
    pub platform: String,
    #[serde(rename = "publishtime", deserialize_with = "loose_string")]
    pub timestamp: String,
    #[serde(deserialize_with = "loose_string")]
    pub content: String,
    #[serde(rename = "istweet", deserialize_with = "loose_bool")]
    pub is_original_post: bool,
    #[serde(rename = "isretweet", deserialize_with = "loose_bool")]
    pub is_reshare: bool,
    #[serde(rename = "uid", deserialize_with = "loose_string")]
    pub author_id: String,
    #[serde(rename = "uname", deserialize_with = "loose_opt_string")]
    pub author_name: Option<String>,
    #[serde(deserialize_with = "loose_opt_string")]
    pub title: Option<String>,
    #[serde(rename = "isrumor", deserialize_with = "loose_opt_bool")]
    pub is_rumor: Option<bool>,
    #[serde(deserialize_with = "loose_opt_string")]
    pub retext: Option<String>,
    #[serde(rename = "pic_urls", deserialize_with = "string_list")]
    pub image_urls: Vec<String>,
}

impl From<RawDoc> for Candidate {
    fn from(doc: RawDoc) -> Self {
        Candidate {
            id: doc.id,
            event_id: doc.event_id,
            platform: doc.platform,
            author_id: doc.author_id,
            timestamp: doc.timestamp,
            content: doc.content,
            is_original_post: doc.is_original_post,
            is_reshare: doc.is_reshare,
            similarity: 0.0,
            source_state: SourceState::Unset,
            title: doc.title,
            author_name: doc.author_name,
            is_rumor: doc.is_rumor,
            retext: doc.retext,
            image_urls: doc.image_urls,
        }
    }
}

/// Full-text index reached by the orchestrator. Implementations must not retry.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Up to `limit` documents by full-text relevance to `query`, best first.
    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<RawDoc>, QueryExecutionError>;

    /// Documents whose `id` equals `id` exactly.
    async fn lookup_by_id(&self, id: &str, limit: usize)
        -> Result<Vec<RawDoc>, QueryExecutionError>;
}

#[async_trait]
impl<T: SearchBackend + ?Sized> SearchBackend for Arc<T> {
    async fn recall(&self, query: &str, limit: usize) -> Result<Vec<RawDoc>, QueryExecutionError> {
        (**self).recall(query, limit).await
    }

    async fn lookup_by_id(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<RawDoc>, QueryExecutionError> {
        (**self).lookup_by_id(id, limit).await
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn scalar_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(loose_opt_string(d)?.unwrap_or_default())
}

fn loose_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(scalar_to_string))
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(loose_opt_bool(d)?.unwrap_or(false))
}

fn loose_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(scalar_to_bool))
}

/// A list of strings, or a single comma-separated string.
fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let urls = match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_index_fields_onto_candidate() {
        let doc: RawDoc = serde_json::from_value(json!({
            "id": 4_890_000_123u64,
            "event": "减重版司美格鲁正式在中国上市",
            "datasource": "weibo",
            "publishtime": "2024-06-25 10:00:00",
            "content": "正式上市",
            "istweet": 1,
            "isretweet": "false",
            "uid": 42,
            "uname": "健康时报",
            "isrumor": 0,
            "pic_urls": ["http://a/1.jpg", "http://a/2.jpg"],
        }))
        .unwrap();

        let c = Candidate::from(doc);
        assert_eq!(c.id, "4890000123");
        assert_eq!(c.event_id, "减重版司美格鲁正式在中国上市");
        assert_eq!(c.platform, "weibo");
        assert!(c.is_original_post);
        assert!(!c.is_reshare);
        assert_eq!(c.author_id, "42");
        assert_eq!(c.author_name.as_deref(), Some("健康时报"));
        assert_eq!(c.is_rumor, Some(false));
        assert_eq!(c.image_urls.len(), 2);
        assert_eq!(c.source_state, SourceState::Unset);
    }

    #[test]
    fn missing_and_null_fields_default() {
        let doc: RawDoc =
            serde_json::from_value(json!({"id": "1", "title": null, "pic_urls": null})).unwrap();
        assert_eq!(doc.id, "1");
        assert!(doc.title.is_none());
        assert!(!doc.is_original_post);
        assert!(doc.image_urls.is_empty());
        assert!(doc.is_rumor.is_none());
    }

    #[test]
    fn comma_separated_image_urls_are_split() {
        let doc: RawDoc =
            serde_json::from_value(json!({"pic_urls": "http://a/1.jpg, http://a/2.jpg,"})).unwrap();
        assert_eq!(doc.image_urls, vec!["http://a/1.jpg", "http://a/2.jpg"]);
    }

    #[test]
    fn unrecognized_flag_text_reads_as_false() {
        let doc: RawDoc = serde_json::from_value(json!({"istweet": "maybe"})).unwrap();
        assert!(!doc.is_original_post);
    }
}
