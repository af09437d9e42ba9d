use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

/// Endpoints and credentials loaded from environment variables.
/// Tunables live in the TOML [`FileConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Elasticsearch
    pub es_url: String,
    pub es_index: String,
    pub es_user: Option<String>,
    pub es_password: Option<String>,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    pub file: FileConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match env::var("SPREADTRACE_CONFIG") {
            Ok(path) => load_config(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };

        let (es_user, es_password) = credential_pair(
            env::var("ES_USER").ok().filter(|s| !s.is_empty()),
            env::var("ES_PASSWORD").ok().filter(|s| !s.is_empty()),
        )?;

        let config = Self {
            neo4j_uri: required_env("NEO4J_URI")?,
            neo4j_user: required_env("NEO4J_USER")?,
            neo4j_password: required_env("NEO4J_PASSWORD")?,
            es_url: required_env("ES_URL")?,
            es_index: env::var("ES_INDEX").unwrap_or_else(|_| "sns_search_article".to_string()),
            es_user,
            es_password,
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("API_PORT must be a number")?,
            file,
        };

        config.log_summary();
        Ok(config)
    }

    fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  ES_URL: {} (index {})", self.es_url, self.es_index);
        tracing::info!(
            "  ES auth: {}",
            if self.es_user.is_some() { "basic" } else { "<none>" }
        );
        tracing::info!(
            "  recall_size={} ngram_length={} pool_size={}",
            self.file.search.recall_size,
            self.file.search.ngram_length,
            self.file.graph.pool_size
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} environment variable is required"))
}

/// TOML-backed tunables. Every section is optional and falls back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub search: SearchConfig,
    pub graph: GraphConfig,
    pub attribution: AttributionConfig,
    pub timeouts: TimeoutConfig,
    /// Property name -> type tag (`string`, `int`, `float`, `bool`, `timestamp`),
    /// layered over the built-in schema.
    pub schema: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    TermFrequency,
    TfIdf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SearchConfig {
    pub recall_size: usize,
    pub ngram_length: usize,
    pub default_threshold: f64,
    pub weighting: Weighting,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            recall_size: 100,
            ngram_length: 3,
            default_threshold: 0.3,
            weighting: Weighting::TermFrequency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPrecision {
    #[default]
    Seconds,
    Minutes,
}

impl TimestampPrecision {
    pub fn format(self) -> &'static str {
        match self {
            TimestampPrecision::Seconds => "%Y-%m-%d %H:%M:%S",
            TimestampPrecision::Minutes => "%Y-%m-%d %H:%M",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GraphConfig {
    pub pool_size: usize,
    pub original_post_label: String,
    pub timestamp_precision: TimestampPrecision,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            original_post_label: "Original_Tweet".to_string(),
            timestamp_precision: TimestampPrecision::Seconds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AttributionConfig {
    /// Platforms whose posts must be an original, non-reshared post to be
    /// eligible as a source. Posts from any other platform are always eligible.
    pub strict_platforms: BTreeSet<String>,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            strict_platforms: BTreeSet::from(["weibo".to_string()]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutConfig {
    pub query_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { query_ms: 10_000 }
    }
}

impl TimeoutConfig {
    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    config.validate().context("Invalid config values")?;
    Ok(config)
}

impl FileConfig {
    /// Reject tunables that would make every search or query fail silently.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.search.ngram_length > 0, "search.ngram_length must be at least 1");
        ensure!(self.search.recall_size > 0, "search.recall_size must be at least 1");
        ensure!(self.graph.pool_size > 0, "graph.pool_size must be at least 1");
        ensure!(self.timeouts.query_ms > 0, "timeouts.query_ms must be at least 1");
        Ok(())
    }
}

/// Basic-auth credentials come as a pair or not at all.
fn credential_pair(
    user: Option<String>,
    password: Option<String>,
) -> Result<(Option<String>, Option<String>)> {
    match (&user, &password) {
        (Some(_), None) => bail!("ES_USER is set but ES_PASSWORD is not"),
        (None, Some(_)) => bail!("ES_PASSWORD is set but ES_USER is not"),
        _ => Ok((user, password)),
    }
}
