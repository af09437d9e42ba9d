use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use spreadtrace_common::{TimestampPrecision, TraceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
}

impl FromStr for TypeTag {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(TypeTag::String),
            "int" => Ok(TypeTag::Int),
            "float" => Ok(TypeTag::Float),
            "bool" => Ok(TypeTag::Bool),
            "timestamp" => Ok(TypeTag::Timestamp),
            other => Err(TraceError::Config(format!("unknown property type tag: {other}"))),
        }
    }
}

/// Property types of the deployed graph space.
const BUILTIN_TYPES: &[(&str, TypeTag)] = &[
    // Event
    ("eventstr", TypeTag::String),
    // Article
    ("title", TypeTag::String),
    ("content", TypeTag::String),
    ("publishtimestamp", TypeTag::Timestamp),
    ("event", TypeTag::String),
    ("uid", TypeTag::String),
    ("pics_id", TypeTag::String),
    ("pics_url", TypeTag::String),
    ("isrumor", TypeTag::Bool),
    ("rumor_c", TypeTag::String),
    ("datasource", TypeTag::String),
    ("eid", TypeTag::String),
    // Original_Tweet
    ("forwardcount", TypeTag::Int),
    // Retweet
    ("reuid", TypeTag::String),
    ("retext", TypeTag::String),
    ("republishtime", TypeTag::Timestamp),
    ("rootmid", TypeTag::String),
    ("parentmid", TypeTag::String),
    ("name", TypeTag::String),
];

/// Property name -> type mapping, built once at startup and shared read-only.
/// Names missing from the map are treated as `String`.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    types: HashMap<String, TypeTag>,
    precision: TimestampPrecision,
}

impl Default for PropertySchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PropertySchema {
    pub fn builtin() -> Self {
        Self {
            types: BUILTIN_TYPES
                .iter()
                .map(|(name, tag)| (name.to_string(), *tag))
                .collect(),
            precision: TimestampPrecision::Seconds,
        }
    }

    /// Built-in table layered with config overrides.
    pub fn from_config(
        overrides: &BTreeMap<String, String>,
        precision: TimestampPrecision,
    ) -> Result<Self, TraceError> {
        let mut schema = Self::builtin();
        for (name, tag) in overrides {
            schema.types.insert(name.clone(), tag.parse()?);
        }
        schema.precision = precision;
        Ok(schema)
    }

    pub fn with_precision(mut self, precision: TimestampPrecision) -> Self {
        self.precision = precision;
        self
    }

    pub fn type_of(&self, property: &str) -> TypeTag {
        self.types.get(property).copied().unwrap_or(TypeTag::String)
    }

    pub fn timestamp_format(&self) -> &'static str {
        self.precision.format()
    }
}
