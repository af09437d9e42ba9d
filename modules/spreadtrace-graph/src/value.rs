use std::collections::BTreeMap;
use std::fmt;

/// A property cell as it comes off the wire, before any schema is applied.
///
/// `Other` holds the driver's own textual rendering of values that have no
/// primitive form here (temporal and spatial types).
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Other(String),
}

impl GraphValue {
    pub fn as_map(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match self {
            GraphValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphValue::Null => Ok(()),
            GraphValue::Bool(b) => write!(f, "{b}"),
            GraphValue::Int(i) => write!(f, "{i}"),
            GraphValue::Float(x) => write!(f, "{x}"),
            GraphValue::Text(s) | GraphValue::Other(s) => f.write_str(s),
            GraphValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            GraphValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            GraphValue::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for GraphValue {
    fn from(s: &str) -> Self {
        GraphValue::Text(s.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(s: String) -> Self {
        GraphValue::Text(s)
    }
}

impl From<i64> for GraphValue {
    fn from(i: i64) -> Self {
        GraphValue::Int(i)
    }
}

impl From<f64> for GraphValue {
    fn from(x: f64) -> Self {
        GraphValue::Float(x)
    }
}

impl From<bool> for GraphValue {
    fn from(b: bool) -> Self {
        GraphValue::Bool(b)
    }
}

/// One result row keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphRow {
    columns: BTreeMap<String, GraphValue>,
}

impl GraphRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: GraphValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.columns.get(column)
    }
}
