use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph};
use spreadtrace_common::{QueryExecutionError, TraceError};

use crate::backend::GraphBackend;
use crate::query::GraphQuery;
use crate::value::{GraphRow, GraphValue};

/// Thin wrapper around neo4rs::Graph providing pooled connection setup.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    /// Connect and verify the server answers. Any failure is a startup error.
    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        pool_size: usize,
    ) -> Result<Self, TraceError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(pool_size)
            .build()
            .map_err(|e| TraceError::connection_init("neo4j", e))?;
        let graph = Graph::connect(config)
            .await
            .map_err(|e| TraceError::connection_init("neo4j", e))?;
        graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| TraceError::connection_init("neo4j", e))?;
        tracing::info!(uri, pool_size, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl GraphBackend for GraphClient {
    async fn execute(&self, query: &GraphQuery) -> Result<Vec<GraphRow>, QueryExecutionError> {
        let mut q = neo4rs::query(&query.text);
        for (key, value) in &query.params {
            q = q.param(key, to_bolt(value));
        }

        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| QueryExecutionError::backend(e, &query.text))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| QueryExecutionError::backend(e, &query.text))?
        {
            let mut out = GraphRow::new();
            for column in query.columns() {
                let value = row
                    .get::<BoltType>(column)
                    .map(from_bolt)
                    .unwrap_or(GraphValue::Null);
                out.insert(*column, value);
            }
            rows.push(out);
        }
        Ok(rows)
    }
}

/// Library-native extraction. Kinds without a primitive counterpart keep
/// the driver's debug rendering.
pub fn from_bolt(value: BoltType) -> GraphValue {
    match value {
        BoltType::Null(_) => GraphValue::Null,
        BoltType::Boolean(b) => GraphValue::Bool(b.value),
        BoltType::Integer(i) => GraphValue::Int(i.value),
        BoltType::Float(f) => GraphValue::Float(f.value),
        BoltType::String(s) => GraphValue::Text(s.value),
        BoltType::Bytes(b) => GraphValue::Bytes(b.value.to_vec()),
        BoltType::List(list) => GraphValue::List(list.value.into_iter().map(from_bolt).collect()),
        BoltType::Map(map) => from_bolt_map(map),
        BoltType::Node(node) => from_bolt_map(node.properties),
        BoltType::Relation(rel) => from_bolt_map(rel.properties),
        other => GraphValue::Other(format!("{other:?}")),
    }
}

fn from_bolt_map(map: BoltMap) -> GraphValue {
    GraphValue::Map(
        map.value
            .into_iter()
            .map(|(k, v)| (k.value, from_bolt(v)))
            .collect(),
    )
}

fn to_bolt(value: &GraphValue) -> BoltType {
    match value {
        GraphValue::Null => BoltType::Null(BoltNull),
        GraphValue::Bool(b) => BoltType::from(*b),
        GraphValue::Int(i) => BoltType::from(*i),
        GraphValue::Float(x) => BoltType::from(*x),
        GraphValue::Text(s) | GraphValue::Other(s) => BoltType::from(s.clone()),
        // Parameters are always ids and names; bytes are only ever read.
        GraphValue::Bytes(b) => BoltType::from(String::from_utf8_lossy(b).into_owned()),
        GraphValue::List(items) => BoltType::List(BoltList {
            value: items.iter().map(to_bolt).collect(),
        }),
        GraphValue::Map(map) => BoltType::Map(BoltMap::from_iter(
            map.iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v))),
        )),
    }
}
