use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::decode::{decode, TypedValue};
use crate::schema::PropertySchema;
use crate::value::{GraphRow, GraphValue};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexRecord {
    pub vertex_id: String,
    pub vertex_type: String,
    pub properties: BTreeMap<String, TypedValue>,
}

/// One reshare/belong hop, owned by the response it was built for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationEdge {
    pub src_vertex_id: String,
    pub dst_vertex_id: String,
    pub edge_type: String,
    pub edge_rank: i64,
    pub edge_properties: BTreeMap<String, TypedValue>,
    pub src_vertex: VertexRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationGraph {
    pub edges: Vec<PropagationEdge>,
    /// Distinct vertex ids appearing on either end of an edge.
    pub vertex_count: usize,
}

impl PropagationGraph {
    pub fn from_edges(edges: Vec<PropagationEdge>) -> Self {
        let vertices: BTreeSet<&str> = edges
            .iter()
            .flat_map(|e| [e.src_vertex_id.as_str(), e.dst_vertex_id.as_str()])
            .collect();
        let vertex_count = vertices.len();
        Self {
            edges,
            vertex_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// `Article.publishtimestamp` -> `publishtimestamp`.
pub fn bare_property_name(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// Build one edge per row. Missing columns decode as empty values; no row is dropped.
pub fn reconstruct(rows: &[GraphRow], schema: &PropertySchema) -> Vec<PropagationEdge> {
    rows.iter().map(|row| edge_from_row(row, schema)).collect()
}

fn edge_from_row(row: &GraphRow, schema: &PropertySchema) -> PropagationEdge {
    let src_vertex_id = column_text(row, "vid", schema);
    PropagationEdge {
        dst_vertex_id: column_text(row, "end_vid", schema),
        edge_type: column_text(row, "e_type", schema),
        edge_rank: column_int(row, "e_rank"),
        edge_properties: decode_properties(row.get("e"), schema),
        src_vertex: VertexRecord {
            vertex_id: src_vertex_id.clone(),
            vertex_type: column_text(row, "src_type", schema),
            properties: decode_properties(row.get("src_props"), schema),
        },
        src_vertex_id,
    }
}

/// Vertex from a fetch row (`vid`, `src_v`).
pub fn vertex_from_fetch(row: &GraphRow, vertex_type: &str, schema: &PropertySchema) -> VertexRecord {
    VertexRecord {
        vertex_id: column_text(row, "vid", schema),
        vertex_type: vertex_type.to_string(),
        properties: decode_properties(row.get("src_v"), schema),
    }
}

fn decode_properties(
    cell: Option<&GraphValue>,
    schema: &PropertySchema,
) -> BTreeMap<String, TypedValue> {
    let Some(map) = cell.and_then(GraphValue::as_map) else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(column, raw)| {
            let name = bare_property_name(column);
            (name.to_string(), decode(raw, name, schema))
        })
        .collect()
}

fn column_text(row: &GraphRow, column: &str, schema: &PropertySchema) -> String {
    row.get(column)
        .map(|raw| decode(raw, bare_property_name(column), schema).to_string())
        .unwrap_or_default()
}

fn column_int(row: &GraphRow, column: &str) -> i64 {
    match row.get(column) {
        Some(GraphValue::Int(i)) => *i,
        Some(GraphValue::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
