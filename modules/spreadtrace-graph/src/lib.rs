pub mod backend;
pub mod client;
pub mod decode;
pub mod memory;
pub mod query;
pub mod reconstruct;
pub mod schema;
pub mod service;
pub mod value;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use backend::GraphBackend;
pub use client::GraphClient;
pub use decode::{decode, TypedValue};
pub use memory::MemoryGraph;
pub use query::{GraphQuery, TraversalShape};
pub use reconstruct::{PropagationEdge, PropagationGraph, VertexRecord};
pub use schema::{PropertySchema, TypeTag};
pub use service::PropagationService;
pub use value::{GraphRow, GraphValue};
