pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, FileConfig, TimestampPrecision, Weighting};
pub use error::{with_deadline, QueryErrorKind, QueryExecutionError, TraceError, TraceResult};
pub use types::*;
