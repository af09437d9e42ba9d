pub mod attribution;
pub mod elastic;
pub mod ngram;
pub mod orchestrator;
pub mod recall;
pub mod vector;

pub use attribution::{AttributionPolicy, AttributionSummary};
pub use elastic::ElasticRecall;
pub use ngram::{char_ngrams, rerank, NgramReranker, Reranker};
pub use orchestrator::TextSearch;
pub use recall::{RawDoc, SearchBackend};
pub use vector::VectorSearch;
