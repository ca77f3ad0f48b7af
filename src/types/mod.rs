//! Type definitions for the scoring pipeline

pub mod record;
pub mod response;
pub mod scored;

pub use record::{Batch, Record, Value};
pub use response::{ErrorResponse, HealthResponse, ScoreResponse};
pub use scored::{FraudCountSource, ScoredBatch, ScoredRecord, Summary};
