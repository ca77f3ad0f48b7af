//! Reply payloads of the scoring service

use crate::error::PipelineError;
use crate::session::SessionSnapshot;
use crate::types::scored::FraudCountSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reply to a successful scoring request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub success: bool,
    pub batch_id: Uuid,
    pub total_rows: usize,
    pub fraud_count: usize,
    pub legit_count: usize,
    pub fraud_percentage: f64,
    pub model_fraud_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_fraud_count: Option<usize>,
    pub count_source: FraudCountSource,
    pub predictions: Vec<u8>,
    /// `[legit, fraud]` per record
    pub probabilities: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_flags: Option<Vec<u8>>,
    pub message: String,
}

impl ScoreResponse {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let summary = &snapshot.summary;
        Self {
            success: true,
            batch_id: snapshot.batch_id,
            total_rows: summary.total_rows,
            fraud_count: summary.fraud_count,
            legit_count: summary.legit_count,
            fraud_percentage: summary.fraud_percentage,
            model_fraud_count: summary.model_fraud_count,
            rule_fraud_count: summary.rule_fraud_count,
            count_source: summary.count_source,
            predictions: snapshot.scored.predictions(),
            probabilities: snapshot.scored.probabilities(),
            rule_flags: snapshot.scored.rule_flags(),
            message: format!("Successfully processed {} records", summary.total_rows),
        }
    }
}

/// Reply to a failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.to_string(),
        }
    }

    pub fn no_predictions() -> Self {
        Self::new("not_found", "No predictions available")
    }
}

impl From<&PipelineError> for ErrorResponse {
    fn from(e: &PipelineError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

/// Liveness reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy(model_loaded: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            model_loaded,
            timestamp: Utc::now(),
        }
    }
}
