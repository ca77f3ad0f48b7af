//! Request handlers behind the transport

use crate::error::{PipelineError, Result};
use crate::export;
use crate::ingest;
use crate::pipeline::ScoringPipeline;
use crate::session::{PredictionSession, SessionSnapshot};
use crate::types::response::{ErrorResponse, HealthResponse, ScoreResponse};
use std::sync::Arc;
use tracing::{error, info};

/// Scoring service state shared by all request handlers
pub struct ScoringService {
    pipeline: ScoringPipeline,
    session: PredictionSession,
    max_batch_bytes: usize,
}

impl ScoringService {
    pub fn new(pipeline: ScoringPipeline, max_batch_bytes: usize) -> Self {
        Self {
            pipeline,
            session: PredictionSession::new(),
            max_batch_bytes,
        }
    }

    pub fn session(&self) -> &PredictionSession {
        &self.session
    }

    /// Score a CSV or xlsx/xls payload and make it the latest prediction session
    pub fn score(&self, payload: &[u8]) -> Result<Arc<SessionSnapshot>> {
        if payload.len() > self.max_batch_bytes {
            return Err(PipelineError::UnreadableInput(format!(
                "payload of {} bytes exceeds the {} byte limit",
                payload.len(),
                self.max_batch_bytes
            )));
        }

        let batch = ingest::read_bytes(payload)?;
        self.pipeline.score_into_session(&batch, &self.session)
    }

    /// Score and build the reply body
    pub fn handle_score(&self, payload: &[u8]) -> std::result::Result<ScoreResponse, ErrorResponse> {
        match self.score(payload) {
            Ok(snapshot) => {
                info!(
                    batch_id = %snapshot.batch_id,
                    rows = snapshot.summary.total_rows,
                    fraud = snapshot.summary.fraud_count,
                    fraud_percentage = snapshot.summary.fraud_percentage,
                    "Batch scored"
                );
                Ok(ScoreResponse::from_snapshot(&snapshot))
            }
            Err(e) => {
                error!(kind = e.kind(), error = %e, "Scoring request failed");
                Err(ErrorResponse::from(&e))
            }
        }
    }

    /// Latest snapshot, or the "no predictions" error
    pub fn handle_predictions(&self) -> std::result::Result<Arc<SessionSnapshot>, ErrorResponse> {
        self.session.latest().ok_or_else(ErrorResponse::no_predictions)
    }

    /// Latest snapshot as export CSV
    pub fn handle_export(&self) -> std::result::Result<Vec<u8>, ErrorResponse> {
        let snapshot = self.handle_predictions()?;
        export::to_csv_bytes(&snapshot.scored).map_err(|e| {
            error!(error = %e, "Export failed");
            ErrorResponse::new("export", e.to_string())
        })
    }

    pub fn handle_health(&self) -> HealthResponse {
        HealthResponse::healthy(true)
    }
}
