//! Prediction session state: the latest scored batch.

use crate::reconciler::ReconcileReport;
use crate::types::scored::{ScoredBatch, Summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Immutable result of one successful scoring request
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub scored: ScoredBatch,
    pub summary: Summary,
    pub report: ReconcileReport,
}

impl SessionSnapshot {
    pub fn new(scored: ScoredBatch, summary: Summary, report: ReconcileReport) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            scored,
            summary,
            report,
        }
    }
}

/// Holder of the current snapshot.
///
/// Writers swap the whole `Arc`; readers clone it. A reader therefore sees
/// either the old batch with its statistics or the new one, never a mix.
#[derive(Debug, Default)]
pub struct PredictionSession {
    current: RwLock<Option<Arc<SessionSnapshot>>>,
}

impl PredictionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot, returning the one it displaced
    pub fn replace(
        &self,
        snapshot: impl Into<Arc<SessionSnapshot>>,
    ) -> Option<Arc<SessionSnapshot>> {
        let snapshot = snapshot.into();
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        current.replace(snapshot)
    }

    /// Latest snapshot, if any request has succeeded
    pub fn latest(&self) -> Option<Arc<SessionSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.latest().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::summarize;
    use crate::types::scored::FraudCountSource;

    fn snapshot(rows: usize) -> SessionSnapshot {
        SessionSnapshot::new(
            ScoredBatch::default(),
            summarize(rows, 0, None, FraudCountSource::Model),
            ReconcileReport::default(),
        )
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let session = PredictionSession::new();
        assert!(session.is_empty());

        assert!(session.replace(snapshot(1)).is_none());
        let first = session.latest().unwrap();

        let displaced = session.replace(snapshot(2)).unwrap();
        assert_eq!(displaced.batch_id, first.batch_id);

        let latest = session.latest().unwrap();
        assert_eq!(latest.summary.total_rows, 2);
        assert_ne!(latest.batch_id, first.batch_id);
        // Old readers keep their consistent view
        assert_eq!(first.summary.total_rows, 1);
    }

    #[test]
    fn test_concurrent_readers_see_consistent_snapshots() {
        let session = Arc::new(PredictionSession::new());
        session.replace(snapshot(0));

        let writer = {
            let session = session.clone();
            std::thread::spawn(move || {
                for rows in 1..200 {
                    session.replace(snapshot(rows));
                }
            })
        };

        for _ in 0..200 {
            let snap = session.latest().unwrap();
            assert_eq!(snap.summary.legit_count, snap.summary.total_rows);
        }
        writer.join().unwrap();
    }
}
