//! End-to-end batch scoring: reconcile -> score -> rule overlay -> aggregate

use crate::aggregator::ResultAggregator;
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::models::{ArtifactBundle, InferenceEngine, UnseenCategoryPolicy};
use crate::reconciler::{ReconcileReport, SchemaReconciler};
use crate::rules::RuleOverlay;
use crate::session::{PredictionSession, SessionSnapshot};
use crate::types::record::Batch;
use crate::types::scored::{FraudCountSource, ScoredBatch, Summary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Policy knobs for a pipeline instance
#[derive(Debug, Clone, Default)]
pub struct ScoringOptions {
    pub unseen_category: UnseenCategoryPolicy,
    pub fraud_count_source: FraudCountSource,
    /// Rule overlay; `None` disables it
    pub rules: Option<RuleOverlay>,
}

/// Output of a successful scoring run
#[derive(Debug, Clone)]
pub struct ScoredOutcome {
    pub scored: ScoredBatch,
    pub summary: Summary,
    pub report: ReconcileReport,
}

/// The scoring pipeline over one artifact bundle
pub struct ScoringPipeline {
    reconciler: SchemaReconciler,
    engine: InferenceEngine,
    overlay: Option<RuleOverlay>,
    aggregator: ResultAggregator,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ScoringPipeline {
    pub fn new(bundle: Arc<ArtifactBundle>, options: ScoringOptions) -> Self {
        Self {
            reconciler: SchemaReconciler::new(bundle.clone(), options.unseen_category),
            engine: InferenceEngine::new(bundle),
            overlay: options.rules,
            aggregator: ResultAggregator::new(options.fraud_count_source),
            metrics: None,
        }
    }

    /// Record per-batch statistics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn rules_enabled(&self) -> bool {
        self.overlay.is_some()
    }

    /// Score a batch.
    ///
    /// Either the whole batch is scored or a single error is returned.
    pub fn score(&self, batch: &Batch) -> Result<ScoredOutcome> {
        let start = Instant::now();
        let result = self.run(batch);

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(outcome) => metrics.record_batch(start.elapsed(), outcome),
                Err(e) => metrics.record_failure(e.kind()),
            }
        }

        result
    }

    fn run(&self, batch: &Batch) -> Result<ScoredOutcome> {
        if batch.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }

        let reconciled = self.reconciler.reconcile(batch)?;
        let model = self.engine.predict(&reconciled.matrix)?;
        let rule_flags = self.overlay.as_ref().map(|overlay| overlay.apply(batch));

        let (scored, summary) =
            self.aggregator
                .aggregate(batch, &model, rule_flags.as_deref())?;

        debug!(
            rows = summary.total_rows,
            fraud = summary.fraud_count,
            model_fraud = summary.model_fraud_count,
            rule_fraud = ?summary.rule_fraud_count,
            fallbacks = reconciled.report.fallbacks.len(),
            "Batch scored"
        );

        Ok(ScoredOutcome {
            scored,
            summary,
            report: reconciled.report,
        })
    }

    /// Score a batch and, on success only, replace the session snapshot
    pub fn score_into_session(
        &self,
        batch: &Batch,
        session: &PredictionSession,
    ) -> Result<Arc<SessionSnapshot>> {
        let outcome = self.score(batch)?;
        let snapshot = Arc::new(SessionSnapshot::new(
            outcome.scored,
            outcome.summary,
            outcome.report,
        ));

        session.replace(snapshot.clone());
        info!(
            batch_id = %snapshot.batch_id,
            rows = batch.len(),
            "Prediction session updated"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureStage;
    use crate::models::ModelLoader;
    use crate::types::record::{Record, Value};
    use std::path::Path;

    fn sample_bundle() -> Arc<ArtifactBundle> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("model/bundle.json");
        Arc::new(ModelLoader::new().load_bundle(path).unwrap())
    }

    fn pipeline(source: FraudCountSource) -> ScoringPipeline {
        ScoringPipeline::new(
            sample_bundle(),
            ScoringOptions {
                unseen_category: UnseenCategoryPolicy::FirstEntry,
                fraud_count_source: source,
                rules: Some(RuleOverlay::default()),
            },
        )
    }

    fn transaction(amount: f64, country: &str, payment: &str, currency: &str) -> Record {
        Record::from_pairs([
            ("Amount", Value::from(amount)),
            ("Country", Value::from(country)),
            ("PaymentType", Value::from(payment)),
            ("Currency", Value::from(currency)),
            ("MerchantCategory", Value::from("Grocery")),
            ("Hour", Value::from(14.0)),
            ("CustomerAge", Value::from(37.0)),
        ])
    }

    fn known_batch() -> Batch {
        Batch::from_records(vec![
            transaction(20000.0, "France", "Cash", "EUR"),
            transaction(5000.0, "Morocco", "Cash", "EUR"),
            transaction(100.0, "France", "Check", "MAD"),
            transaction(100.0, "France", "Cash", "EUR"),
        ])
    }

    #[test]
    fn test_score_preserves_length_and_order() {
        let batch = known_batch();
        let outcome = pipeline(FraudCountSource::Model).score(&batch).unwrap();

        assert_eq!(outcome.scored.len(), batch.len());
        for (scored, original) in outcome.scored.records.iter().zip(&batch.records) {
            assert_eq!(&scored.record, original);
            assert!((scored.fraud_probability + scored.legit_probability - 1.0).abs() < 1e-6);
            assert_eq!(
                scored.model_prediction,
                u8::from(scored.fraud_probability > scored.legit_probability)
            );
        }
        assert_eq!(outcome.scored.rule_flags(), Some(vec![1, 1, 1, 0]));
        assert!(outcome.report.fallbacks.is_empty());
    }

    #[test]
    fn test_rule_count_source_drives_summary() {
        let outcome = pipeline(FraudCountSource::Rules)
            .score(&known_batch())
            .unwrap();
        assert_eq!(outcome.summary.fraud_count, 3);
        assert_eq!(outcome.summary.legit_count, 1);
        assert_eq!(outcome.summary.fraud_percentage, 75.0);
    }

    #[test]
    fn test_unseen_label_still_scores() {
        let batch = Batch::from_records(vec![
            transaction(100.0, "Atlantis", "Cash", "EUR"),
            transaction(100.0, "France", "Barter", "EUR"),
        ]);

        let outcome = pipeline(FraudCountSource::Model).score(&batch).unwrap();
        assert_eq!(outcome.scored.len(), 2);
        assert_eq!(outcome.report.fallbacks.len(), 2);
        assert_eq!(outcome.report.fallbacks[0].substitute, "France");
        assert_eq!(outcome.report.fallbacks[1].substitute, "Bank Transfer");
    }

    #[test]
    fn test_empty_batch_leaves_session_untouched() {
        let session = PredictionSession::new();
        let pipeline = pipeline(FraudCountSource::Model);

        let err = pipeline
            .score_into_session(&Batch::default(), &session)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyBatch));
        assert!(session.is_empty());
    }

    #[test]
    fn test_missing_scaler_column_leaves_session_untouched() {
        let session = PredictionSession::new();
        let pipeline = pipeline(FraudCountSource::Model);
        let first = pipeline
            .score_into_session(&known_batch(), &session)
            .unwrap();

        let batch = Batch::from_records(vec![Record::from_pairs([
            ("Amount", Value::from(10.0)),
            ("Country", Value::from("France")),
            ("Hour", Value::from(3.0)),
        ])]);

        match pipeline.score_into_session(&batch, &session).unwrap_err() {
            PipelineError::MissingFeature { stage, columns } => {
                assert_eq!(stage, FeatureStage::Scaler);
                assert_eq!(columns, vec!["CustomerAge".to_string()]);
            }
            other => panic!("expected missing feature, got {:?}", other),
        }

        assert_eq!(session.latest().unwrap().batch_id, first.batch_id);
    }

    #[test]
    fn test_unparseable_numeric_fails_at_scoring() {
        let mut record = transaction(100.0, "France", "Cash", "EUR");
        record.insert("Hour", "late evening");
        let batch = Batch::from_records(vec![record]);

        let err = pipeline(FraudCountSource::Model).score(&batch).unwrap_err();
        assert!(matches!(err, PipelineError::Scoring(_)));
    }

    #[test]
    fn test_metrics_count_batches_and_failures() {
        let metrics = Arc::new(PipelineMetrics::new());
        let pipeline = pipeline(FraudCountSource::Model).with_metrics(metrics.clone());

        pipeline.score(&known_batch()).unwrap();
        let _ = pipeline.score(&Batch::default());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_scored, 1);
        assert_eq!(snapshot.rows_scored, 4);
        assert_eq!(snapshot.rule_flagged, 3);
        assert_eq!(snapshot.failed_batches, 1);
    }

    #[test]
    fn test_rules_disabled() {
        let pipeline = ScoringPipeline::new(sample_bundle(), ScoringOptions::default());
        assert!(!pipeline.rules_enabled());

        let outcome = pipeline.score(&known_batch()).unwrap();
        assert!(!outcome.scored.has_rule_flags());
        assert_eq!(outcome.summary.rule_fraud_count, None);
    }
}
