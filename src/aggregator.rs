//! Result aggregation: joins records with model and rule verdicts

use crate::error::ScoringError;
use crate::models::ModelPredictions;
use crate::types::record::Batch;
use crate::types::scored::{FraudCountSource, ScoredBatch, ScoredRecord, Summary};
use tracing::warn;

/// Round to two decimals for display
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build batch statistics.
///
/// When `source` asks for rule counts but no rule flags exist, the model
/// count is used.
pub fn summarize(
    total_rows: usize,
    model_fraud_count: usize,
    rule_fraud_count: Option<usize>,
    source: FraudCountSource,
) -> Summary {
    let (fraud_count, count_source) = match (source, rule_fraud_count) {
        (FraudCountSource::Rules, Some(count)) => (count, FraudCountSource::Rules),
        (FraudCountSource::Rules, None) => {
            warn!("Rule overlay did not run, counting fraud from model predictions");
            (model_fraud_count, FraudCountSource::Model)
        }
        (FraudCountSource::Model, _) => (model_fraud_count, FraudCountSource::Model),
    };

    let fraud_percentage = if total_rows > 0 {
        round2(fraud_count as f64 / total_rows as f64 * 100.0)
    } else {
        0.0
    };

    Summary {
        total_rows,
        fraud_count,
        legit_count: total_rows - fraud_count,
        fraud_percentage,
        model_fraud_count,
        rule_fraud_count,
        count_source,
    }
}

/// Merges original records with model outputs and optional rule flags
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    source: FraudCountSource,
}

impl ResultAggregator {
    pub fn new(source: FraudCountSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> FraudCountSource {
        self.source
    }

    /// Join everything row by row, preserving input order
    pub fn aggregate(
        &self,
        batch: &Batch,
        model: &ModelPredictions,
        rule_flags: Option<&[u8]>,
    ) -> Result<(ScoredBatch, Summary), ScoringError> {
        let rows = batch.len();
        if model.predictions.len() != rows || model.probabilities.len() != rows {
            return Err(ScoringError::ShapeMismatch(format!(
                "{} records but {} predictions and {} probability rows",
                rows,
                model.predictions.len(),
                model.probabilities.len()
            )));
        }
        if let Some(flags) = rule_flags {
            if flags.len() != rows {
                return Err(ScoringError::ShapeMismatch(format!(
                    "{} records but {} rule flags",
                    rows,
                    flags.len()
                )));
            }
        }

        let records = batch
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let [legit, fraud] = model.probabilities[i];
                ScoredRecord {
                    record: record.clone(),
                    model_prediction: model.predictions[i],
                    fraud_probability: fraud,
                    legit_probability: legit,
                    rule_fraud: rule_flags.map(|flags| flags[i]),
                }
            })
            .collect();

        let rule_fraud_count =
            rule_flags.map(|flags| flags.iter().filter(|&&f| f == 1).count());
        let summary = summarize(rows, model.fraud_count(), rule_fraud_count, self.source);

        Ok((
            ScoredBatch {
                columns: batch.columns.clone(),
                records,
            },
            summary,
        ))
    }
}
