//! Scoring engine: runs the classifier over a reconciled feature matrix

use crate::error::ScoringError;
use crate::models::bundle::ArtifactBundle;
use crate::models::classifier::FeatureMatrix;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Largest deviation from 1.0 tolerated in a backend's probability pair
/// before it is renormalised.
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Classifier output for a whole batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelPredictions {
    /// Class labels (0 = legitimate, 1 = fraud)
    pub predictions: Vec<u8>,
    /// `[legit, fraud]` per row
    pub probabilities: Vec<[f64; 2]>,
}

impl ModelPredictions {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn fraud_count(&self) -> usize {
        self.predictions.iter().filter(|&&p| p == 1).count()
    }
}

/// Scoring engine over the bundle's classifier
pub struct InferenceEngine {
    bundle: Arc<ArtifactBundle>,
}

impl InferenceEngine {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self { bundle }
    }

    /// Score every row of the matrix.
    ///
    /// All-or-nothing: any invalid input or output fails the whole batch.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<ModelPredictions, ScoringError> {
        let start = Instant::now();
        let classifier = self.bundle.classifier();

        if matrix.feature_names.as_slice() != classifier.feature_names() {
            return Err(ScoringError::ShapeMismatch(format!(
                "matrix columns {:?} do not match classifier features {:?}",
                matrix.feature_names,
                classifier.feature_names()
            )));
        }

        for (row_idx, row) in matrix.rows.iter().enumerate() {
            if row.len() != matrix.n_features() {
                return Err(ScoringError::ShapeMismatch(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    matrix.n_features()
                )));
            }
            if let Some(col) = row.iter().position(|v| !v.is_finite()) {
                return Err(ScoringError::NonFiniteInput {
                    row: row_idx,
                    feature: matrix.feature_names[col].clone(),
                });
            }
        }

        let raw = classifier.predict_proba(matrix)?;
        if raw.len() != matrix.n_rows() {
            return Err(ScoringError::InvalidOutput(format!(
                "classifier returned {} probability rows for {} inputs",
                raw.len(),
                matrix.n_rows()
            )));
        }

        let probabilities = raw
            .into_iter()
            .enumerate()
            .map(|(row, pair)| normalize(row, pair))
            .collect::<Result<Vec<_>, _>>()?;

        let predictions: Vec<u8> = probabilities
            .iter()
            .map(|[legit, fraud]| u8::from(fraud > legit))
            .collect();

        let result = ModelPredictions {
            predictions,
            probabilities,
        };

        debug!(
            backend = classifier.name(),
            rows = result.len(),
            fraud = result.fraud_count(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch inference complete"
        );

        Ok(result)
    }
}

fn normalize(row: usize, [legit, fraud]: [f64; 2]) -> Result<[f64; 2], ScoringError> {
    let in_range = |p: f64| p.is_finite() && (0.0..=1.0 + PROBABILITY_SUM_TOLERANCE).contains(&p);
    let sum = legit + fraud;

    if !in_range(legit) || !in_range(fraud) || (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(ScoringError::InvalidOutput(format!(
            "row {} probabilities [{}, {}] are not a distribution",
            row, legit, fraud
        )));
    }

    let fraud = (fraud / sum).clamp(0.0, 1.0);
    Ok([1.0 - fraud, fraud])
}
