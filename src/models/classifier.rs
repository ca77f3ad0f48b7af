//! Binary classifiers consumed by the scoring engine

use crate::error::ScoringError;
use anyhow::{bail, Result};
use std::fmt;

/// Numeric matrix handed to a classifier, row-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    /// Column names, in classifier order
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// A trained two-class model.
///
/// Probabilities are returned in fixed class order `[legit, fraud]`.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Expected input features, in the order the model was fitted on
    fn feature_names(&self) -> &[String];

    /// Class probabilities for every row
    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ScoringError>;
}

/// Logistic regression over the aligned features
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        if feature_names.is_empty() {
            bail!("classifier declares no features");
        }
        if feature_names.len() != coefficients.len() {
            bail!(
                "classifier declares {} features but has {} coefficients",
                feature_names.len(),
                coefficients.len()
            );
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            bail!("classifier parameters must be finite");
        }

        Ok(Self {
            feature_names,
            coefficients,
            intercept,
        })
    }

    fn decision(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ScoringError> {
        matrix
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() != self.coefficients.len() {
                    return Err(ScoringError::ShapeMismatch(format!(
                        "row {} has {} values, model expects {}",
                        i,
                        row.len(),
                        self.coefficients.len()
                    )));
                }
                let fraud = sigmoid(self.decision(row));
                Ok([1.0 - fraud, fraud])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LogisticRegression {
        LogisticRegression::new(vec!["a".to_string(), "b".to_string()], vec![2.0, -1.0], 0.5)
            .unwrap()
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let matrix = FeatureMatrix {
            feature_names: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![0.0, 0.0], vec![10.0, -3.0], vec![-400.0, 400.0]],
        };

        let probs = model().predict_proba(&matrix).unwrap();
        assert_eq!(probs.len(), 3);
        for [legit, fraud] in &probs {
            assert!((legit + fraud - 1.0).abs() < 1e-9);
            assert!(fraud.is_finite());
        }
        assert!((probs[0][1] - sigmoid(0.5)).abs() < 1e-12);
        assert!(probs[1][1] > 0.99);
        assert!(probs[2][1] < 1e-6);
    }

    #[test]
    fn test_row_width_mismatch() {
        let matrix = FeatureMatrix {
            feature_names: vec!["a".to_string()],
            rows: vec![vec![1.0]],
        };
        assert!(matches!(
            model().predict_proba(&matrix),
            Err(ScoringError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(LogisticRegression::new(vec![], vec![], 0.0).is_err());
        assert!(LogisticRegression::new(vec!["a".to_string()], vec![1.0, 2.0], 0.0).is_err());
        assert!(LogisticRegression::new(vec!["a".to_string()], vec![f64::INFINITY], 0.0).is_err());
    }
}
