//! Schema reconciliation: raw batch -> classifier feature matrix.
//!
//! Only the schema declared by the artifact bundle is used. Categorical
//! columns are encoded first, then the scaler's numeric columns are coerced
//! and scaled, and finally the frame is aligned to the classifier's feature
//! order.

use crate::error::{FeatureStage, PipelineError, Result};
use crate::models::{ArtifactBundle, FeatureMatrix, UnseenCategoryPolicy};
use crate::types::record::{Batch, Value};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// An unseen categorical value replaced by the encoder's first entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingFallback {
    pub row: usize,
    pub column: String,
    pub original: String,
    pub substitute: String,
}

/// Non-fatal conditions met while reconciling a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Every fallback substitution, in column then row order
    pub fallbacks: Vec<EncodingFallback>,
    /// Categorical columns whose transform failed under the strict policy
    pub untransformed_columns: Vec<String>,
}

/// Classifier-ready matrix plus the reconciliation report
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub matrix: FeatureMatrix,
    pub report: ReconcileReport,
}

/// Maps input batches onto the bundle's declared schema
pub struct SchemaReconciler {
    bundle: Arc<ArtifactBundle>,
    policy: UnseenCategoryPolicy,
}

/// Unparseable and missing cells become NaN rather than failing here
fn coerce_numeric<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<f64> {
    values
        .map(|v| v.to_number().unwrap_or(f64::NAN))
        .collect()
}

impl SchemaReconciler {
    pub fn new(bundle: Arc<ArtifactBundle>, policy: UnseenCategoryPolicy) -> Self {
        Self { bundle, policy }
    }

    pub fn policy(&self) -> UnseenCategoryPolicy {
        self.policy
    }

    /// Transform a batch into the classifier's feature matrix
    pub fn reconcile(&self, batch: &Batch) -> Result<Reconciled> {
        let mut report = ReconcileReport::default();
        let mut frame: HashMap<String, Vec<f64>> = HashMap::new();
        let mut untransformed: HashSet<String> = HashSet::new();

        self.encode_categoricals(batch, &mut frame, &mut untransformed, &mut report);

        let available = |column: &str| batch.has_column(column) && !untransformed.contains(column);

        // Numeric scaling over exactly the scaler's declared columns
        let scaler = self.bundle.scaler();
        let missing: Vec<String> = scaler
            .feature_names()
            .iter()
            .filter(|name| !available(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingFeature {
                stage: FeatureStage::Scaler,
                columns: missing,
            });
        }

        for (idx, name) in scaler.feature_names().iter().enumerate() {
            let mut values = frame
                .remove(name)
                .unwrap_or_else(|| coerce_numeric(batch.column(name)));
            scaler.transform_column(idx, &mut values);
            frame.insert(name.clone(), values);
        }

        // Align to the classifier's declared order
        let expected = self.bundle.classifier().feature_names();
        let missing: Vec<String> = expected
            .iter()
            .filter(|name| !frame.contains_key(name.as_str()) && !available(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingFeature {
                stage: FeatureStage::Classifier,
                columns: missing,
            });
        }

        let columns: Vec<Vec<f64>> = expected
            .iter()
            .map(|name| {
                frame
                    .remove(name)
                    .unwrap_or_else(|| coerce_numeric(batch.column(name)))
            })
            .collect();

        let rows = (0..batch.len())
            .map(|i| columns.iter().map(|col| col[i]).collect())
            .collect();

        report.untransformed_columns.sort();

        debug!(
            rows = batch.len(),
            features = expected.len(),
            fallbacks = report.fallbacks.len(),
            untransformed = report.untransformed_columns.len(),
            "Batch reconciled"
        );

        Ok(Reconciled {
            matrix: FeatureMatrix {
                feature_names: expected.to_vec(),
                rows,
            },
            report,
        })
    }

    fn encode_categoricals(
        &self,
        batch: &Batch,
        frame: &mut HashMap<String, Vec<f64>>,
        untransformed: &mut HashSet<String>,
        report: &mut ReconcileReport,
    ) {
        let encoders = self.bundle.encoders();

        for column in encoders.columns() {
            if !batch.has_column(column) {
                continue;
            }

            let texts: Vec<String> = batch.column(column).map(Value::to_text).collect();

            match encoders.encode(column, &texts, self.policy) {
                Ok(Some(encoded)) => {
                    if !encoded.fallbacks.is_empty() {
                        let substitute = encoders
                            .encoder_for(column)
                            .map(|e| e.fallback_label().to_string())
                            .unwrap_or_default();

                        for (row, original) in encoded.fallbacks {
                            warn!(
                                column = %column,
                                row = row,
                                value = %original,
                                substitute = %substitute,
                                "Unseen categorical value, using first known label"
                            );
                            report.fallbacks.push(EncodingFallback {
                                row,
                                column: column.to_string(),
                                original,
                                substitute: substitute.clone(),
                            });
                        }
                    }

                    frame.insert(
                        column.to_string(),
                        encoded.codes.into_iter().map(|c| c as f64).collect(),
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        column = %column,
                        error = %e,
                        "Categorical transform failed, column left untransformed"
                    );
                    untransformed.insert(column.to_string());
                    report.untransformed_columns.push(column.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelEncoder, LogisticRegression, PerColumnEncoders, SharedEncoder, StandardScaler};
    use crate::types::record::Record;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    /// Country is categorical, Amount is scaled, classifier reorders them
    fn bundle() -> Arc<ArtifactBundle> {
        let encoders = PerColumnEncoders::new(vec![(
            "Country".to_string(),
            LabelEncoder::new(names(&["France", "Morocco", "Pakistan"])).unwrap(),
        )]);
        let scaler = StandardScaler::new(names(&["Amount"]), vec![100.0], vec![50.0]).unwrap();
        let classifier =
            LogisticRegression::new(names(&["Amount", "Country"]), vec![1.0, 1.0], 0.0).unwrap();
        Arc::new(ArtifactBundle::new(
            Box::new(encoders),
            scaler,
            Box::new(classifier),
        ))
    }

    fn batch(rows: &[(f64, &str)]) -> Batch {
        Batch::from_rows(
            names(&["TransactionID", "Country", "Amount"]),
            rows.iter()
                .enumerate()
                .map(|(i, (amount, country))| {
                    vec![
                        Value::from(format!("tx_{}", i)),
                        Value::from(*country),
                        Value::from(*amount),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn test_reconcile_encodes_scales_and_aligns() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::FirstEntry);
        let out = reconciler
            .reconcile(&batch(&[(150.0, "Pakistan"), (100.0, "France")]))
            .unwrap();

        assert_eq!(out.matrix.feature_names, names(&["Amount", "Country"]));
        assert_eq!(out.matrix.rows, vec![vec![1.0, 2.0], vec![0.0, 0.0]]);
        assert!(out.report.fallbacks.is_empty());
    }

    #[test]
    fn test_unseen_value_falls_back_to_first_entry() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::FirstEntry);
        let out = reconciler
            .reconcile(&batch(&[(100.0, "Morocco"), (100.0, "Atlantis")]))
            .unwrap();

        assert_eq!(out.matrix.rows[1][1], 0.0);
        assert_eq!(
            out.report.fallbacks,
            vec![EncodingFallback {
                row: 1,
                column: "Country".to_string(),
                original: "Atlantis".to_string(),
                substitute: "France".to_string(),
            }]
        );
    }

    #[test]
    fn test_strict_policy_surfaces_as_missing_feature() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::Strict);
        let err = reconciler
            .reconcile(&batch(&[(100.0, "Atlantis")]))
            .unwrap_err();

        match err {
            PipelineError::MissingFeature { stage, columns } => {
                assert_eq!(stage, FeatureStage::Classifier);
                assert_eq!(columns, names(&["Country"]));
            }
            other => panic!("expected missing feature, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_scaler_column() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::FirstEntry);
        let input = Batch::from_records(vec![Record::from_pairs([("Country", "France")])]);

        match reconciler.reconcile(&input).unwrap_err() {
            PipelineError::MissingFeature { stage, columns } => {
                assert_eq!(stage, FeatureStage::Scaler);
                assert_eq!(columns, names(&["Amount"]));
            }
            other => panic!("expected missing feature, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_classifier_column() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::FirstEntry);
        let input = Batch::from_records(vec![Record::from_pairs([("Amount", 10.0)])]);

        match reconciler.reconcile(&input).unwrap_err() {
            PipelineError::MissingFeature { stage, columns } => {
                assert_eq!(stage, FeatureStage::Classifier);
                assert_eq!(columns, names(&["Country"]));
            }
            other => panic!("expected missing feature, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_numeric_becomes_nan() {
        let reconciler = SchemaReconciler::new(bundle(), UnseenCategoryPolicy::FirstEntry);
        let input = Batch::from_rows(
            names(&["Country", "Amount"]),
            vec![
                vec![Value::from("France"), Value::from("abc")],
                vec![Value::from("France"), Value::Missing],
                vec![Value::from("France"), Value::from("200")],
            ],
        );

        let out = reconciler.reconcile(&input).unwrap();
        assert!(out.matrix.rows[0][0].is_nan());
        assert!(out.matrix.rows[1][0].is_nan());
        assert_eq!(out.matrix.rows[2][0], 2.0);
    }

    #[test]
    fn test_shared_encoder_and_passthrough_column() {
        let encoders = SharedEncoder::new(
            names(&["PaymentType", "Fallback"]),
            LabelEncoder::new(names(&["Cash", "Check"])).unwrap(),
        );
        let scaler = StandardScaler::new(names(&["Amount"]), vec![0.0], vec![1.0]).unwrap();
        let classifier = LogisticRegression::new(
            names(&["PaymentType", "Hour", "Amount"]),
            vec![1.0, 1.0, 1.0],
            0.0,
        )
        .unwrap();
        let bundle = Arc::new(ArtifactBundle::new(
            Box::new(encoders),
            scaler,
            Box::new(classifier),
        ));

        let input = Batch::from_rows(
            names(&["Amount", "PaymentType", "Hour"]),
            vec![vec![Value::from(5.0), Value::from("Check"), Value::from("13")]],
        );

        let out = SchemaReconciler::new(bundle, UnseenCategoryPolicy::FirstEntry)
            .reconcile(&input)
            .unwrap();
        assert_eq!(out.matrix.rows, vec![vec![1.0, 13.0, 5.0]]);
    }
}
