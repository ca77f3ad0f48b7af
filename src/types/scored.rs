//! Scored output records and batch summary

use crate::types::record::Record;
use serde::{Deserialize, Serialize};

/// Which verdict drives the summary's fraud count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudCountSource {
    /// Classifier prediction (API scenario)
    #[default]
    Model,
    /// Rule overlay flag (dashboard scenario)
    Rules,
}

/// An input record enriched with model and rule verdicts
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    /// Original input fields, kept apart from the verdict fields so any
    /// column name is allowed
    #[serde(rename = "original_data")]
    pub record: Record,
    /// Classifier label (0 = legitimate, 1 = fraud)
    pub model_prediction: u8,
    /// Probability mass on the fraud class
    pub fraud_probability: f64,
    /// Probability mass on the legitimate class
    pub legit_probability: f64,
    /// Rule overlay flag, when the overlay ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_fraud: Option<u8>,
}

/// Scored records in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoredBatch {
    /// Original column order of the upload
    pub columns: Vec<String>,
    pub records: Vec<ScoredRecord>,
}

impl ScoredBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the rule overlay contributed flags
    pub fn has_rule_flags(&self) -> bool {
        self.records.iter().any(|r| r.rule_fraud.is_some())
    }

    pub fn predictions(&self) -> Vec<u8> {
        self.records.iter().map(|r| r.model_prediction).collect()
    }

    /// `[legit, fraud]` pairs, in class order
    pub fn probabilities(&self) -> Vec<[f64; 2]> {
        self.records
            .iter()
            .map(|r| [r.legit_probability, r.fraud_probability])
            .collect()
    }

    pub fn rule_flags(&self) -> Option<Vec<u8>> {
        self.records.iter().map(|r| r.rule_fraud).collect()
    }
}

/// Batch-level statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_rows: usize,
    /// Fraud count according to `count_source`
    pub fraud_count: usize,
    pub legit_count: usize,
    /// Percentage of fraud rows, rounded to two decimals
    pub fraud_percentage: f64,
    /// Rows the classifier labelled fraud
    pub model_fraud_count: usize,
    /// Rows the rule overlay flagged, when it ran
    pub rule_fraud_count: Option<usize>,
    /// Source that produced `fraud_count`
    pub count_source: FraudCountSource,
}
