//! Error types for the scoring pipeline

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage that detected a missing feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStage {
    /// Column declared by the numeric scaler
    Scaler,
    /// Column declared by the classifier
    Classifier,
}

impl fmt::Display for FeatureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureStage::Scaler => f.write_str("scaler"),
            FeatureStage::Classifier => f.write_str("classifier"),
        }
    }
}

/// Failures raised while invoking the classifier
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Matrix shape does not match what the classifier expects
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// NaN or infinite value in the classifier input
    #[error("non-finite input at row {row}, feature '{feature}'")]
    NonFiniteInput { row: usize, feature: String },

    /// Classifier produced something other than a valid two-class distribution
    #[error("invalid classifier output: {0}")]
    InvalidOutput(String),

    /// Inference backend failure
    #[error("classifier backend failed: {0}")]
    Backend(String),
}

/// Errors that abort a whole batch
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Raw input could not be parsed into records
    #[error("Error reading file: {0}")]
    UnreadableInput(String),

    /// Batch has zero records
    #[error("Uploaded file is empty")]
    EmptyBatch,

    /// A column required by the scaler or classifier is absent
    #[error("Missing {stage} features: {}", .columns.join(", "))]
    MissingFeature {
        stage: FeatureStage,
        columns: Vec<String>,
    },

    /// The classifier failed
    #[error("Error making predictions: {0}")]
    Scoring(#[from] ScoringError),
}

impl PipelineError {
    /// Stable machine-readable kind, used in transport error replies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnreadableInput(_) => "unreadable_input",
            PipelineError::EmptyBatch => "empty_batch",
            PipelineError::MissingFeature { .. } => "missing_feature",
            PipelineError::Scoring(_) => "scoring",
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
