//! Trained artifact bundle

use crate::models::classifier::Classifier;
use crate::models::encoder::CategoricalEncoding;
use crate::models::scaler::StandardScaler;

/// Encoders, scaler and classifier produced by offline training.
///
/// Loaded once per process and shared read-only behind an `Arc`.
#[derive(Debug)]
pub struct ArtifactBundle {
    encoders: Box<dyn CategoricalEncoding>,
    scaler: StandardScaler,
    classifier: Box<dyn Classifier>,
}

impl ArtifactBundle {
    pub fn new(
        encoders: Box<dyn CategoricalEncoding>,
        scaler: StandardScaler,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            encoders,
            scaler,
            classifier,
        }
    }

    pub fn encoders(&self) -> &dyn CategoricalEncoding {
        self.encoders.as_ref()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }
}
