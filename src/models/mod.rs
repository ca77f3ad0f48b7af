//! Trained artifacts and the scoring engine

pub mod bundle;
pub mod classifier;
pub mod encoder;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod scaler;

pub use bundle::ArtifactBundle;
pub use classifier::{Classifier, FeatureMatrix, LogisticRegression};
pub use encoder::{CategoricalEncoding, LabelEncoder, PerColumnEncoders, SharedEncoder, UnseenCategoryPolicy};
pub use inference::{InferenceEngine, ModelPredictions};
pub use loader::ModelLoader;
pub use scaler::StandardScaler;
