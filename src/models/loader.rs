//! Artifact bundle loader

use crate::models::bundle::ArtifactBundle;
use crate::models::classifier::{Classifier, LogisticRegression};
use crate::models::encoder::{
    CategoricalEncoding, LabelEncoder, PerColumnEncoders, SharedEncoder,
};
use crate::models::scaler::StandardScaler;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Encoder section of the bundle manifest
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EncoderManifest {
    /// Column name -> vocabulary, in declaration order
    PerColumn {
        columns: serde_json::Map<String, serde_json::Value>,
    },
    /// One vocabulary for every listed column
    Shared {
        columns: Vec<String>,
        classes: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ScalerManifest {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ClassifierManifest {
    LogisticRegression {
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        classes: Option<Vec<i64>>,
    },
    Onnx {
        feature_names: Vec<String>,
        /// Relative paths resolve against the manifest's directory
        path: String,
    },
}

#[derive(Debug, Deserialize)]
struct BundleManifest {
    encoders: EncoderManifest,
    scaler: ScalerManifest,
    classifier: ClassifierManifest,
}

/// Loader for trained artifact bundles
pub struct ModelLoader {
    /// Intra-op threads for ONNX sessions
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a bundle manifest from a JSON file
    pub fn load_bundle<P: AsRef<Path>>(&self, path: P) -> Result<ArtifactBundle> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading artifact bundle");

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact bundle {}", path.display()))?;
        let manifest: BundleManifest = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse artifact bundle {}", path.display()))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.build(manifest, base_dir)
    }

    /// Load a bundle manifest from an in-memory JSON document
    pub fn load_bundle_from_str(&self, json: &str) -> Result<ArtifactBundle> {
        let manifest: BundleManifest =
            serde_json::from_str(json).context("Failed to parse artifact bundle")?;
        self.build(manifest, Path::new("."))
    }

    fn build(&self, manifest: BundleManifest, base_dir: &Path) -> Result<ArtifactBundle> {
        let encoders = build_encoders(manifest.encoders)?;

        ensure_unique(&manifest.scaler.feature_names, "scaler")?;
        let scaler = StandardScaler::new(
            manifest.scaler.feature_names,
            manifest.scaler.mean,
            manifest.scaler.scale,
        )
        .context("Invalid scaler artifact")?;

        let classifier = self.build_classifier(manifest.classifier, base_dir)?;

        info!(columns = ?encoders.columns(), "Encoders loaded");
        info!(features = ?scaler.feature_names(), "Scaler loaded");
        info!(
            backend = classifier.name(),
            features = ?classifier.feature_names(),
            "Classifier loaded (classes: [0, 1])"
        );

        Ok(ArtifactBundle::new(encoders, scaler, classifier))
    }

    fn build_classifier(
        &self,
        manifest: ClassifierManifest,
        base_dir: &Path,
    ) -> Result<Box<dyn Classifier>> {
        match manifest {
            ClassifierManifest::LogisticRegression {
                feature_names,
                coefficients,
                intercept,
                classes,
            } => {
                ensure_unique(&feature_names, "classifier")?;
                if let Some(classes) = classes {
                    if classes != [0, 1] {
                        bail!("classifier classes must be [0, 1], got {:?}", classes);
                    }
                }
                let model = LogisticRegression::new(feature_names, coefficients, intercept)
                    .context("Invalid classifier artifact")?;
                Ok(Box::new(model))
            }
            ClassifierManifest::Onnx {
                feature_names,
                path,
            } => {
                ensure_unique(&feature_names, "classifier")?;
                self.load_onnx(base_dir.join(path), feature_names)
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(
        &self,
        path: std::path::PathBuf,
        feature_names: Vec<String>,
    ) -> Result<Box<dyn Classifier>> {
        let model =
            crate::models::onnx::OnnxClassifier::load(&path, feature_names, self.onnx_threads)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(
        &self,
        path: std::path::PathBuf,
        _feature_names: Vec<String>,
    ) -> Result<Box<dyn Classifier>> {
        bail!(
            "classifier {} needs ONNX support; rebuild with --features onnx (threads={})",
            path.display(),
            self.onnx_threads
        )
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject repeated names in a declared feature list
fn ensure_unique(names: &[String], stage: &str) -> Result<()> {
    let mut seen = HashSet::new();
    let duplicates: Vec<&str> = names
        .iter()
        .filter(|name| !seen.insert(name.as_str()))
        .map(String::as_str)
        .collect();
    if !duplicates.is_empty() {
        bail!("{} declares duplicate features: {}", stage, duplicates.join(", "));
    }
    Ok(())
}

fn build_encoders(manifest: EncoderManifest) -> Result<Box<dyn CategoricalEncoding>> {
    match manifest {
        EncoderManifest::PerColumn { columns } => {
            let encoders = columns
                .into_iter()
                .map(|(column, classes)| {
                    let classes: Vec<String> = serde_json::from_value(classes).with_context(|| {
                        format!("Encoder for column '{}' must be a list of labels", column)
                    })?;
                    let encoder = LabelEncoder::new(classes)
                        .with_context(|| format!("Invalid encoder for column '{}'", column))?;
                    Ok::<_, anyhow::Error>((column, encoder))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Box::new(PerColumnEncoders::new(encoders)))
        }
        EncoderManifest::Shared { columns, classes } => {
            ensure_unique(&columns, "shared encoder")?;
            let encoder = LabelEncoder::new(classes).context("Invalid shared encoder")?;
            Ok(Box::new(SharedEncoder::new(columns, encoder)))
        }
    }
}
