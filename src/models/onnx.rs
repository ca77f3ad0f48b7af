//! ONNX Runtime classifier backend

use crate::error::ScoringError;
use crate::models::classifier::{Classifier, FeatureMatrix};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Classifier exported to ONNX with a `[N, 2]` probability tensor output
pub struct OnnxClassifier {
    feature_names: Vec<String>,
    /// Sessions need exclusive access to run
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    path: PathBuf,
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("path", &self.path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("features", &self.feature_names.len())
            .finish()
    }
}

impl OnnxClassifier {
    /// Load an ONNX model; feature names come from the bundle manifest
    pub fn load<P: AsRef<Path>>(
        path: P,
        feature_names: Vec<String>,
        onnx_threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();

        ort::init().commit()?;
        info!(path = %path.display(), threads = onnx_threads, "Loading ONNX classifier");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            input = %input_name,
            output = %output_name,
            "ONNX classifier loaded"
        );

        Ok(Self {
            feature_names,
            session: Mutex::new(session),
            input_name,
            output_name,
            path: path.to_path_buf(),
        })
    }
}

fn backend<E: fmt::Display>(e: E) -> ScoringError {
    ScoringError::Backend(e.to_string())
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ScoringError> {
        let n_rows = matrix.n_rows();
        let shape = vec![n_rows as i64, matrix.n_features() as i64];
        let data: Vec<f32> = matrix.rows.iter().flatten().map(|&v| v as f32).collect();
        let input_tensor = Tensor::from_array((shape, data)).map_err(backend)?;

        let mut session = self.session.lock().map_err(backend)?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(backend)?;

        let output = outputs.get(&self.output_name).ok_or_else(|| {
            ScoringError::InvalidOutput(format!("missing output '{}'", self.output_name))
        })?;

        let (shape, data) = output.try_extract_tensor::<f32>().map_err(backend)?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims != [n_rows as i64, 2] {
            return Err(ScoringError::InvalidOutput(format!(
                "expected probability tensor [{}, 2], got {:?}",
                n_rows, dims
            )));
        }

        Ok(data
            .chunks_exact(2)
            .map(|pair| [pair[0] as f64, pair[1] as f64])
            .collect())
    }
}
