//! ONNX model loader

use crate::error::{FraudError, FraudResult};
use crate::feature_extractor::FEATURE_NAMES;
use crate::models::inference::OnnxClassifier;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Loader for the ONNX classifier artifact
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> FraudResult<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> FraudResult<Self> {
        if onnx_threads == 0 {
            return Err(FraudError::ModelUnavailable(
                "onnx_threads must be at least 1".to_string(),
            ));
        }
        Ok(Self { onnx_threads })
    }

    /// Load the classifier from an ONNX file.
    ///
    /// A missing file is reported before ONNX Runtime is touched.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> FraudResult<OnnxClassifier> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(FraudError::ModelUnavailable(format!(
                "model artifact not found at {}",
                path.display()
            )));
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx")
            .to_string();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| load_error(path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(path, e))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| load_error(path, e))?
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            features = ?FEATURE_NAMES,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

fn load_error(path: &Path, e: impl std::fmt::Display) -> FraudError {
    FraudError::ModelUnavailable(format!("failed to load model from {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(ModelLoader::with_threads(0).is_err());
    }

    #[test]
    fn test_missing_artifact_is_model_unavailable() {
        let loader = ModelLoader::new().unwrap();
        let err = loader
            .load_model("definitely/not/here/model.onnx")
            .err()
            .unwrap();
        assert!(matches!(err, FraudError::ModelUnavailable(_)));
    }
}
