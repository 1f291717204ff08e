//! ONNX-backed classifier

use crate::error::{FraudError, FraudResult};
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use crate::models::classifier::Classifier;
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// Fraud classifier served by ONNX Runtime.
///
/// The session needs exclusive access to run, so calls are serialized on a
/// mutex. The artifact itself is never modified.
pub struct OnnxClassifier {
    pub(crate) name: String,
    pub(crate) session: Mutex<Session>,
    pub(crate) input_name: String,
    pub(crate) output_name: String,
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, features: &FeatureVector) -> FraudResult<f64> {
        // Shape [1, num_features]
        let shape = vec![1_i64, FEATURE_COUNT as i64];
        let input_tensor = Tensor::from_array((shape, features.to_array().to_vec()))
            .map_err(|e| inference_error("failed to create input tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| FraudError::InferenceFailure("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| inference_error("session run", e))?;

        extract_probability(&outputs, &self.output_name, &self.name)
    }
}

fn inference_error(what: &str, e: impl std::fmt::Display) -> FraudError {
    FraudError::InferenceFailure(format!("{}: {}", what, e))
}

/// Pull the fraud (class 1) probability out of the session outputs.
///
/// Handles plain tensors as well as the seq(map(int64, float)) layout that
/// sklearn forest exports produce.
fn extract_probability(
    outputs: &SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> FraudResult<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(output, model_name) {
            return Ok(prob);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = probability_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Probability taken from fallback output");
            return Ok(prob);
        }
    }

    Err(FraudError::InferenceFailure(format!(
        "model {} produced no usable probability output",
        model_name
    )))
}

fn probability_from_value(output: &DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probability_from_tensor(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        match probability_from_sequence_map(output) {
            Ok(prob) => return Some(prob),
            Err(e) => debug!(model = %model_name, error = %e, "seq(map) extraction failed"),
        }
    }

    None
}

/// Fraud probability from a tensor of shape [batch, classes] or [classes].
fn probability_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return None,
    };

    match classes {
        c if c >= 2 => data.get(1).map(|&p| p as f64),
        1 => data.first().map(|&p| p as f64),
        _ => None,
    }
}

fn probability_from_sequence_map(output: &DynValue) -> FraudResult<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| inference_error("downcast to sequence", e))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| inference_error("extract sequence", e))?;

    // batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| FraudError::InferenceFailure("empty probability sequence".to_string()))?;

    let kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(|e| inference_error("extract class map", e))?;

    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *prob as f64);
    }

    Err(FraudError::InferenceFailure(
        "class map has neither class 0 nor class 1".to_string(),
    ))
}
