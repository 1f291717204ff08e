//! ML model components

pub mod adapter;
pub mod classifier;
pub mod inference;
pub mod loader;

pub use adapter::{ClassifierAdapter, ModelInfo, ModelState, Score};
pub use classifier::Classifier;
pub use inference::OnnxClassifier;
pub use loader::ModelLoader;
