pub mod artifact;
pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod predictor;
pub mod preprocess;
pub mod weights;

// Re-export commonly used types for convenience
pub use candle_core::Device;

pub use artifact::ModelArtifact;
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use labels::ClassLabels;
pub use model::{InsectNet, NetworkConfig};
pub use predictor::{ClassScore, ModelState, Prediction, Predictor};
pub use weights::WeightSource;
