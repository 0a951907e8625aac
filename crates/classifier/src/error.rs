use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the model-loading and inference pipeline.
///
/// `ArtifactCorrupt`, `LabelsUnavailable`, `LabelMismatch` and
/// `GraphConstruction` are fatal at startup. `WeightMismatch` is recoverable:
/// the caller substitutes the public ImageNet initialization and keeps
/// serving in a degraded state. `InvalidImage` and `Inference` are
/// request-scoped.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model bundle '{path}' is corrupt: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("network construction failed: {0}")]
    GraphConstruction(String),

    #[error("trained parameters do not bind to the network: {0}")]
    WeightMismatch(String),

    #[error("failed to load class labels from '{path}': {reason}")]
    LabelsUnavailable { path: PathBuf, reason: String },

    #[error("class label count {labels} does not match network output dimensionality {outputs}")]
    LabelMismatch { labels: usize, outputs: usize },

    #[error("payload is not a decodable image: {0}")]
    InvalidImage(String),

    #[error("inference failed: {0}")]
    Inference(String),
}
