use std::env;
use std::path::PathBuf;

/// File locations consumed once at startup.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Packaged model bundle (structural config + metadata + parameter blob).
    pub bundle_path: PathBuf,
    /// Ordered JSON list mapping output index to class name.
    pub labels_path: PathBuf,
    /// Public ImageNet backbone checkpoint used when the trained parameters
    /// do not bind. Optional: without it the fallback keeps random weights.
    pub pretrained_backbone_path: Option<PathBuf>,
}

impl ClassifierConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let bundle_path = env::var("MODEL_PATH")
            .unwrap_or_else(|_| "models/insect_classifier.bundle".to_string())
            .into();

        let labels_path = env::var("CLASS_LABELS_PATH")
            .unwrap_or_else(|_| "models/class_indices.json".to_string())
            .into();

        let pretrained_backbone_path = match env::var("PRETRAINED_BACKBONE_PATH") {
            Ok(path) if path.is_empty() => None,
            Ok(path) => Some(path.into()),
            Err(_) => Some("models/mobilenetv2_imagenet.safetensors".into()),
        };

        Self {
            bundle_path,
            labels_path,
            pretrained_backbone_path,
        }
    }
}
