//! Binds parameters onto the constructed graph.
//!
//! The happy path binds every tensor from the bundle's trained blob by
//! name. Any structural mismatch is recoverable: the caller substitutes
//! the public ImageNet checkpoint into the feature-extractor region only,
//! leaving the head at its random initialization.

use crate::error::ClassifierError;
use crate::model::{InsectNet, NetworkConfig};
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use std::path::Path;

/// Where the network's parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    /// Every tensor bound from the bundle's trained blob.
    Trained,
    /// Backbone from the public ImageNet checkpoint, head random.
    PretrainedBackbone,
    /// Nothing bound; the whole graph is randomly initialized.
    Random,
}

/// Bind the trained blob onto a freshly constructed graph.
///
/// A missing tensor, a shape mismatch, or an unreadable blob all surface as
/// `WeightMismatch` so the caller can fall back instead of aborting.
pub fn bind_trained(
    weights_path: &Path,
    config: &NetworkConfig,
    device: &Device,
) -> Result<InsectNet, ClassifierError> {
    let data = std::fs::read(weights_path)
        .map_err(|e| ClassifierError::WeightMismatch(format!("unreadable parameter blob: {e}")))?;
    let vb = VarBuilder::from_buffered_safetensors(data, DType::F32, device)
        .map_err(|e| ClassifierError::WeightMismatch(format!("malformed parameter blob: {e}")))?;

    InsectNet::new(config, vb.pp("backbone"), vb.pp("head"))
        .map_err(|e| ClassifierError::WeightMismatch(e.to_string()))
}

/// Construct the graph without trained parameters.
///
/// Tries the ImageNet checkpoint for the backbone region; if that is
/// missing or unusable the whole graph keeps its random initialization.
/// Only an architecture-level construction failure is an error here.
pub fn bind_fallback(
    pretrained_path: Option<&Path>,
    config: &NetworkConfig,
    device: &Device,
) -> Result<(InsectNet, WeightSource), ClassifierError> {
    let varmap = VarMap::new();
    let random = VarBuilder::from_varmap(&varmap, DType::F32, device);

    if let Some(path) = pretrained_path {
        match backbone_from_checkpoint(path, config, &random, device) {
            Ok(net) => return Ok((net, WeightSource::PretrainedBackbone)),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    checkpoint = %path.display(),
                    "ImageNet checkpoint unusable, keeping random initialization"
                );
            }
        }
    }

    let net = InsectNet::new(config, random.pp("backbone"), random.pp("head"))
        .map_err(|e| ClassifierError::GraphConstruction(e.to_string()))?;
    Ok((net, WeightSource::Random))
}

fn backbone_from_checkpoint(
    path: &Path,
    config: &NetworkConfig,
    head_vb: &VarBuilder,
    device: &Device,
) -> Result<InsectNet, ClassifierError> {
    let data = std::fs::read(path)
        .map_err(|e| ClassifierError::WeightMismatch(format!("unreadable checkpoint: {e}")))?;
    let vb = VarBuilder::from_buffered_safetensors(data, DType::F32, device)
        .map_err(|e| ClassifierError::WeightMismatch(format!("malformed checkpoint: {e}")))?;

    InsectNet::new(config, vb.pp("backbone"), head_vb.pp("head"))
        .map_err(|e| ClassifierError::WeightMismatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Tensor;
    use std::collections::HashMap;

    /// Test that a blob with the wrong tensor set is a recoverable mismatch
    #[test]
    fn test_wrong_tensor_set_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.weights.safetensors");

        let stray = Tensor::zeros((3, 3), DType::F32, &Device::Cpu).unwrap();
        let tensors = HashMap::from([("stray.weight".to_string(), stray)]);
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let result = bind_trained(&path, &NetworkConfig::default(), &Device::Cpu);
        assert!(matches!(result, Err(ClassifierError::WeightMismatch(_))));
    }

    /// Test that an unreadable blob is a recoverable mismatch, not fatal
    #[test]
    fn test_unreadable_blob_is_mismatch() {
        let result = bind_trained(
            Path::new("/nonexistent/model.weights.safetensors"),
            &NetworkConfig::default(),
            &Device::Cpu,
        );
        assert!(matches!(result, Err(ClassifierError::WeightMismatch(_))));
    }

    /// Test the fallback without a checkpoint: random graph, still usable
    #[test]
    fn test_fallback_without_checkpoint() {
        let (net, source) = bind_fallback(None, &NetworkConfig::default(), &Device::Cpu).unwrap();
        assert_eq!(source, WeightSource::Random);
        assert_eq!(net.output_dim(), 4);
    }

    /// Test the fallback with a garbage checkpoint: degrades to random
    #[test]
    fn test_fallback_with_garbage_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imagenet.safetensors");
        std::fs::write(&path, b"not safetensors").unwrap();

        let (_, source) =
            bind_fallback(Some(&path), &NetworkConfig::default(), &Device::Cpu).unwrap();
        assert_eq!(source, WeightSource::Random);
    }
}
