use crate::error::ClassifierError;
use std::path::Path;

/// Ordered class names; index position = network output position.
#[derive(Debug, Clone)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    /// Read the label list from a JSON array file.
    ///
    /// A missing or unparsable label file makes every prediction meaningless,
    /// so this is fatal at startup rather than degradable.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let unavailable = |reason: String| ClassifierError::LabelsUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read(path).map_err(|e| unavailable(e.to_string()))?;
        let names: Vec<String> =
            serde_json::from_slice(&data).map_err(|e| unavailable(e.to_string()))?;

        if names.is_empty() {
            return Err(unavailable("label list is empty".to_string()));
        }

        Ok(Self(names))
    }

    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// A label list that disagrees with the network's output dimensionality
    /// would silently mislabel every prediction.
    pub fn ensure_matches(&self, output_dim: usize) -> Result<(), ClassifierError> {
        if self.0.len() != output_dim {
            return Err(ClassifierError::LabelMismatch {
                labels: self.0.len(),
                outputs: output_dim,
            });
        }
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
