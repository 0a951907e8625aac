//! Packaged model bundle access.
//!
//! A bundle is a zip container with three entries: the structural
//! configuration, a metadata document, and the trained parameter blob.
//! The blob is extracted into a scratch directory owned by the artifact
//! value; dropping the artifact removes it, whether or not binding
//! succeeded.

use crate::error::ClassifierError;
use crate::model::NetworkConfig;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

pub const CONFIG_ENTRY: &str = "config.json";
pub const METADATA_ENTRY: &str = "metadata.json";
pub const WEIGHTS_ENTRY: &str = "model.weights.safetensors";

pub struct ModelArtifact {
    config: NetworkConfig,
    metadata: serde_json::Value,
    scratch: TempDir,
}

impl ModelArtifact {
    /// Open a bundle and stage its parameter blob for loading.
    ///
    /// Any missing or unreadable entry is `ArtifactCorrupt`: without a
    /// complete bundle there is nothing to serve.
    pub fn open(path: &Path) -> Result<Self, ClassifierError> {
        let corrupt = |reason: String| ClassifierError::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| corrupt(e.to_string()))?;
        let mut archive = ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

        let config: NetworkConfig = {
            let entry = archive
                .by_name(CONFIG_ENTRY)
                .map_err(|e| corrupt(format!("{CONFIG_ENTRY}: {e}")))?;
            serde_json::from_reader(entry).map_err(|e| corrupt(format!("{CONFIG_ENTRY}: {e}")))?
        };

        let metadata: serde_json::Value = {
            let entry = archive
                .by_name(METADATA_ENTRY)
                .map_err(|e| corrupt(format!("{METADATA_ENTRY}: {e}")))?;
            serde_json::from_reader(entry)
                .map_err(|e| corrupt(format!("{METADATA_ENTRY}: {e}")))?
        };

        let scratch = TempDir::new().map_err(|e| corrupt(format!("scratch directory: {e}")))?;
        {
            let mut entry = archive
                .by_name(WEIGHTS_ENTRY)
                .map_err(|e| corrupt(format!("{WEIGHTS_ENTRY}: {e}")))?;
            let staged = scratch.path().join(WEIGHTS_ENTRY);
            let mut out = File::create(&staged).map_err(|e| corrupt(e.to_string()))?;
            io::copy(&mut entry, &mut out).map_err(|e| corrupt(format!("{WEIGHTS_ENTRY}: {e}")))?;
        }

        tracing::debug!(
            bundle = %path.display(),
            classes = config.num_classes,
            "Model bundle opened"
        );

        Ok(Self {
            config,
            metadata,
            scratch,
        })
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    /// Location of the staged parameter blob. Valid only while the artifact
    /// is alive.
    pub fn weights_path(&self) -> PathBuf {
        self.scratch.path().join(WEIGHTS_ENTRY)
    }
}
