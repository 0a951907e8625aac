use classifier::{ClassifierConfig, ModelArtifact};
use std::path::PathBuf;

/// Print a bundle's structural configuration and metadata.
fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| ClassifierConfig::from_env().bundle_path);

    let artifact = ModelArtifact::open(&path)?;

    println!("=== METADATA ===");
    println!("{}", serde_json::to_string_pretty(artifact.metadata())?);

    println!("\n=== NETWORK CONFIG ===");
    println!("{:#?}", artifact.network_config());

    Ok(())
}
