use anyhow::Context;
use classifier::{ClassLabels, ClassifierConfig, Device, ModelArtifact, Predictor};
use common::TelemetryGuard;
use gateway::config::get_configuration;
use gateway::logging::setup_logging;
use gateway::state::AppState;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;

    let _telemetry = config
        .otel_endpoint
        .as_deref()
        .map(|endpoint| TelemetryGuard::init("gateway", endpoint))
        .transpose()?;

    setup_logging(&config);

    let classifier_config = ClassifierConfig::from_env();
    tracing::info!(
        bundle = %classifier_config.bundle_path.display(),
        labels = %classifier_config.labels_path.display(),
        "Loading model"
    );

    let labels = ClassLabels::load(&classifier_config.labels_path)?;
    let artifact = ModelArtifact::open(&classifier_config.bundle_path)?;
    let predictor = Predictor::initialize(
        &artifact,
        labels,
        classifier_config.pretrained_backbone_path.as_deref(),
        &Device::Cpu,
    )?;
    // Release the scratch extraction directory before serving.
    drop(artifact);

    tracing::info!(state = ?predictor.state(), "Model ready");

    let state = AppState {
        predictor: Some(Arc::new(predictor)),
        predict_timeout: Duration::from_secs(config.predict_timeout_secs),
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, gateway::app(state)).await?;

    Ok(())
}
