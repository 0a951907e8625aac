//! Shared inference service.
//!
//! One `Predictor` is built at startup and injected read-only into every
//! request handler. Forward passes take `&self` and are safe to run
//! concurrently; there is no per-request shared state.

use crate::artifact::ModelArtifact;
use crate::error::ClassifierError;
use crate::labels::ClassLabels;
use crate::model::InsectNet;
use crate::preprocess;
use crate::weights::{self, WeightSource};
use candle_core::Device;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;
use std::time::Instant;

/// Weight-loading outcome, fixed for the process lifetime.
///
/// `Degraded` means the graph runs but its parameters are not the trained
/// ones; predictions are confident-looking noise. The service stays up so
/// operators can choose between restart and redeploy, but the state is
/// surfaced through logs and the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Loaded,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassScore {
    pub class_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
    pub all_predictions: Vec<ClassScore>,
}

pub struct Predictor {
    model: InsectNet,
    labels: ClassLabels,
    state: ModelState,
    source: WeightSource,
    device: Device,
    duration_histogram: Histogram<f64>,
    predictions_counter: Counter<u64>,
    failures_counter: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> (Histogram<f64>, Counter<u64>, Counter<u64>) {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
    ];
    let duration_histogram: Histogram<f64> = meter
        .f64_histogram("predict_duration_seconds")
        .with_description("Time to classify a single image (decode + preprocess + forward)")
        .with_unit("s")
        .with_boundaries(latency_buckets.to_vec())
        .build();
    let predictions_counter: Counter<u64> = meter
        .u64_counter("predictions_total")
        .with_description("Total images classified")
        .build();
    let failures_counter: Counter<u64> = meter
        .u64_counter("prediction_failures_total")
        .with_description("Total classification requests that failed")
        .build();

    (duration_histogram, predictions_counter, failures_counter)
}

impl Predictor {
    /// Build the graph and bind the bundle's trained parameters, falling
    /// back to the public ImageNet initialization when they do not bind.
    ///
    /// The label/output-dimensionality invariant is checked before any
    /// weights are touched; a mismatch here would silently mislabel every
    /// prediction and is fatal.
    pub fn initialize(
        artifact: &ModelArtifact,
        labels: ClassLabels,
        pretrained_path: Option<&Path>,
        device: &Device,
    ) -> Result<Self, ClassifierError> {
        let config = artifact.network_config();
        labels.ensure_matches(config.num_classes)?;

        let (model, state, source) =
            match weights::bind_trained(&artifact.weights_path(), config, device) {
                Ok(model) => {
                    tracing::info!(classes = labels.len(), "Trained parameters bound");
                    (model, ModelState::Loaded, WeightSource::Trained)
                }
                Err(err) => {
                    let (model, source) = weights::bind_fallback(pretrained_path, config, device)?;
                    tracing::warn!(
                        error = %err,
                        source = ?source,
                        "Trained parameters did not bind; serving with substitute \
                         initialization. Predictions do not reflect the trained model."
                    );
                    (model, ModelState::Degraded, source)
                }
            };

        Ok(Self::from_parts(model, labels, state, source, device.clone()))
    }

    /// Assemble a predictor from already-bound parts. Used by the startup
    /// path above and by tests/benches that need a throwaway graph.
    pub fn from_parts(
        model: InsectNet,
        labels: ClassLabels,
        state: ModelState,
        source: WeightSource,
        device: Device,
    ) -> Self {
        let (duration_histogram, predictions_counter, failures_counter) =
            init_metrics("classifier");
        Self {
            model,
            labels,
            state,
            source,
            device,
            duration_histogram,
            predictions_counter,
            failures_counter,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.state == ModelState::Degraded
    }

    pub fn weight_source(&self) -> WeightSource {
        self.source
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Classify one image payload: decode, preprocess, forward, rank.
    pub fn predict(&self, payload: &[u8]) -> Result<Prediction, ClassifierError> {
        let start = Instant::now();
        let result = self.run_pipeline(payload);

        match &result {
            Ok(prediction) => {
                self.duration_histogram
                    .record(start.elapsed().as_secs_f64(), &[]);
                self.predictions_counter.add(1, &[]);
                tracing::debug!(
                    class = %prediction.class_name,
                    confidence = prediction.confidence,
                    "Image classified"
                );
            }
            Err(err) => {
                self.failures_counter.add(1, &[]);
                tracing::debug!(error = %err, "Classification failed");
            }
        }

        result
    }

    fn run_pipeline(&self, payload: &[u8]) -> Result<Prediction, ClassifierError> {
        let image = image::load_from_memory(payload)
            .map_err(|e| ClassifierError::InvalidImage(e.to_string()))?;
        let input = preprocess::to_input_tensor(&image, &self.device)?;

        let probs: Vec<f32> = self
            .model
            .forward(&input)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1())
            .map_err(|e| ClassifierError::Inference(format!("forward pass failed: {e}")))?;

        Ok(rank_predictions(self.labels.names(), &probs))
    }
}

/// Map a probability vector to a labeled, descending-sorted distribution.
///
/// The sort is stable, so equal confidences keep original class order and
/// the top entry agrees with a first-occurrence argmax.
pub fn rank_predictions(labels: &[String], probs: &[f32]) -> Prediction {
    debug_assert_eq!(labels.len(), probs.len());

    let mut all_predictions: Vec<ClassScore> = labels
        .iter()
        .zip(probs)
        .map(|(name, &confidence)| ClassScore {
            class_name: name.clone(),
            confidence,
        })
        .collect();
    all_predictions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let top = all_predictions[0].clone();
    Prediction {
        class_name: top.class_name,
        confidence: top.confidence,
        all_predictions,
    }
}
