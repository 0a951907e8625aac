use classifier::Predictor;
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only handle to the model and request policy.
///
/// `predictor` is `None` only when the graph never initialized; predict
/// calls then fail with a model-unavailable error until the process is
/// restarted.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Option<Arc<Predictor>>,
    pub predict_timeout: Duration,
}
