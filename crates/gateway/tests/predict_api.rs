//! Integration tests driving the router end to end with in-memory
//! requests. The predictor runs a randomly initialized graph: slower than
//! a stub, but it exercises the real preprocess + forward path.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use classifier::model::NetworkConfig;
use classifier::{ClassLabels, Device, ModelState, Predictor, weights};
use gateway::state::AppState;
use http_body_util::BodyExt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "gw-test-boundary-4Yd9qTPa";

fn test_state() -> AppState {
    let config = NetworkConfig::default();
    let (net, source) = weights::bind_fallback(None, &config, &Device::Cpu).unwrap();
    let labels = ClassLabels::new(vec![
        "bee".to_string(),
        "wasp".to_string(),
        "insect".to_string(),
        "other".to_string(),
    ]);
    let predictor = Predictor::from_parts(net, labels, ModelState::Degraded, source, Device::Cpu);
    AppState {
        predictor: Some(Arc::new(predictor)),
        predict_timeout: Duration::from_secs(120),
    }
}

fn png_payload() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(320, 240, image::Rgb([200, 170, 30]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_predict(state: AppState, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
    let response = gateway::app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Liveness endpoint responds without touching the model
#[tokio::test]
async fn liveness_endpoint() {
    let response = gateway::app(test_state())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["status"], "ok");
}

/// Health reports a loaded-but-degraded model when weights fell back
#[tokio::test]
async fn health_reports_degraded_model_as_loaded() {
    let response = gateway::app(test_state())
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["model_loaded"], true);
    assert_eq!(value["degraded"], true);
}

/// A valid upload yields a complete, sorted confidence distribution
#[tokio::test]
async fn predict_returns_sorted_distribution() {
    let body = multipart_body("file", "bee.png", "image/png", &png_payload());
    let (status, value) = post_predict(test_state(), body).await;

    assert_eq!(status, StatusCode::OK);

    let all = value["all_predictions"].as_array().unwrap();
    assert_eq!(all.len(), 4, "one entry per known class");

    let sum: f64 = all
        .iter()
        .map(|p| p["confidence"].as_f64().unwrap())
        .sum();
    assert!((sum - 1.0).abs() < 1e-4, "confidences must sum to 1: {sum}");

    for pair in all.windows(2) {
        assert!(
            pair[0]["confidence"].as_f64().unwrap() >= pair[1]["confidence"].as_f64().unwrap(),
            "distribution must be sorted descending"
        );
    }

    assert_eq!(value["class_name"], all[0]["class_name"]);
    assert_eq!(value["confidence"], all[0]["confidence"]);
}

/// Non-image content type is rejected before any inference
#[tokio::test]
async fn predict_rejects_non_image_content_type() {
    let body = multipart_body("file", "notes.txt", "text/plain", b"just some text");
    let (status, value) = post_predict(test_state(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["detail"], "File must be an image");
}

/// Image content type with undecodable bytes is a client error
#[tokio::test]
async fn predict_rejects_undecodable_image() {
    let body = multipart_body("file", "broken.png", "image/png", b"not really a png");
    let (status, value) = post_predict(test_state(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        value["detail"]
            .as_str()
            .unwrap()
            .starts_with("File must be a decodable image"),
        "unexpected detail: {}",
        value["detail"]
    );
}

/// A multipart body without the `file` field is a client error
#[tokio::test]
async fn predict_rejects_missing_file_field() {
    let body = multipart_body("avatar", "bee.png", "image/png", &png_payload());
    let (status, value) = post_predict(test_state(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["detail"], "missing `file` field");
}

/// Without an initialized graph every predict call is a server error
#[tokio::test]
async fn predict_without_model_is_server_error() {
    let state = AppState {
        predictor: None,
        predict_timeout: Duration::from_secs(1),
    };
    let body = multipart_body("file", "bee.png", "image/png", &png_payload());
    let (status, value) = post_predict(state, body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(value["detail"], "Model not loaded");
}
