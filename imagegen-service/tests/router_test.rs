//! Router-level tests with a scripted provider, no network involved.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use imagegen_service::config::{ImagegenConfig, InferenceConfig};
use imagegen_service::services::providers::mock::{ScriptedOutcome, ScriptedProvider};
use imagegen_service::services::ModelList;
use imagegen_service::startup::{build_router, AppState};
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tower::ServiceExt;

fn config() -> ImagegenConfig {
    ImagegenConfig {
        common: CoreConfig { port: 0 },
        inference: InferenceConfig {
            api_token: None,
            base_url: "http://unused".to_string(),
            models: Vec::new(),
            max_concurrent_calls: 1,
            request_timeout_secs: 1,
        },
        static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_string(),
    }
}

fn router(provider: &Arc<ScriptedProvider>, models: &[&str]) -> Router {
    let state = AppState::with_provider(
        config(),
        provider.clone(),
        ModelList::new(models.iter().copied()),
    );
    build_router(state)
}

async fn post_generate(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn images_come_back_in_requested_number() {
    let provider = Arc::new(
        ScriptedProvider::new().with("m/ok", ScriptedOutcome::Image(b"pixels".to_vec())),
    );

    for n in 1..=4 {
        let (status, body) =
            post_generate(router(&provider, &["m/ok"]), json!({ "prompt": "fox", "n": n })).await;

        assert_eq!(status, StatusCode::OK);
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), n);
        assert!(images
            .iter()
            .all(|i| i.as_str().unwrap().starts_with("data:image/png;base64,")));
    }
}

#[tokio::test]
async fn forbidden_short_circuits_with_bad_gateway() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with("m/first", ScriptedOutcome::Status(403))
            .with("m/second", ScriptedOutcome::Image(b"pixels".to_vec())),
    );

    let (status, body) = post_generate(
        router(&provider, &["m/first", "m/second"]),
        json!({ "prompt": "fox" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("403"));
    assert_eq!(provider.calls(), vec!["m/first"]);
}

#[tokio::test]
async fn one_failed_attempt_fails_the_batch() {
    let provider = Arc::new(ScriptedProvider::new().with("m/down", ScriptedOutcome::NetworkFailure));

    let (status, body) =
        post_generate(router(&provider, &["m/down"]), json!({ "prompt": "fox", "n": 3 })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.get("images").is_none());
    assert!(body["error"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn whitespace_prompt_is_bad_request() {
    let provider = Arc::new(ScriptedProvider::new());

    let (status, body) =
        post_generate(router(&provider, &["m/ok"]), json!({ "prompt": "\n\t ", "n": 4 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Prompt is required.");
    assert!(provider.calls().is_empty());
}
