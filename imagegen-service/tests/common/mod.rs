#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use imagegen_service::config::{ImagegenConfig, InferenceConfig};
use imagegen_service::startup::Application;
use secrecy::Secret;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_TOKEN: &str = "hf_test_token";

/// Tiny PNG-looking payload; the service never decodes it.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

/// How the fake inference router answers for one model.
#[derive(Debug, Clone)]
pub enum UpstreamReply {
    Png(Vec<u8>),
    /// Binary body under an explicit `Content-Type`.
    Image(&'static str, Vec<u8>),
    Json(Value),
    Status(u16, String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

struct UpstreamState {
    replies: HashMap<String, UpstreamReply>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// In-process stand-in for `POST /hf-inference/models/{model}`.
pub struct FakeUpstream {
    pub base_url: String,
    state: Arc<UpstreamState>,
}

impl FakeUpstream {
    pub async fn spawn(replies: Vec<(&str, UpstreamReply)>) -> Self {
        Self::spawn_with_latency(replies, Duration::ZERO).await
    }

    /// Every reply is held back by `latency`, so concurrent calls overlap.
    pub async fn spawn_with_latency(replies: Vec<(&str, UpstreamReply)>, latency: Duration) -> Self {
        let state = Arc::new(UpstreamState {
            replies: replies
                .into_iter()
                .map(|(model, reply)| (model.to_string(), reply))
                .collect(),
            calls: Mutex::new(Vec::new()),
            latency,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/hf-inference/models/*model", post(infer))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake upstream");
        let addr = listener.local_addr().expect("Fake upstream has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    /// Highest number of calls that were being served at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }
}

async fn infer(
    State(state): State<Arc<UpstreamState>>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let model = model.trim_start_matches('/').to_string();
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.calls.lock().unwrap().push(RecordedCall {
        model: model.clone(),
        authorization: header_str(header::AUTHORIZATION),
        accept: header_str(header::ACCEPT),
        body,
    });

    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(current, Ordering::SeqCst);
    if !state.latency.is_zero() {
        tokio::time::sleep(state.latency).await;
    }
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    match state.replies.get(&model) {
        Some(UpstreamReply::Png(bytes)) => {
            ([(header::CONTENT_TYPE, "image/png")], bytes.clone()).into_response()
        }
        Some(UpstreamReply::Image(content_type, bytes)) => {
            ([(header::CONTENT_TYPE, *content_type)], bytes.clone()).into_response()
        }
        Some(UpstreamReply::Json(value)) => Json(value.clone()).into_response(),
        Some(UpstreamReply::Status(code, body)) => {
            (StatusCode::from_u16(*code).unwrap(), body.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("Model {} not found", model)).into_response(),
    }
}

pub fn test_config(base_url: &str, models: &[&str], token: Option<&str>) -> ImagegenConfig {
    ImagegenConfig {
        common: CoreConfig { port: 0 },
        inference: InferenceConfig {
            api_token: token.map(|t| Secret::new(t.to_string())),
            base_url: base_url.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
            max_concurrent_calls: 4,
            request_timeout_secs: 10,
        },
        static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_string(),
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn(config: ImagegenConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        Self {
            address,
            port,
            client,
        }
    }

    /// Spawn against a fake upstream with the default test token.
    pub async fn with_upstream(upstream: &FakeUpstream, models: &[&str]) -> Self {
        Self::spawn(test_config(&upstream.base_url, models, Some(TEST_TOKEN))).await
    }

    pub async fn post_generate(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/generate", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
