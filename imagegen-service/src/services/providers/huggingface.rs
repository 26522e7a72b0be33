//! Hugging Face inference router provider.
//!
//! Calls `POST {base}/hf-inference/models/{model}` and normalizes either a
//! binary image body or a JSON body carrying base64 into a [`GeneratedImage`].

use super::{GeneratedImage, ImageProvider, ProviderError, DEFAULT_IMAGE_MEDIA_TYPE};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Hugging Face inference router base URL.
pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://router.huggingface.co";

/// Turbo/schnell-style defaults; models that do not use them ignore them.
const NUM_INFERENCE_STEPS: u32 = 4;
const GUIDANCE_SCALE: f32 = 0.0;

/// How much of an unexpected body is kept for diagnostics.
const BODY_PREVIEW_CHARS: usize = 500;

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_token: Secret<String>,
    pub base_url: String,
    pub timeout: Duration,
}

/// Hugging Face text-to-image provider.
pub struct HuggingFaceProvider {
    config: HuggingFaceConfig,
    client: Client,
    limiter: Arc<Semaphore>,
}

impl HuggingFaceProvider {
    /// `limiter` bounds concurrent upstream calls across every request that
    /// shares it.
    pub fn new(config: HuggingFaceConfig, limiter: Arc<Semaphore>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    fn model_url(&self, model_id: &str) -> String {
        format!(
            "{}/hf-inference/models/{}",
            self.config.base_url.trim_end_matches('/'),
            model_id
        )
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, ProviderError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::Network("outbound call limiter closed".to_string()))?;

        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                width,
                height,
                num_inference_steps: NUM_INFERENCE_STEPS,
                guidance_scale: GUIDANCE_SCALE,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        tracing::debug!(
            model = %model_id,
            prompt_len = prompt.len(),
            width,
            height,
            "Sending request to Hugging Face inference"
        );

        let response = self
            .client
            .post(self.model_url(model_id))
            .bearer_auth(self.config.api_token.expose_secret())
            .header(ACCEPT, DEFAULT_IMAGE_MEDIA_TYPE)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status,
                body: truncate_for_log(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if let Some(media_type) = image_media_type(&content_type) {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;
            return Ok(GeneratedImage::from_bytes(media_type, &bytes));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        parse_json_image(&body)
    }
}

/// Media type to label a binary body with, or `None` if the body is not an image.
///
/// Concrete subtypes are kept as declared; `image/*` or a bare `image/` falls
/// back to PNG.
pub(crate) fn image_media_type(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;

    if subtype.is_empty() || subtype == "*" {
        Some(DEFAULT_IMAGE_MEDIA_TYPE.to_string())
    } else {
        Some(essence)
    }
}

/// The JSON layouts known to carry a base64 image, in probe order.
#[derive(Debug, PartialEq, Eq)]
enum ImagePayload {
    /// `{ "image": "..." }`
    Image(String),
    /// `{ "b64_json": "..." }`
    B64Json(String),
    /// `[ { "image" | "b64_json": "..." }, ... ]`
    FirstListItem(String),
}

impl ImagePayload {
    fn detect(value: &Value) -> Option<Self> {
        if let Some(data) = non_empty_str(value, "image") {
            return Some(Self::Image(data));
        }
        if let Some(data) = non_empty_str(value, "b64_json") {
            return Some(Self::B64Json(data));
        }
        value
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| non_empty_str(first, "image").or_else(|| non_empty_str(first, "b64_json")))
            .map(Self::FirstListItem)
    }

    fn into_base64(self) -> String {
        match self {
            Self::Image(data) | Self::B64Json(data) | Self::FirstListItem(data) => data,
        }
    }
}

fn non_empty_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_json_image(body: &str) -> Result<GeneratedImage, ProviderError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidBody(format!("{} (body: {})", e, truncate_for_log(body)))
    })?;

    ImagePayload::detect(&value)
        .map(|payload| GeneratedImage::from_base64(&payload.into_base64()))
        .ok_or_else(|| ProviderError::UnrecognizedBody(truncate_for_log(body)))
}

fn truncate_for_log(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

// ============================================================================
// Inference API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    width: u32,
    height: u32,
    num_inference_steps: u32,
    guidance_scale: f32,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}
