//! Text-to-image provider abstractions and implementations.
//!
//! A provider performs exactly one upstream call per `generate` invocation;
//! choosing between models is the job of [`crate::services::fallback`].

pub mod huggingface;
pub mod mock;

use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Media type used when the upstream does not name a concrete image format.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Inference API error ({status}): {body}")]
    Status { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("No image data in response: {0}")]
    UnrecognizedBody(String),

    #[error("All models failed")]
    AllModelsFailed,
}

impl ProviderError {
    /// HTTP status returned by the upstream, if the failure carried one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401/403: the credential itself is rejected, so other models will fail too.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Status { .. } if self.is_auth_failure() => "auth_error",
            ProviderError::Status { .. } => "upstream_status",
            ProviderError::Network(_) => "network_error",
            ProviderError::InvalidBody(_) | ProviderError::UnrecognizedBody(_) => {
                "malformed_response"
            }
            ProviderError::AllModelsFailed => "exhausted",
        }
    }
}

/// A generated image held as base64 text plus its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    media_type: String,
    base64: String,
}

impl GeneratedImage {
    /// Encode raw image bytes.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.into(),
            base64: BASE64_STANDARD.encode(bytes),
        }
    }

    /// Wrap a base64 payload found in a JSON body.
    ///
    /// Payloads that already are data URIs keep their own media type.
    pub fn from_base64(payload: &str) -> Self {
        let payload = payload.trim();
        if let Some((media_type, data)) = payload
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
        {
            return Self {
                media_type: media_type.to_string(),
                base64: data.to_string(),
            };
        }

        Self {
            media_type: DEFAULT_IMAGE_MEDIA_TYPE.to_string(),
            base64: payload.to_string(),
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// `data:<media-type>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }

    /// Decode the payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(&self.base64)
    }
}

impl fmt::Display for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.media_type, self.base64)
    }
}

/// Trait for text-to-image providers (e.g., the Hugging Face inference router).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Run one inference call against `model_id`.
    async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, ProviderError>;
}
