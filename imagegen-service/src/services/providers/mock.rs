//! Mock provider implementation for testing.

use super::{GeneratedImage, ImageProvider, ProviderError, DEFAULT_IMAGE_MEDIA_TYPE};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// What a scripted model answers.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Image(Vec<u8>),
    Status(u16),
    NetworkFailure,
}

/// Provider that replays a fixed outcome per model and records the call order.
///
/// Models without a script answer 404.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    outcomes: HashMap<String, ScriptedOutcome>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model_id: impl Into<String>, outcome: ScriptedOutcome) -> Self {
        self.outcomes.insert(model_id.into(), outcome);
        self
    }

    /// Model ids in the order they were called.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(
        &self,
        model_id: &str,
        _prompt: &str,
        _width: u32,
        _height: u32,
    ) -> Result<GeneratedImage, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(model_id.to_string());

        match self.outcomes.get(model_id) {
            Some(ScriptedOutcome::Image(bytes)) => {
                Ok(GeneratedImage::from_bytes(DEFAULT_IMAGE_MEDIA_TYPE, bytes))
            }
            Some(ScriptedOutcome::Status(code)) => Err(ProviderError::Status {
                status: StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
                body: format!("{} answered {}", model_id, code),
            }),
            Some(ScriptedOutcome::NetworkFailure) => Err(ProviderError::Network(format!(
                "connection reset by {}",
                model_id
            ))),
            None => Err(ProviderError::Status {
                status: StatusCode::NOT_FOUND,
                body: format!("{} not found", model_id),
            }),
        }
    }
}
