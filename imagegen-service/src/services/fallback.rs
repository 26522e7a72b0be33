//! Ordered model fallback.
//!
//! One generation attempt walks the model list top to bottom, one call per
//! model, until a model yields an image. A rejected credential (401/403) ends
//! the walk at once; any other failure moves on to the next model and only the
//! first such failure is kept for reporting.

use crate::services::metrics;
use crate::services::providers::{GeneratedImage, ImageProvider, ProviderError};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;

/// Built-in models, fastest first.
pub const DEFAULT_MODELS: &[&str] = &[
    "black-forest-labs/FLUX.1-schnell",
    "stabilityai/stable-diffusion-xl-base-1.0",
    "stabilityai/sdxl-turbo",
    "runwayml/stable-diffusion-v1-5",
];

/// Immutable, ordered list of upstream model identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelList(Arc<[String]>);

impl ModelList {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(models.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ModelList {
    fn default() -> Self {
        Self::new(DEFAULT_MODELS.iter().copied())
    }
}

/// Runs generation attempts against a provider using a fixed model order.
pub struct FallbackOrchestrator {
    provider: Arc<dyn ImageProvider>,
    models: ModelList,
}

impl FallbackOrchestrator {
    pub fn new(provider: Arc<dyn ImageProvider>, models: ModelList) -> Self {
        Self { provider, models }
    }

    pub fn models(&self) -> &ModelList {
        &self.models
    }

    /// One generation attempt: try each model in order until one succeeds.
    pub async fn generate(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<GeneratedImage, ProviderError> {
        let mut first_error: Option<ProviderError> = None;

        for model in self.models.iter() {
            let started = Instant::now();
            let result = self.provider.generate(model, prompt, width, height).await;
            let elapsed = started.elapsed().as_secs_f64();

            match result {
                Ok(image) => {
                    metrics::record_model_attempt(model, "success", elapsed);
                    metrics::record_generation("success");
                    tracing::info!(model = %model, elapsed_secs = elapsed, "Model produced image");
                    return Ok(image);
                }
                Err(err) if err.is_auth_failure() => {
                    metrics::record_model_attempt(model, err.kind(), elapsed);
                    metrics::record_generation("auth_error");
                    tracing::error!(
                        model = %model,
                        error = %err,
                        "Upstream rejected credentials, not trying further models"
                    );
                    return Err(err);
                }
                Err(err) => {
                    metrics::record_model_attempt(model, err.kind(), elapsed);
                    tracing::warn!(
                        model = %model,
                        error = %err,
                        "Model failed, falling back to next model"
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        metrics::record_generation("exhausted");
        Err(first_error.unwrap_or(ProviderError::AllModelsFailed))
    }

    /// `count` independent attempts run concurrently. Results keep request
    /// order; the first failure fails the batch and drops the other attempts.
    pub async fn generate_batch(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        count: usize,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        try_join_all((0..count).map(|_| self.generate(prompt, width, height))).await
    }
}
