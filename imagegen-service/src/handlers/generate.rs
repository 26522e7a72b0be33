use crate::config::API_TOKEN_ENV;
use crate::dtos::{GenerateRequest, GenerateResponse, GenerationParams};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use service_core::error::AppError;
use service_core::middleware::RequestId;

/// `POST /api/generate`
///
/// An unreadable body is handled like an empty one, so it surfaces as the
/// missing-prompt error rather than an extractor rejection.
pub async fn generate_images(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(
                request_id = %request_id,
                error = %rejection,
                "Unreadable generate payload"
            );
            GenerateRequest::default()
        }
    };

    let params = GenerationParams::try_from(request)?;

    let orchestrator = state.orchestrator.as_ref().ok_or_else(|| {
        tracing::error!(request_id = %request_id, "{} is not configured", API_TOKEN_ENV);
        AppError::ConfigError(anyhow::anyhow!("Missing {} on server.", API_TOKEN_ENV))
    })?;

    tracing::info!(
        request_id = %request_id,
        prompt_len = params.prompt.len(),
        count = params.count,
        width = params.width,
        height = params.height,
        "Generating images"
    );

    let images = orchestrator
        .generate_batch(&params.prompt, params.width, params.height, params.count)
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id, error = ?e, "Image generation failed");
            AppError::BadGateway(e.to_string())
        })?;

    Ok(Json(GenerateResponse::from(images)))
}
