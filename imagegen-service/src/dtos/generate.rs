use crate::services::providers::GeneratedImage;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use service_core::error::AppError;

pub const MIN_IMAGES: i64 = 1;
pub const MAX_IMAGES: i64 = 4;
pub const DEFAULT_DIMENSION: u32 = 768;

/// Body of `POST /api/generate`.
///
/// Fields of the wrong JSON type are read as absent; validation happens in
/// [`GenerationParams::try_from`].
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub images: Vec<String>,
}

impl From<Vec<GeneratedImage>> for GenerateResponse {
    fn from(images: Vec<GeneratedImage>) -> Self {
        Self {
            images: images.iter().map(GeneratedImage::to_data_uri).collect(),
        }
    }
}

/// Validated generation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub prompt: String,
    pub count: usize,
    pub width: u32,
    pub height: u32,
}

impl TryFrom<GenerateRequest> for GenerationParams {
    type Error = AppError;

    fn try_from(request: GenerateRequest) -> Result<Self, Self::Error> {
        let prompt = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Prompt is required.")))?
            .to_string();

        let (width, height) = parse_size(request.size.as_deref());

        Ok(Self {
            prompt,
            count: clamp_count(request.n),
            width,
            height,
        })
    }
}

/// Absent or zero ⇒ 1, otherwise clamped to `[1, 4]`.
pub fn clamp_count(n: Option<i64>) -> usize {
    n.unwrap_or(MIN_IMAGES).clamp(MIN_IMAGES, MAX_IMAGES) as usize
}

/// Parse `"WxH"`; anything else yields 768×768.
pub fn parse_size(size: Option<&str>) -> (u32, u32) {
    size.and_then(|s| {
        let s = s.trim().to_ascii_lowercase();
        let (w, h) = s.split_once('x')?;
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;
        (width > 0 && height > 0).then_some((width, height))
    })
    .unwrap_or((DEFAULT_DIMENSION, DEFAULT_DIMENSION))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
