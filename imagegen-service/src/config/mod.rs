use crate::services::fallback::DEFAULT_MODELS;
use crate::services::providers::huggingface::DEFAULT_INFERENCE_BASE_URL;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Name of the credential variable, also used in user-facing errors.
pub const API_TOKEN_ENV: &str = "HF_TOKEN";

const DEFAULT_MAX_CONCURRENT_CALLS: usize = 8;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_STATIC_DIR: &str = "imagegen-service/public";

#[derive(Debug, Clone)]
pub struct ImagegenConfig {
    pub common: core_config::Config,
    pub inference: InferenceConfig,
    /// Directory served at `/`.
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// `None` keeps the server up but every generation answers 500.
    pub api_token: Option<Secret<String>>,
    pub base_url: String,
    /// Fallback order, consulted top to bottom.
    pub models: Vec<String>,
    /// Upper bound on simultaneous upstream calls across all requests.
    pub max_concurrent_calls: usize,
    pub request_timeout_secs: u64,
}

impl ImagegenConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Layer the service settings over `common`, reading variables through
    /// `lookup`. `PORT` wins over the port already in `common`.
    pub fn from_lookup<F>(mut common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_env = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        if let Some(port) = lookup("PORT") {
            common.port = parse_env("PORT", &port)?;
        }

        let models = match lookup("IMAGEGEN_MODELS") {
            Some(raw) => parse_model_list(&raw),
            None => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        };

        Ok(ImagegenConfig {
            common,
            inference: InferenceConfig {
                api_token: lookup(API_TOKEN_ENV)
                    .filter(|token| !token.trim().is_empty())
                    .map(Secret::new),
                base_url: get_env("IMAGEGEN_INFERENCE_BASE_URL", DEFAULT_INFERENCE_BASE_URL),
                models,
                max_concurrent_calls: parse_env(
                    "IMAGEGEN_MAX_CONCURRENT_CALLS",
                    &get_env(
                        "IMAGEGEN_MAX_CONCURRENT_CALLS",
                        &DEFAULT_MAX_CONCURRENT_CALLS.to_string(),
                    ),
                )?,
                request_timeout_secs: parse_env(
                    "IMAGEGEN_REQUEST_TIMEOUT_SECS",
                    &get_env(
                        "IMAGEGEN_REQUEST_TIMEOUT_SECS",
                        &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
                    ),
                )?,
            },
            static_dir: get_env("IMAGEGEN_STATIC_DIR", DEFAULT_STATIC_DIR),
        })
    }
}

/// Split a comma-separated model list, dropping blanks.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
    })
}
