//! Application startup and lifecycle management.

use crate::config::{ImagegenConfig, API_TOKEN_ENV};
use crate::handlers;
use crate::services::providers::huggingface::{HuggingFaceConfig, HuggingFaceProvider};
use crate::services::providers::ImageProvider;
use crate::services::{FallbackOrchestrator, ModelList};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ImagegenConfig,
    /// `None` when no credential is configured.
    pub orchestrator: Option<Arc<FallbackOrchestrator>>,
}

impl AppState {
    /// Wire the Hugging Face provider from configuration.
    pub fn from_config(config: ImagegenConfig) -> Result<Self, AppError> {
        let Some(api_token) = config.inference.api_token.clone() else {
            tracing::warn!(
                "{} is not set; /api/generate will answer 500 until it is",
                API_TOKEN_ENV
            );
            return Ok(Self {
                config,
                orchestrator: None,
            });
        };

        let limiter = Arc::new(Semaphore::new(config.inference.max_concurrent_calls.max(1)));
        let provider = HuggingFaceProvider::new(
            HuggingFaceConfig {
                api_token,
                base_url: config.inference.base_url.clone(),
                timeout: Duration::from_secs(config.inference.request_timeout_secs),
            },
            limiter,
        )
        .map_err(|e| {
            AppError::InternalError(
                anyhow::Error::new(e).context("Failed to create inference HTTP client"),
            )
        })?;

        let models = ModelList::new(config.inference.models.iter().cloned());
        tracing::info!(
            base_url = %config.inference.base_url,
            models = ?config.inference.models,
            max_concurrent_calls = config.inference.max_concurrent_calls,
            "Initialized Hugging Face provider"
        );

        Ok(Self::with_provider(config, Arc::new(provider), models))
    }

    /// State backed by an arbitrary provider.
    pub fn with_provider(
        config: ImagegenConfig,
        provider: Arc<dyn ImageProvider>,
        models: ModelList,
    ) -> Self {
        Self {
            config,
            orchestrator: Some(Arc::new(FallbackOrchestrator::new(provider, models))),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api/generate", post(handlers::generate_images))
        .fallback_service(static_files)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

type ServerFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

pub struct Application {
    port: u16,
    server: ServerFuture,
}

impl Application {
    pub async fn build(config: ImagegenConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config)?;
        Self::build_with_state(state).await
    }

    /// Bind and prepare the server for a pre-built state (port 0 = random port).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let app = build_router(state);
        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::pin(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
