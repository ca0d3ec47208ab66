use crate::{
    config::Config,
    metadata::{MetadataResult, ResolveError, Resolver, Transport},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

pub fn router<T: Transport + 'static>(resolver: Arc<Resolver<T>>) -> Router {
    Router::new()
        .route("/api/metadata", post(metadata::<T>))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(resolver)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
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

    log::warn!("shutting down");
}

async fn start_app(config: Config, listen_addr: String) -> anyhow::Result<()> {
    let resolver = Arc::new(Resolver::from_config(&config.fetch)?);
    let app = router(resolver);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    log::info!("listening on {listen_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config, listen_addr: Option<String>) -> anyhow::Result<()> {
    let listen_addr = listen_addr.unwrap_or_else(|| config.server.listen_addr.clone());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config, listen_addr))
}

#[derive(Debug)]
pub struct HttpError(ResolveError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            ResolveError::MissingUrl => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"error": self.0.to_string()})),
            ),
            ResolveError::InvalidUrl { ref normalized_url } => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"error": self.0.to_string(), "normalizedUrl": normalized_url})),
            ),
            ResolveError::Other(ref err) => {
                log::error!("unexpected error: {err:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": self.0.to_string()})),
                )
            }
        }
        .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<ResolveError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataRequest {
    pub url: Option<String>,
}

async fn metadata<T: Transport + 'static>(
    State(resolver): State<Arc<Resolver<T>>>,
    payload: Result<Json<MetadataRequest>, JsonRejection>,
) -> Result<Json<MetadataResult>, HttpError> {
    let Json(payload) =
        payload.map_err(|rejection| anyhow::anyhow!("bad request body: {}", rejection.body_text()))?;

    log::debug!("payload: {payload:?}");

    let raw = payload.url.unwrap_or_default();

    // a panic inside the resolution surfaces as a JoinError, not a dropped connection
    let result = tokio::spawn(async move { resolver.resolve(&raw).await })
        .await
        .map_err(anyhow::Error::from)??;

    Ok(Json(result))
}
