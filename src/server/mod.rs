//! HTTP surface wrapping the pipeline and the gallery.

mod error;
mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::gallery::GalleryStore;
use crate::pipeline::Pipeline;

pub use error::ApiError;
pub use routes::SaveResponse;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    gallery: GalleryStore,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: Pipeline, gallery: GalleryStore) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            gallery,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/process-image", post(routes::process_image))
        .route("/save-to-gallery", post(routes::save_to_gallery))
        .route("/gallery", get(routes::list_gallery))
        .route(
            "/gallery/{id}",
            get(routes::get_scene).delete(routes::delete_scene),
        )
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Credentialed CORS for the listed origins; `*` allows any origin without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(values))
        .allow_credentials(true)
}
