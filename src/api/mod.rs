//! REST API server module
//!
//! Exposes the batch captioner over HTTP: image intake, item review and
//! editing, run control, session settings, exports and a server-sent event
//! stream. Every route lives under `/api/v1`.

use crate::{BatchCaptioner, Config, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Prefix shared by every route
pub const API_PREFIX: &str = "/api/v1";

/// How long open connections may linger after shutdown is requested
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Items
/// - `GET /items` - List every item in insertion order
/// - `POST /items` - Upload images (multipart) as a new batch
/// - `GET /items/:id` - Get single item
/// - `GET /items/:id/image` - Source image bytes (preview)
/// - `PUT /items/:id/caption` - Edit a generated caption
/// - `POST /items/:id/toggle` - Flip the selection flag
/// - `GET /items/:id/caption.txt` - Download one caption
/// - `POST /selection` - Select or deselect every finished item
///
/// ## Batch
/// - `POST /batch/start` - Caption every pending item
/// - `POST /batch/regenerate` - Caption selected items again
/// - `DELETE /batch` - Discard the batch, cancelling any run
/// - `GET /batch/stats` - Phase and progress
///
/// ## Settings
/// - `GET|PUT /settings/caption-length` - Caption length for the next run
/// - `GET|PUT|DELETE /settings/credential` - Annotation service key
///
/// ## Export
/// - `GET /export/archive` - ZIP of caption text files
/// - `GET /export/table` - CSV of captions
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent events stream
pub fn create_router(captioner: Arc<BatchCaptioner>, config: Arc<Config>) -> Router {
    let state = AppState::new(captioner, config.clone());

    let routes = Router::new()
        // Items
        .route(
            "/items",
            get(routes::list_items)
                .post(routes::upload_items)
                .layer(DefaultBodyLimit::max(config.api.max_upload_bytes)),
        )
        .route("/items/:id", get(routes::get_item))
        .route("/items/:id/image", get(routes::get_item_image))
        .route("/items/:id/caption", put(routes::set_item_caption))
        .route("/items/:id/toggle", post(routes::toggle_item))
        .route("/items/:id/caption.txt", get(routes::export_item_caption))
        .route("/selection", post(routes::select_all))
        // Batch
        .route("/batch", delete(routes::reset_batch))
        .route("/batch/start", post(routes::start_batch))
        .route("/batch/regenerate", post(routes::regenerate_batch))
        .route("/batch/stats", get(routes::batch_stats))
        // Settings
        .route(
            "/settings/caption-length",
            get(routes::get_caption_length).put(routes::set_caption_length),
        )
        .route(
            "/settings/credential",
            get(routes::get_credential)
                .put(routes::set_credential)
                .delete(routes::clear_credential),
        )
        // Export
        .route("/export/archive", get(routes::export_archive))
        .route("/export/table", get(routes::export_table))
        // System
        .route("/health", get(routes::health_check))
        .route("/events", get(routes::event_stream))
        .with_state(state);

    let router = Router::new().nest(API_PREFIX, routes);

    // Last layer applied runs first: trace, then CORS, then auth
    let router = if config.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    let router = if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Runs until the server fails. See [`start_api_server_with_shutdown`] for a
/// variant that stops on a signal.
///
/// # Example
///
/// ```no_run
/// use caption_batch::{BatchCaptioner, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let captioner = Arc::new(BatchCaptioner::new((*config).clone())?);
///
/// caption_batch::api::start_api_server(captioner, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(captioner: Arc<BatchCaptioner>, config: Arc<Config>) -> Result<()> {
    start_api_server_with_shutdown(captioner, config, std::future::pending()).await
}

/// Start the API server and stop gracefully once `shutdown` resolves
///
/// In-flight requests get [`SHUTDOWN_GRACE`] to finish. Event streams never
/// finish on their own, so connections still open after that are dropped.
pub async fn start_api_server_with_shutdown<F>(
    captioner: Arc<BatchCaptioner>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(captioner, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown.await;
            stop.cancel();
        }
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(stop.clone().cancelled_owned());
    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;
        }
        _ = async {
            stop.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Connections still open after shutdown grace period, closing"
            );
        }
    }

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
