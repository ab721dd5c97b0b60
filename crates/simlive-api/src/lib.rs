pub mod handlers;

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Multipart framing on top of the model bytes themselves.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// The full `/api` router, ready to serve.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = match state.store.settings().max_model_bytes {
        0 => DefaultBodyLimit::disable(),
        max => DefaultBodyLimit::max(max + UPLOAD_OVERHEAD_BYTES),
    };

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .route("/sessions", post(handlers::handle_load))
        .route(
            "/sessions/{id}",
            get(handlers::handle_session_inspect).delete(handlers::handle_session_drop),
        )
        .route(
            "/sessions/{id}/upload",
            post(handlers::handle_upload).layer(upload_limit),
        )
        .route("/sessions/{id}/model", get(handlers::handle_model_download))
        .route("/sessions/{id}/run", post(handlers::handle_run))
        .route("/sessions/{id}/redraw", post(handlers::handle_redraw))
        .route("/sessions/{id}/drag", post(handlers::handle_drag))
        .route("/sessions/{id}/get_param", post(handlers::handle_get_param))
        .route("/sessions/{id}/set_param", post(handlers::handle_set_param))
        .route(
            "/sessions/{id}/set_sim_param",
            post(handlers::handle_set_sim_param),
        )
        .route("/sessions/{id}/reset", post(handlers::handle_reset))
        .route("/sessions/{id}/live", get(handlers::handle_live))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    state: ApiState,
    bind: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    tracing::info!(bind, port, "API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
