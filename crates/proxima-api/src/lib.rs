pub mod frame;
pub mod handlers;
pub mod ws;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// All routes: `/ws` for clients, `/api/*` for diagnostics.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/clients", get(handlers::handle_clients))
        .with_state(state.clone());

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(cors)
}

/// Serve until `shutdown` fires.
pub async fn serve(
    state: ApiState,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "signaling server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
