//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        get_connections, get_queues, global_stream, health_check, post_broadcast,
        post_generation, room_stream, subscribe_room, unsubscribe_room,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// ルーティングを組み立てる
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // SSE エンドポイント
        .route("/api/events", get(global_stream))
        .route("/api/events/rooms/{room_id}", get(room_stream))
        .route(
            "/api/events/{connection_id}/rooms/{room_id}",
            post(subscribe_room).delete(unsubscribe_room),
        )
        // 外部のメッセージ処理層からの受け口
        .route("/api/broadcast", post(post_broadcast))
        .route("/api/generations", post(post_generation))
        // 観測用
        .route("/api/health", get(health_check))
        .route("/api/connections", get(get_connections))
        .route("/api/queues", get(get_queues))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// SSE event server
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(registry, queue_manager, completion_handler);
/// Server::new(state).run("127.0.0.1:8080").await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(bind_addr).await?;

        tracing::info!("Event server listening on {}", listener.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // SSE ストリームは自然には終わらないので、シグナル後に全接続を閉じる
        let registry = self.state.registry.clone();
        let shutdown = async move {
            shutdown.await;
            registry.close_all().await;
        };

        let app = build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
