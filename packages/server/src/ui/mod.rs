//! UI 層（axum による HTTP / SSE エンドポイント）

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, build_router};
pub use signal::shutdown_signal;
pub use state::AppState;
