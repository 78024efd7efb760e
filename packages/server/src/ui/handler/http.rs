//! HTTP API endpoint handlers (observability)

use std::{collections::BTreeMap, sync::Arc};

use axum::{Json, extract::State};

use crate::{infrastructure::registry::RegistryStats, ui::state::AppState, usecase::ProviderStatus};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// 接続数とルームごとの購読数
pub async fn get_connections(State(state): State<Arc<AppState>>) -> Json<RegistryStats> {
    Json(state.registry.stats().await)
}

/// プロバイダごとのキュー状態
pub async fn get_queues(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, ProviderStatus>> {
    Json(state.queue_manager.status())
}
