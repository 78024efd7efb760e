//! Server state

use std::sync::Arc;

use crate::{
    domain::SharedCompletionHandler,
    infrastructure::registry::ConnectionRegistry,
    usecase::{BroadcastRouter, QueueManager, SubscriptionUseCase},
};

/// Shared application state
pub struct AppState {
    /// 接続レジストリ（統計の参照用）
    pub registry: ConnectionRegistry,
    /// SubscriptionUseCase（接続の開始・購読変更・終了）
    pub subscription_usecase: SubscriptionUseCase,
    /// BroadcastRouter（イベント配信）
    pub broadcast_router: BroadcastRouter,
    /// QueueManager（AI 生成キュー）
    pub queue_manager: Arc<QueueManager>,
    /// 生成結果の通知先
    pub completion_handler: SharedCompletionHandler,
}

impl AppState {
    pub fn new(
        registry: ConnectionRegistry,
        queue_manager: Arc<QueueManager>,
        completion_handler: SharedCompletionHandler,
    ) -> Self {
        Self {
            subscription_usecase: SubscriptionUseCase::new(registry.clone()),
            broadcast_router: BroadcastRouter::new(registry.clone()),
            registry,
            queue_manager,
            completion_handler,
        }
    }
}
