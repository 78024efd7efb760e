//! UseCase: イベント配信（BroadcastRouter）
//!
//! メッセージ処理層が変更を永続化した後に呼び出す配信口です。
//! ルーム単位・ユーザー単位・全体の 3 種類の配信を提供します。
//! 配信失敗は呼び出し側には返さず、レジストリが接続を掃除します。

use async_trait::async_trait;

use crate::{
    domain::{EventBroadcaster, EventTarget, RoomId, StreamEvent, UserId},
    infrastructure::registry::ConnectionRegistry,
};

/// ConnectionRegistry の上に構築された配信ルーター
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: ConnectionRegistry,
}

impl BroadcastRouter {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// 配信先を指定してイベントを送る
    pub async fn broadcast(&self, target: EventTarget, event: StreamEvent) -> usize {
        let delivered = self.registry.deliver(&target, &event).await;
        tracing::debug!(
            "Broadcasted '{}' to {:?} ({} connections)",
            event.event_type,
            target,
            delivered
        );
        delivered
    }
}

#[async_trait]
impl EventBroadcaster for BroadcastRouter {
    async fn broadcast_to_room(&self, room_id: &RoomId, event: StreamEvent) -> usize {
        self.broadcast(EventTarget::Room(room_id.clone()), event)
            .await
    }

    async fn broadcast_to_user(&self, user_id: &UserId, event: StreamEvent) -> usize {
        self.broadcast(EventTarget::User(user_id.clone()), event)
            .await
    }

    async fn broadcast_to_all(&self, event: StreamEvent) -> usize {
        self.broadcast(EventTarget::All, event).await
    }
}
