//! UseCase: ストリーミング接続の開始・購読変更・終了
//!
//! 接続 ID とシンクの生成はここで行い、レジストリに登録します。
//! UI 層は返された受信側を HTTP レスポンスのボディとして流すだけです。

use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, RoomId, SinkError, UserId},
    infrastructure::registry::ConnectionRegistry,
};

/// 開いた接続
pub struct OpenedStream {
    pub connection_id: ConnectionId,
    /// SSE フレームの受信側
    pub frames: mpsc::UnboundedReceiver<String>,
}

/// 購読管理のユースケース
#[derive(Clone)]
pub struct SubscriptionUseCase {
    registry: ConnectionRegistry,
}

impl SubscriptionUseCase {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// 接続を開く
    ///
    /// # Arguments
    ///
    /// * `user_id` - 接続を所有するユーザー
    /// * `room_id` - 購読するルーム。`None` ならグローバル接続
    ///   （ユーザー宛てと全体宛てのイベントのみ受信）
    pub async fn open(
        &self,
        user_id: UserId,
        room_id: Option<RoomId>,
    ) -> Result<OpenedStream, SinkError> {
        let connection_id = ConnectionId::generate();
        let (sink, frames) = mpsc::unbounded_channel();

        self.registry
            .add_connection(connection_id.clone(), sink, user_id, room_id)
            .await?;

        Ok(OpenedStream {
            connection_id,
            frames,
        })
    }

    /// 既存の接続にルームを追加する。接続が無ければ `false`
    pub async fn join_room(&self, connection_id: &ConnectionId, room_id: RoomId) -> bool {
        self.registry.subscribe(connection_id, room_id).await
    }

    /// 既存の接続からルームを外す。接続が無ければ `false`
    pub async fn leave_room(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.registry.unsubscribe(connection_id, room_id).await
    }

    /// 接続を閉じる（冪等）
    pub async fn close(&self, connection_id: &ConnectionId) {
        self.registry.remove_connection(connection_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiroba_shared::sse::SseDecoder;

    #[tokio::test]
    async fn test_open_returns_stream_with_connected_event() {
        // テスト項目: 接続を開くと connected イベントが受信側に届き、レジストリに登録される
        // given (前提条件):
        let registry = ConnectionRegistry::default();
        let usecase = SubscriptionUseCase::new(registry.clone());

        // when (操作):
        let user_id = UserId::new("alice".to_string()).unwrap();
        let mut opened = usecase.open(user_id, None).await.unwrap();

        // then (期待する結果):
        let text = opened.frames.recv().await.unwrap();
        let frames = SseDecoder::new().push(&text);
        assert_eq!(frames[0].event, "connected");
        assert_eq!(
            frames[0].data,
            format!("\"{}\"", opened.connection_id.as_str())
        );
        assert!(registry.contains(&opened.connection_id).await);
    }

    #[tokio::test]
    async fn test_join_and_leave_room() {
        // テスト項目: 開いた接続にルームを追加・削除できる
        // given (前提条件):
        let registry = ConnectionRegistry::default();
        let usecase = SubscriptionUseCase::new(registry.clone());
        let user_id = UserId::new("alice".to_string()).unwrap();
        let opened = usecase.open(user_id, None).await.unwrap();
        let room_id = RoomId::new("42".to_string()).unwrap();

        // when (操作):
        let joined = usecase.join_room(&opened.connection_id, room_id.clone()).await;

        // then (期待する結果):
        assert!(joined);
        assert_eq!(
            registry.rooms_of(&opened.connection_id).await,
            Some(vec![room_id.clone()])
        );

        // when (操作):
        let left = usecase.leave_room(&opened.connection_id, &room_id).await;

        // then (期待する結果):
        assert!(left);
        assert_eq!(registry.rooms_of(&opened.connection_id).await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        // テスト項目: close すると受信側のストリームが終了する
        // given (前提条件):
        let registry = ConnectionRegistry::default();
        let usecase = SubscriptionUseCase::new(registry.clone());
        let user_id = UserId::new("alice".to_string()).unwrap();
        let mut opened = usecase.open(user_id, None).await.unwrap();
        let _connected = opened.frames.recv().await;

        // when (操作):
        usecase.close(&opened.connection_id).await;

        // then (期待する結果):
        assert_eq!(opened.frames.recv().await, None);
        assert_eq!(registry.connection_count().await, 0);
    }
}
