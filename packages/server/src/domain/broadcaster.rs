//! EventBroadcaster trait 定義
//!
//! メッセージ処理側（永続化を担う外部の CRUD 層）が変更を保存した後に
//! 購読者へ通知するためのインターフェースです。
//! 具体的な実装は UseCase 層の `BroadcastRouter` が提供します。

use async_trait::async_trait;

use super::{RoomId, StreamEvent, UserId};

/// 配信先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    /// 指定ルームを購読している接続
    Room(RoomId),
    /// 指定ユーザーが所有する全接続（購読ルームは問わない）
    User(UserId),
    /// 全接続
    All,
}

/// Broadcaster trait
///
/// 配信は fire-and-forget です。届かなかった接続はレジストリ側で取り除かれ、
/// 呼び出し側に失敗は返りません。戻り値は配信できた接続数（観測用）です。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// ルームの購読者に配信
    async fn broadcast_to_room(&self, room_id: &RoomId, event: StreamEvent) -> usize;

    /// ユーザーの全接続に配信
    async fn broadcast_to_user(&self, user_id: &UserId, event: StreamEvent) -> usize;

    /// 全接続に配信
    async fn broadcast_to_all(&self, event: StreamEvent) -> usize;
}
