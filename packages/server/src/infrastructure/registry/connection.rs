//! インメモリの接続レジストリ
//!
//! ## 責務
//!
//! - 接続ごとの `EventSink`、所有ユーザー、購読ルームの管理
//! - 接続直後の `connected` イベント送信と、定期的な `ping` 送信
//! - 配信先の絞り込みと送信、書き込みに失敗した接続の自動削除
//!
//! ## 設計ノート
//!
//! `EventSink` は UI 層（SSE ハンドラ）で生成された `UnboundedSender` です。
//! 受信側（HTTP レスポンスのボディ）が drop されると送信が失敗するので、
//! それを切断とみなします。
//!
//! 接続マップを変更するのはこのレジストリだけです。配信中に失敗した接続は
//! イテレーション後に同じロックの中でまとめて削除します。

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use hiroba_shared::{sse::SseFrame, time::now_rfc3339};
use serde::Serialize;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::domain::{ConnectionId, EventTarget, RoomId, SinkError, StreamEvent, UserId};

/// 接続ごとの書き込み専用シンク（SSE フレームのテキスト）
pub type EventSink = mpsc::UnboundedSender<String>;

/// keep-alive の既定間隔
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// レジストリの設定
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub keep_alive_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

/// レジストリの統計情報（観測用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub connections: usize,
    /// 購読ルームを持たない（グローバル）接続の数
    pub global_connections: usize,
    /// ルーム ID ごとの購読接続数
    pub rooms: BTreeMap<String, usize>,
}

struct ConnectionEntry {
    user_id: UserId,
    rooms: HashSet<RoomId>,
    sink: EventSink,
    keep_alive: JoinHandle<()>,
}

impl ConnectionEntry {
    fn matches(&self, target: &EventTarget) -> bool {
        match target {
            EventTarget::Room(room_id) => self.rooms.contains(room_id),
            EventTarget::User(user_id) => &self.user_id == user_id,
            EventTarget::All => true,
        }
    }
}

struct RegistryInner {
    connections: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
    next_event_id: AtomicU64,
    config: RegistryConfig,
}

impl RegistryInner {
    fn encode(&self, event: &StreamEvent) -> String {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        SseFrame::new(event.event_type.clone(), event.payload.to_string(), id).encode()
    }

    async fn remove(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.connections.lock().await.remove(connection_id);
        match removed {
            Some(entry) => {
                // sink は entry と共に drop され、ストリームが終了する
                entry.keep_alive.abort();
                true
            }
            None => false,
        }
    }
}

/// 接続レジストリ
///
/// `Clone` は同じレジストリへのハンドルを複製します。
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: Mutex::new(HashMap::new()),
                next_event_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// 接続を登録する
    ///
    /// `connected` イベントを即座に送信し、keep-alive タスクを開始します。
    /// 同じ ID の接続が既にあれば置き換えます。
    ///
    /// # Errors
    ///
    /// `connected` の送信に失敗した場合（既にクライアントが切断している）は
    /// 登録せずに `SinkError::Closed` を返します。
    pub async fn add_connection(
        &self,
        connection_id: ConnectionId,
        sink: EventSink,
        user_id: UserId,
        room_id: Option<RoomId>,
    ) -> Result<(), SinkError> {
        let frame = self.inner.encode(&StreamEvent::connected(&connection_id));
        sink.send(frame).map_err(|_| SinkError::Closed)?;

        let keep_alive = tokio::spawn(keep_alive_loop(
            Arc::downgrade(&self.inner),
            connection_id.clone(),
            sink.clone(),
            self.inner.config.keep_alive_interval,
        ));

        let entry = ConnectionEntry {
            user_id: user_id.clone(),
            rooms: room_id.iter().cloned().collect(),
            sink,
            keep_alive,
        };

        let previous = self
            .inner
            .connections
            .lock()
            .await
            .insert(connection_id.clone(), entry);
        if let Some(previous) = previous {
            previous.keep_alive.abort();
            tracing::warn!("Connection '{}' was re-registered", connection_id);
        }

        tracing::info!(
            "Connection '{}' registered for user '{}' (room: {})",
            connection_id,
            user_id,
            room_id.as_ref().map(RoomId::as_str).unwrap_or("<global>")
        );
        Ok(())
    }

    /// 接続を削除する（存在しない ID は何もしない）
    pub async fn remove_connection(&self, connection_id: &ConnectionId) {
        if self.inner.remove(connection_id).await {
            tracing::info!("Connection '{}' removed", connection_id);
        }
    }

    /// すべての接続を閉じる（シャットダウン時）
    ///
    /// 各ストリームは終端し、HTTP レスポンスが完了します。
    pub async fn close_all(&self) -> usize {
        let drained: Vec<ConnectionEntry> = {
            let mut connections = self.inner.connections.lock().await;
            connections.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.keep_alive.abort();
        }
        if !drained.is_empty() {
            tracing::info!("Closed {} connections", drained.len());
        }
        drained.len()
    }

    /// 接続にルームを追加する
    ///
    /// 接続が存在すれば `true` を返します。
    pub async fn subscribe(&self, connection_id: &ConnectionId, room_id: RoomId) -> bool {
        let mut connections = self.inner.connections.lock().await;
        match connections.get_mut(connection_id) {
            Some(entry) => {
                tracing::debug!("Connection '{}' subscribed to '{}'", connection_id, room_id);
                entry.rooms.insert(room_id);
                true
            }
            None => false,
        }
    }

    /// 接続からルームを外す
    pub async fn unsubscribe(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        let mut connections = self.inner.connections.lock().await;
        match connections.get_mut(connection_id) {
            Some(entry) => {
                tracing::debug!(
                    "Connection '{}' unsubscribed from '{}'",
                    connection_id,
                    room_id
                );
                entry.rooms.remove(room_id);
                true
            }
            None => false,
        }
    }

    /// 条件に合う接続すべてにイベントを送る
    ///
    /// 送信に失敗した接続は削除され、残りの接続への配信は継続されます。
    /// 配信できた接続数を返します。
    pub async fn deliver(&self, target: &EventTarget, event: &StreamEvent) -> usize {
        let frame = self.inner.encode(event);
        let mut connections = self.inner.connections.lock().await;

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (connection_id, entry) in connections.iter() {
            if !entry.matches(target) {
                continue;
            }
            if entry.sink.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(connection_id.clone());
            }
        }

        for connection_id in dead {
            if let Some(entry) = connections.remove(&connection_id) {
                entry.keep_alive.abort();
                tracing::warn!(
                    "Failed to deliver '{}' to connection '{}', removed",
                    event.event_type,
                    connection_id
                );
            }
        }

        delivered
    }

    /// 接続が登録されているか
    pub async fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.inner.connections.lock().await.contains_key(connection_id)
    }

    /// 登録中の接続数
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    /// 接続の購読ルーム一覧（ソート済み）
    pub async fn rooms_of(&self, connection_id: &ConnectionId) -> Option<Vec<RoomId>> {
        let connections = self.inner.connections.lock().await;
        connections.get(connection_id).map(|entry| {
            let mut rooms: Vec<RoomId> = entry.rooms.iter().cloned().collect();
            rooms.sort();
            rooms
        })
    }

    /// 統計情報
    pub async fn stats(&self) -> RegistryStats {
        let connections = self.inner.connections.lock().await;
        let mut stats = RegistryStats {
            connections: connections.len(),
            ..RegistryStats::default()
        };
        for entry in connections.values() {
            if entry.rooms.is_empty() {
                stats.global_connections += 1;
            }
            for room_id in &entry.rooms {
                *stats.rooms.entry(room_id.to_string()).or_default() += 1;
            }
        }
        stats
    }
}

/// keep-alive ループ
///
/// 一定間隔で `ping` を送り、送信失敗またはシンクのクローズを検知したら
/// 接続をレジストリから削除して終了します。
async fn keep_alive_loop(
    registry: Weak<RegistryInner>,
    connection_id: ConnectionId,
    sink: EventSink,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = registry.upgrade() else {
                    break;
                };
                let frame = inner.encode(&StreamEvent::ping(now_rfc3339()));
                if sink.send(frame).is_err() {
                    tracing::debug!("Keep-alive to '{}' failed", connection_id);
                    inner.remove(&connection_id).await;
                    break;
                }
            }
            _ = sink.closed() => {
                if let Some(inner) = registry.upgrade()
                    && inner.remove(&connection_id).await
                {
                    tracing::info!("Connection '{}' closed by client", connection_id);
                }
                break;
            }
        }
    }
}
