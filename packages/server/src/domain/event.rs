//! クライアントへ配信するイベント

use serde::Serialize;
use serde_json::Value;

use super::value_object::ConnectionId;

pub const CONNECTED_EVENT: &str = "connected";
pub const PING_EVENT: &str = "ping";

/// ストリームで配信されるイベント
///
/// `event_type` が SSE の `event:` 行、`payload` が `data:` 行（JSON）になります。
/// アプリケーションイベント（新着メッセージ、削除など）の payload は
/// このクレートでは解釈せず、そのまま中継します。
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub event_type: String,
    pub payload: Value,
}

impl StreamEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// 任意のシリアライズ可能な payload からイベントを作成
    pub fn from_serializable<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// 接続確立の通知（payload は接続 ID）
    pub fn connected(connection_id: &ConnectionId) -> Self {
        Self::new(CONNECTED_EVENT, Value::String(connection_id.to_string()))
    }

    /// keep-alive（payload は ISO-8601 のタイムスタンプ）
    pub fn ping(timestamp: String) -> Self {
        Self::new(PING_EVENT, Value::String(timestamp))
    }
}
