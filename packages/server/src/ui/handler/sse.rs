//! SSE エンドポイント
//!
//! 接続ごとの受信側をそのままレスポンスボディとして流します。
//! ボディが drop された（クライアントが切断した）時点で接続をレジストリから外します。

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    domain::{ConnectionId, RoomId, UserId},
    ui::state::AppState,
    usecase::{OpenedStream, SubscriptionUseCase},
};

/// 接続 ID を返すレスポンスヘッダ
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    user_id: String,
}

/// ボディと一緒に drop され、接続を閉じる
struct CloseOnDrop {
    connection_id: ConnectionId,
    usecase: SubscriptionUseCase,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let connection_id = self.connection_id.clone();
        let usecase = self.usecase.clone();
        handle.spawn(async move {
            usecase.close(&connection_id).await;
        });
    }
}

/// `GET /api/events/rooms/{room_id}?user_id=..`
pub async fn room_stream(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let room_id = match RoomId::new(room_id) {
        Ok(room_id) => room_id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    open_stream(&state, query, Some(room_id)).await
}

/// `GET /api/events?user_id=..`
///
/// ルームを購読しない接続。ユーザー宛てと全体宛てのイベントだけを受信します。
pub async fn global_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Response {
    open_stream(&state, query, None).await
}

async fn open_stream(state: &AppState, query: StreamQuery, room_id: Option<RoomId>) -> Response {
    let user_id = match UserId::new(query.user_id) {
        Ok(user_id) => user_id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.subscription_usecase.open(user_id, room_id).await {
        Ok(opened) => event_stream(opened, state.subscription_usecase.clone()),
        Err(e) => {
            tracing::warn!("Failed to open stream: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn event_stream(opened: OpenedStream, usecase: SubscriptionUseCase) -> Response {
    let OpenedStream {
        connection_id,
        frames,
    } = opened;
    let header_id = connection_id.to_string();
    let guard = CloseOnDrop {
        connection_id,
        usecase,
    };

    let stream = futures_util::stream::unfold((frames, guard), |(mut frames, guard)| async move {
        frames
            .recv()
            .await
            .map(|frame| (Ok::<_, Infallible>(frame), (frames, guard)))
    });

    (
        [
            (CONTENT_TYPE, "text/event-stream".to_string()),
            (CACHE_CONTROL, "no-cache".to_string()),
        ],
        [(CONNECTION_ID_HEADER, header_id)],
        Body::from_stream(stream),
    )
        .into_response()
}

/// `POST /api/events/{connection_id}/rooms/{room_id}`
pub async fn subscribe_room(
    State(state): State<Arc<AppState>>,
    Path((connection_id, room_id)): Path<(String, String)>,
) -> StatusCode {
    let (Ok(connection_id), Ok(room_id)) = (ConnectionId::new(connection_id), RoomId::new(room_id))
    else {
        return StatusCode::BAD_REQUEST;
    };
    if state
        .subscription_usecase
        .join_room(&connection_id, room_id)
        .await
    {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// `DELETE /api/events/{connection_id}/rooms/{room_id}`
pub async fn unsubscribe_room(
    State(state): State<Arc<AppState>>,
    Path((connection_id, room_id)): Path<(String, String)>,
) -> StatusCode {
    let (Ok(connection_id), Ok(room_id)) = (ConnectionId::new(connection_id), RoomId::new(room_id))
    else {
        return StatusCode::BAD_REQUEST;
    };
    if state
        .subscription_usecase
        .leave_room(&connection_id, &room_id)
        .await
    {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
