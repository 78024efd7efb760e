//! 外部のメッセージ処理層から呼ばれる受け口
//!
//! 同一プロセスに組み込む場合は `BroadcastRouter` / `QueueManager` を直接呼べば済みます。
//! 別プロセスの CRUD 層からは以下の HTTP エンドポイントを使います。

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        AiMemberConfig, ConversationContext, EventTarget, GenerationJob, GenerationKind,
        QueueError, RoomId, StreamEvent, UserId,
    },
    ui::state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetDto {
    Room { room_id: RoomId },
    User { user_id: UserId },
    All,
}

impl From<TargetDto> for EventTarget {
    fn from(dto: TargetDto) -> Self {
        match dto {
            TargetDto::Room { room_id } => EventTarget::Room(room_id),
            TargetDto::User { user_id } => EventTarget::User(user_id),
            TargetDto::All => EventTarget::All,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub target: TargetDto,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

/// `POST /api/broadcast`
///
/// payload は解釈せずにそのまま中継します。
pub async fn post_broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.event.trim().is_empty() || request.event.contains('\n') {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid event type"})),
        ));
    }
    let event = StreamEvent::new(request.event, request.payload);
    let delivered = state
        .broadcast_router
        .broadcast(request.target.into(), event)
        .await;
    Ok(Json(BroadcastResponse { delivered }))
}

#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub room_id: RoomId,
    pub member: AiMemberConfig,
    #[serde(default)]
    pub context: ConversationContext,
    #[serde(default)]
    pub kind: GenerationKind,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// `POST /api/generations`
///
/// 受け付けた時点で 202 を返し、結果はルームへのイベントとして届きます。
pub async fn post_generation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerationRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let job = GenerationJob {
        provider: request.member.provider.clone(),
        room_id: request.room_id,
        member: request.member,
        context: request.context,
        kind: request.kind,
        reply_to: request.reply_to,
    };

    match state
        .queue_manager
        .enqueue(job, state.completion_handler.clone())
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "queued"})),
        ),
        Err(e) => {
            let status = match e {
                QueueError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                QueueError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
                QueueError::WorkerStopped(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(serde_json::json!({"error": e.to_string()})))
        }
    }
}
