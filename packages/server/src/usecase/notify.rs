//! UseCase: 生成結果のルームへの通知
//!
//! 永続化を担う外部のメッセージ処理層が無い構成（単体のサーバーバイナリや
//! 結合テスト）で使う既定の [`CompletionHandler`] です。
//! 生成結果をそのままルームの購読者へ配信します。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{
    CompletionHandler, EventBroadcaster, GenerationError, GenerationJob, GenerationOutput,
    StreamEvent,
};

pub const AI_RESPONSE_EVENT: &str = "ai-response";
pub const AI_AUDIO_EVENT: &str = "ai-audio";
pub const AI_ERROR_EVENT: &str = "ai-error";

#[derive(Serialize)]
struct AiResponsePayload<'a> {
    member_id: &'a str,
    display_name: &'a str,
    reply_to: Option<&'a str>,
    content: &'a str,
}

#[derive(Serialize)]
struct AiAudioPayload<'a> {
    member_id: &'a str,
    reply_to: Option<&'a str>,
    content_type: &'a str,
    size: usize,
}

#[derive(Serialize)]
struct AiErrorPayload<'a> {
    member_id: &'a str,
    display_name: &'a str,
    error: String,
}

/// 生成結果をルームへ配信するハンドラ
pub struct RoomNotifier {
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl RoomNotifier {
    pub fn new(broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        Self { broadcaster }
    }

    async fn publish<T: Serialize>(&self, job: &GenerationJob, event_type: &str, payload: &T) {
        match StreamEvent::from_serializable(event_type, payload) {
            Ok(event) => {
                self.broadcaster
                    .broadcast_to_room(&job.room_id, event)
                    .await;
            }
            Err(e) => {
                tracing::error!("Failed to serialize '{}' payload: {}", event_type, e);
            }
        }
    }
}

#[async_trait]
impl CompletionHandler for RoomNotifier {
    async fn on_success(&self, job: &GenerationJob, output: GenerationOutput) {
        let member = &job.member;
        match output {
            GenerationOutput::Text(content) => {
                let payload = AiResponsePayload {
                    member_id: &member.member_id,
                    display_name: &member.display_name,
                    reply_to: job.reply_to.as_deref(),
                    content: &content,
                };
                self.publish(job, AI_RESPONSE_EVENT, &payload).await;
            }
            // 音声本体は保存層の責務なので、ここではメタデータだけを通知する
            GenerationOutput::Audio {
                bytes,
                content_type,
            } => {
                let payload = AiAudioPayload {
                    member_id: &member.member_id,
                    reply_to: job.reply_to.as_deref(),
                    content_type: &content_type,
                    size: bytes.len(),
                };
                self.publish(job, AI_AUDIO_EVENT, &payload).await;
            }
        }
    }

    async fn on_error(&self, job: &GenerationJob, error: GenerationError) {
        let payload = AiErrorPayload {
            member_id: &job.member.member_id,
            display_name: &job.member.display_name,
            error: error.to_string(),
        };
        self.publish(job, AI_ERROR_EVENT, &payload).await;
    }
}
