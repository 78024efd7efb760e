//! AI 生成リクエストのドメインモデル
//!
//! キューに積まれるのはクロージャではなく [`GenerationJob`] という値です。
//! 実際の上流呼び出しはプロバイダごとの [`GenerationExecutor`] が行い、
//! 結果は [`CompletionHandler`] に通知されます。

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationError, ProviderName, RoomId};

/// AI メンバーの設定
///
/// `api_key` は暗号化層で復号済みのものを受け取ります。
#[derive(Clone, Serialize, Deserialize)]
pub struct AiMemberConfig {
    pub member_id: String,
    pub display_name: String,
    pub provider: ProviderName,
    pub model: String,
    pub api_key: String,
    /// プロバイダ既定のエンドポイントを上書きする場合に指定
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

// api_key をログに出さない
impl fmt::Debug for AiMemberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiMemberConfig")
            .field("member_id", &self.member_id)
            .field("display_name", &self.display_name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// 会話コンテキスト中の 1 メッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub author: String,
    pub content: String,
    /// AI メンバー自身の発言かどうか
    #[serde(default)]
    pub from_self: bool,
}

/// 直近のメッセージと、任意のローリングサマリー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub recent_messages: Vec<ContextMessage>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// 生成の種類
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationKind {
    /// テキスト応答（チャット補完）
    #[default]
    Text,
    /// 音声合成
    Speech { voice: String, input: String },
}

/// 生成結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    Text(String),
    Audio { bytes: Vec<u8>, content_type: String },
}

/// キューに積まれる 1 件のリクエスト
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub provider: ProviderName,
    pub room_id: RoomId,
    pub member: AiMemberConfig,
    pub context: ConversationContext,
    pub kind: GenerationKind,
    /// 返信先メッセージ ID
    pub reply_to: Option<String>,
}

/// プロバイダへの実際の呼び出しを行う trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationExecutor: Send + Sync {
    async fn execute(&self, job: &GenerationJob) -> Result<GenerationOutput, GenerationError>;
}

/// 生成完了の通知先
///
/// 永続化と BroadcastRouter への通知は呼び出し側（メッセージ処理層）の責務です。
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn on_success(&self, job: &GenerationJob, output: GenerationOutput);

    async fn on_error(&self, job: &GenerationJob, error: GenerationError);
}

pub type SharedCompletionHandler = Arc<dyn CompletionHandler>;
