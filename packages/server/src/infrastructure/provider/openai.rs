//! OpenAI 互換 API を使った GenerationExecutor 実装
//!
//! `/chat/completions` でテキスト応答を、`/audio/speech` で音声を生成します。
//! 多くのベンダーが同じ形式のエンドポイントを提供しているので、
//! プロバイダごとに `base_url` を変えて使い回します。

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AiMemberConfig, ConversationContext, GenerationError, GenerationExecutor, GenerationJob,
    GenerationKind, GenerationOutput,
};

const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
const MAX_ERROR_BODY_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// OpenAI 互換 API の executor
pub struct OpenAiCompatibleExecutor {
    client: Client,
    base_url: String,
}

impl OpenAiCompatibleExecutor {
    /// # Arguments
    ///
    /// * `client` - 共有の HTTP クライアント（タイムアウト等は呼び出し側で設定）
    /// * `base_url` - 例: `https://api.openai.com/v1`
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, member: &AiMemberConfig, path: &str) -> String {
        let base = member
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(&self.base_url);
        format!("{}{}", base, path)
    }

    async fn complete(&self, job: &GenerationJob) -> Result<GenerationOutput, GenerationError> {
        let member = &job.member;
        let request = ChatCompletionRequest {
            model: &member.model,
            messages: build_messages(member, &job.context),
            temperature: member.temperature,
            max_tokens: member.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint(member, "/chat/completions"))
            .bearer_auth(&member.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        let response = ensure_success(response).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| GenerationOutput::Text(content.trim().to_string()))
            .ok_or_else(|| GenerationError::InvalidResponse("no completion choices".to_string()))
    }

    async fn synthesize(
        &self,
        job: &GenerationJob,
        voice: &str,
        input: &str,
    ) -> Result<GenerationOutput, GenerationError> {
        let member = &job.member;
        let request = SpeechRequest {
            model: &member.model,
            voice,
            input,
        };

        let response = self
            .client
            .post(self.endpoint(member, "/audio/speech"))
            .bearer_auth(&member.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        if bytes.is_empty() {
            return Err(GenerationError::InvalidResponse(
                "empty audio body".to_string(),
            ));
        }

        Ok(GenerationOutput::Audio {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[async_trait]
impl GenerationExecutor for OpenAiCompatibleExecutor {
    async fn execute(&self, job: &GenerationJob) -> Result<GenerationOutput, GenerationError> {
        match &job.kind {
            GenerationKind::Text => self.complete(job).await,
            GenerationKind::Speech { voice, input } => self.synthesize(job, voice, input).await,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(GenerationError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// チャット補完に渡すメッセージ列を組み立てる
///
/// 順序: システムプロンプト → サマリー → 直近のメッセージ（古い順）。
/// 他の参加者の発言は誰の発言か分かるよう `author: content` の形にします。
pub(crate) fn build_messages(
    member: &AiMemberConfig,
    context: &ConversationContext,
) -> Vec<ChatMessage> {
    let system_prompt = member.system_prompt.clone().unwrap_or_else(|| {
        format!(
            "You are {}, a participant in a group chat. Reply concisely.",
            member.display_name
        )
    });

    let mut messages = vec![ChatMessage {
        role: "system",
        content: system_prompt,
    }];

    if let Some(summary) = context.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage {
            role: "system",
            content: format!("Summary of the earlier conversation: {}", summary),
        });
    }

    messages.extend(context.recent_messages.iter().map(|message| {
        if message.from_self {
            ChatMessage {
                role: "assistant",
                content: message.content.clone(),
            }
        } else {
            ChatMessage {
                role: "user",
                content: format!("{}: {}", message.author, message.content),
            }
        }
    }));

    messages
}
