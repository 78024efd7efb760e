//! SSE ストリームの読み出し

use std::collections::VecDeque;

use hiroba_shared::sse::{SseDecoder, SseFrame};
use reqwest::Client;

use crate::error::ApiError;

/// イベントサーバーへの接続を開くクライアント
#[derive(Clone)]
pub struct EventStreamClient {
    client: Client,
    base_url: String,
}

impl EventStreamClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// ルームを購読する接続を開く
    pub async fn open_room(&self, room_id: &str, user_id: &str) -> Result<EventStream, ApiError> {
        self.open(&format!("{}/api/events/rooms/{}", self.base_url, room_id), user_id)
            .await
    }

    /// ルームを購読しない（ユーザー宛てと全体宛てのみの）接続を開く
    pub async fn open_global(&self, user_id: &str) -> Result<EventStream, ApiError> {
        self.open(&format!("{}/api/events", self.base_url), user_id)
            .await
    }

    async fn open(&self, url: &str, user_id: &str) -> Result<EventStream, ApiError> {
        let response = self
            .client
            .get(url)
            .query(&[("user_id", user_id)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!("Event stream opened: {}", url);
        Ok(EventStream::new(response))
    }
}

/// 開いた SSE ストリーム
pub struct EventStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    /// UTF-8 の途中で切れたチャンクの残り
    partial: Vec<u8>,
}

impl EventStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            partial: Vec::new(),
        }
    }

    /// 接続 ID（サーバーが `x-connection-id` ヘッダで返した場合）
    pub fn connection_id(&self) -> Option<&str> {
        self.response
            .headers()
            .get("x-connection-id")
            .and_then(|value| value.to_str().ok())
    }

    /// 次のフレームを返す。ストリームが終わったら `None`
    pub async fn next_frame(&mut self) -> Result<Option<SseFrame>, ApiError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            let Some(chunk) = self.response.chunk().await? else {
                return Ok(None);
            };
            self.partial.extend_from_slice(&chunk);
            let text = self.take_decodable();
            self.pending.extend(self.decoder.push(&text));
        }
    }

    /// `partial` から文字列にできる部分を取り出す
    ///
    /// 不正なバイト列は U+FFFD に置き換え、末尾の不完全な文字だけを次のチャンクまで残します。
    fn take_decodable(&mut self) -> String {
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.partial) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.partial.clear();
                    return text;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.partial[..valid_up_to]));
                    match e.error_len() {
                        Some(invalid_len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.partial.drain(..valid_up_to + invalid_len);
                        }
                        None => {
                            self.partial.drain(..valid_up_to);
                            return text;
                        }
                    }
                }
            }
        }
    }
}
