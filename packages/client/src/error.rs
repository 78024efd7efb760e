//! Error types for the hiroba client.

use thiserror::Error;

/// サーバー API 呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 通信エラー
    #[error("request failed: {0}")]
    Http(String),

    /// エラーステータス
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// レスポンスを解釈できない
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// 表示順の保存・読み込みの失敗
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access order file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse order file: {0}")]
    Serde(#[from] serde_json::Error),
}

/// セッション操作の失敗
#[derive(Debug, Error)]
pub enum SessionError {
    /// 指定されたセッションが存在しない
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
