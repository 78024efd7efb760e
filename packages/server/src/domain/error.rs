//! ドメイン層のエラー型

use std::time::Duration;

use thiserror::Error;

use super::value_object::ProviderName;

/// 値オブジェクトの生成に失敗した
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),
}

/// 接続のシンクへの書き込みに失敗した（クライアント切断など）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("connection sink is closed")]
    Closed,
}

/// キューへの投入・処理に関するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// 登録されていないプロバイダが指定された
    #[error("unknown provider '{0}'")]
    UnknownProvider(ProviderName),

    /// キューの上限に達している
    #[error("queue for provider '{provider}' is full ({capacity} pending)")]
    QueueFull {
        provider: ProviderName,
        capacity: usize,
    },

    /// ワーカータスクが停止している
    #[error("worker for provider '{0}' has stopped")]
    WorkerStopped(ProviderName),
}

/// 上流プロバイダ呼び出しの失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// 投入前に拒否された
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// 通信エラー
    #[error("request to provider failed: {0}")]
    Http(String),

    /// プロバイダがエラーステータスを返した
    #[error("provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// タイムアウト
    #[error("provider did not respond within {0:?}")]
    Timeout(Duration),

    /// レスポンスが想定した形式ではない
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    /// executor 内部の異常（panic など）
    #[error("internal executor failure: {0}")]
    Internal(String),
}
