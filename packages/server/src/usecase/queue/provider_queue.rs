//! プロバイダ単位のリクエストキュー
//!
//! 1 プロバイダにつき 1 つのワーカータスクが bounded channel から
//! リクエストを取り出して順番に処理します。同時に処理中になるのは
//! 常に高々 1 件で、完了後は次の取り出しまで一定時間待ちます（レート制限対策）。

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::{
    GenerationError, GenerationExecutor, GenerationJob, GenerationOutput, ProviderName,
    QueueError, SharedCompletionHandler,
};

/// 既定の処理間隔
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(500);
/// 既定のキュー上限
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 100;
/// 既定のタイムアウト
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// キューの設定
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// 1 件の処理完了から次の処理開始までの待ち時間
    pub request_delay: Duration,
    /// 待機中リクエストの上限（処理中の 1 件は含まない）
    pub max_queue_length: usize,
    /// 1 件の実行にかけられる最大時間
    pub request_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// キューの状態（観測用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub queue_length: usize,
    pub processing: bool,
}

/// キューに積まれた 1 件
pub struct QueuedRequest {
    pub job: GenerationJob,
    pub handler: SharedCompletionHandler,
}

/// キューに追加できなかったリクエスト
pub struct RejectedRequest {
    pub error: QueueError,
    pub request: QueuedRequest,
}

#[derive(Default)]
struct QueueState {
    pending: AtomicUsize,
    processing: AtomicBool,
}

/// プロバイダ単位のキュー
///
/// 待機リストと処理中フラグはワーカーだけが進めます。
/// 外部からできるのは末尾への追加と状態の参照だけです。
pub struct ProviderQueue {
    provider: ProviderName,
    sender: mpsc::Sender<QueuedRequest>,
    state: Arc<QueueState>,
    capacity: usize,
}

impl ProviderQueue {
    /// キューを作成し、ワーカータスクを起動する
    ///
    /// tokio ランタイム上で呼び出す必要があります。
    /// ワーカーは `ProviderQueue` が drop されると残りを処理して終了します。
    pub fn spawn(
        provider: ProviderName,
        executor: Arc<dyn GenerationExecutor>,
        config: &QueueConfig,
    ) -> Self {
        let capacity = config.max_queue_length.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let state = Arc::new(QueueState::default());

        tokio::spawn(run_worker(
            provider.clone(),
            receiver,
            executor,
            state.clone(),
            config.clone(),
        ));

        Self {
            provider,
            sender,
            state,
            capacity,
        }
    }

    pub fn provider(&self) -> &ProviderName {
        &self.provider
    }

    /// 末尾に追加する
    ///
    /// 追加できなかった場合はリクエストをそのまま返します。
    ///
    /// # Errors
    ///
    /// * `QueueError::QueueFull` - 待機中が上限に達している
    /// * `QueueError::WorkerStopped` - ワーカーが終了している
    pub fn push(&self, request: QueuedRequest) -> Result<(), RejectedRequest> {
        // ワーカーが取り出すより先に数えておく
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state.pending.fetch_sub(1, Ordering::SeqCst);
                Err(match e {
                    TrySendError::Full(request) => RejectedRequest {
                        error: QueueError::QueueFull {
                            provider: self.provider.clone(),
                            capacity: self.capacity,
                        },
                        request,
                    },
                    TrySendError::Closed(request) => RejectedRequest {
                        error: QueueError::WorkerStopped(self.provider.clone()),
                        request,
                    },
                })
            }
        }
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            queue_length: self.state.pending.load(Ordering::SeqCst),
            processing: self.state.processing.load(Ordering::SeqCst),
        }
    }
}

async fn run_worker(
    provider: ProviderName,
    mut receiver: mpsc::Receiver<QueuedRequest>,
    executor: Arc<dyn GenerationExecutor>,
    state: Arc<QueueState>,
    config: QueueConfig,
) {
    tracing::debug!("Worker for provider '{}' started", provider);

    while let Some(request) = receiver.recv().await {
        state.pending.fetch_sub(1, Ordering::SeqCst);
        state.processing.store(true, Ordering::SeqCst);

        process_one(executor.as_ref(), request, config.request_timeout).await;

        state.processing.store(false, Ordering::SeqCst);
        tokio::time::sleep(config.request_delay).await;
    }

    tracing::debug!("Worker for provider '{}' stopped", provider);
}

/// 1 件を実行し、結果をハンドラに通知する
///
/// executor の失敗・タイムアウト・panic はすべて `on_error` に変換され、
/// ワーカーは次のリクエストへ進みます。
async fn process_one(
    executor: &dyn GenerationExecutor,
    request: QueuedRequest,
    timeout: Duration,
) {
    let QueuedRequest { job, handler } = request;

    match execute_guarded(executor, &job, timeout).await {
        Ok(output) => {
            tracing::info!(
                "Generation for member '{}' in room '{}' via '{}' succeeded",
                job.member.member_id,
                job.room_id,
                job.provider
            );
            handler.on_success(&job, output).await;
        }
        Err(error) => {
            tracing::error!(
                "Generation for member '{}' in room '{}' via '{}' failed: {}",
                job.member.member_id,
                job.room_id,
                job.provider,
                error
            );
            handler.on_error(&job, error).await;
        }
    }
}

async fn execute_guarded(
    executor: &dyn GenerationExecutor,
    job: &GenerationJob,
    timeout: Duration,
) -> Result<GenerationOutput, GenerationError> {
    let call = AssertUnwindSafe(executor.execute(job)).catch_unwind();
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(_panic)) => Err(GenerationError::Internal(
            "executor panicked".to_string(),
        )),
        Err(_elapsed) => Err(GenerationError::Timeout(timeout)),
    }
}
