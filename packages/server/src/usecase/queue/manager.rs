//! UseCase: AI 生成リクエストの振り分け（QueueManager）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - QueueManager::enqueue() とプロバイダごとのワーカーの振る舞い
//!
//! ### なぜこのテストが必要か
//! - 同一プロバイダ内の FIFO と処理間隔がレート制限対策の前提になっている
//! - 失敗・タイムアウト・panic でキューが止まらないことを保証する
//! - 異なるプロバイダ同士が互いをブロックしないことを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：順番どおりの完了、間隔の確保
//! - 異常系：未登録プロバイダ、キュー溢れ、上流エラー、タイムアウト、panic
//! - エッジケース：遅いプロバイダと速いプロバイダの並行処理

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::domain::{
    GenerationError, GenerationExecutor, GenerationJob, ProviderName, QueueError,
    SharedCompletionHandler,
};

use super::provider_queue::{
    ProviderQueue, ProviderStatus, QueueConfig, QueuedRequest, RejectedRequest,
};

/// プロバイダごとのキューを束ねるマネージャ
///
/// キューへの操作は末尾への追加だけで、処理状態には触れません。
pub struct QueueManager {
    queues: HashMap<ProviderName, ProviderQueue>,
    config: QueueConfig,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    /// プロバイダを登録し、そのワーカーを起動する
    ///
    /// 同名のプロバイダが既にあれば置き換えます（古いワーカーは残りを処理して終了）。
    pub fn register_provider(
        &mut self,
        provider: ProviderName,
        executor: Arc<dyn GenerationExecutor>,
    ) -> &mut Self {
        let queue = ProviderQueue::spawn(provider.clone(), executor, &self.config);
        if self.queues.insert(provider.clone(), queue).is_some() {
            tracing::warn!("Provider '{}' was registered twice, replaced", provider);
        } else {
            tracing::info!("Provider queue '{}' ready", provider);
        }
        self
    }

    /// 登録済みのプロバイダ名（ソート済み）
    pub fn providers(&self) -> Vec<ProviderName> {
        let mut providers: Vec<ProviderName> = self.queues.keys().cloned().collect();
        providers.sort();
        providers
    }

    /// 生成リクエストをプロバイダのキューに追加する
    ///
    /// キューが空いていれば直ちに処理が始まり、そうでなければ順番を待ちます。
    ///
    /// # Errors
    ///
    /// 未登録のプロバイダ、またはキューが溢れている場合は、キューに積まずに
    /// `handler.on_error` を呼んだうえでエラーを返します。
    pub async fn enqueue(
        &self,
        job: GenerationJob,
        handler: SharedCompletionHandler,
    ) -> Result<(), QueueError> {
        let Some(queue) = self.queues.get(&job.provider) else {
            let error = QueueError::UnknownProvider(job.provider.clone());
            tracing::warn!("Rejected request for room '{}': {}", job.room_id, error);
            handler
                .on_error(&job, GenerationError::Queue(error.clone()))
                .await;
            return Err(error);
        };

        let member_id = job.member.member_id.clone();
        match queue.push(QueuedRequest { job, handler }) {
            Ok(()) => {
                tracing::debug!(
                    "Queued request for member '{}' on '{}' ({} waiting)",
                    member_id,
                    queue.provider(),
                    queue.status().queue_length
                );
                Ok(())
            }
            Err(RejectedRequest { error, request }) => {
                tracing::warn!("Rejected request for member '{}': {}", member_id, error);
                request
                    .handler
                    .on_error(&request.job, GenerationError::Queue(error.clone()))
                    .await;
                Err(error)
            }
        }
    }

    /// プロバイダごとの待機数と処理中フラグ（観測用）
    pub fn status(&self) -> BTreeMap<String, ProviderStatus> {
        self.queues
            .iter()
            .map(|(provider, queue)| (provider.to_string(), queue.status()))
            .collect()
    }
}
