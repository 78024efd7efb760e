//! プロバイダ単位の AI 生成キュー

mod manager;
mod provider_queue;

pub use manager::QueueManager;
pub use provider_queue::{
    DEFAULT_MAX_QUEUE_LENGTH, DEFAULT_REQUEST_DELAY, DEFAULT_REQUEST_TIMEOUT, ProviderQueue,
    ProviderStatus, QueueConfig, QueuedRequest, RejectedRequest,
};
