//! UseCase 層

pub mod broadcast;
pub mod notify;
pub mod queue;
pub mod subscription;

pub use broadcast::BroadcastRouter;
pub use notify::RoomNotifier;
pub use queue::{ProviderStatus, QueueConfig, QueueManager};
pub use subscription::{OpenedStream, SubscriptionUseCase};
