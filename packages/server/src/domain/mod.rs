//! ドメイン層
//!
//! 値オブジェクト、イベント、エラー、そして他の層が実装する trait
//! （`EventBroadcaster`, `GenerationExecutor`, `CompletionHandler`）を定義します。

pub mod broadcaster;
pub mod error;
pub mod event;
pub mod generation;
pub mod value_object;

pub use broadcaster::{EventBroadcaster, EventTarget};
pub use error::{DomainError, GenerationError, QueueError, SinkError};
pub use event::StreamEvent;
pub use generation::{
    AiMemberConfig, CompletionHandler, ContextMessage, ConversationContext, GenerationExecutor,
    GenerationJob, GenerationKind, GenerationOutput, SharedCompletionHandler,
};
pub use value_object::{ConnectionId, ProviderName, RoomId, UserId};

#[cfg(test)]
pub use broadcaster::MockEventBroadcaster;
#[cfg(test)]
pub use generation::MockGenerationExecutor;
