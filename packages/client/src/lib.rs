//! hiroba desktop-side client library.
//!
//! 複数アカウントのセッションと各アカウントのサーバー一覧キャッシュ、
//! シェル（UI）との境界、SSE ストリームの読み出しを提供します。

pub mod api;
pub mod cache;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod shell;
pub mod store;
pub mod stream;

pub use cache::{SERVER_CACHE_TTL_MILLIS, SessionCache};
pub use domain::{AccountInfo, ServerOrigin, ServerSummary, Session, TaggedServer};
pub use error::{ApiError, SessionError, StoreError};
pub use shell::{ShellCommands, ShellResponse};
