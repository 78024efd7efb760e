//! シェル（デスクトップ UI）との境界
//!
//! すべての操作は `ShellResponse` を返し、エラーも panic も境界を越えません。

use std::{fmt::Display, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use serde::Serialize;

use crate::{
    cache::SessionCache,
    domain::{AccountInfo, ServerSummary, Session, TaggedServer},
};

/// `{ success, data, error }` 形式の応答
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ShellResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for ShellResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e),
        }
    }
}

/// panic を捕まえて応答に変換する
async fn guarded<T, F>(operation: &str, future: F) -> ShellResponse<T>
where
    F: Future<Output = ShellResponse<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => {
            if let Some(error) = &response.error {
                tracing::warn!("{} failed: {}", operation, error);
            }
            response
        }
        Err(_) => {
            tracing::error!("{} panicked", operation);
            ShellResponse::err(format!("{} failed unexpectedly", operation))
        }
    }
}

/// シェルから呼ばれるコマンド群
#[derive(Clone)]
pub struct ShellCommands {
    cache: Arc<SessionCache>,
}

impl ShellCommands {
    pub fn new(cache: Arc<SessionCache>) -> Self {
        Self { cache }
    }

    pub async fn add_session(&self, account: AccountInfo) -> ShellResponse<Session> {
        guarded("add_session", async {
            ShellResponse::ok(self.cache.add_session(account).await)
        })
        .await
    }

    pub async fn remove_session(&self, session_id: &str) -> ShellResponse<Session> {
        guarded("remove_session", async {
            ShellResponse::from(self.cache.remove_session(session_id).await)
        })
        .await
    }

    pub async fn list_sessions(&self) -> ShellResponse<Vec<Session>> {
        guarded("list_sessions", async {
            ShellResponse::ok(self.cache.list_sessions().await)
        })
        .await
    }

    pub async fn set_active_session(&self, session_id: &str) -> ShellResponse<Session> {
        guarded("set_active_session", async {
            ShellResponse::from(self.cache.set_active_session(session_id).await)
        })
        .await
    }

    /// アクティブなセッションが無い場合も成功で、`data` は `None` になる
    pub async fn get_active_session(&self) -> ShellResponse<Option<Session>> {
        guarded("get_active_session", async {
            ShellResponse::ok(self.cache.active_session().await)
        })
        .await
    }

    pub async fn fetch_servers(&self, session_id: &str) -> ShellResponse<Vec<ServerSummary>> {
        guarded("fetch_servers", async {
            ShellResponse::from(self.cache.fetch_servers_for_session(session_id).await)
        })
        .await
    }

    pub async fn fetch_all_servers(&self) -> ShellResponse<Vec<TaggedServer>> {
        guarded("fetch_all_servers", async {
            ShellResponse::ok(self.cache.fetch_servers_from_all_sessions().await)
        })
        .await
    }

    pub async fn refresh_servers(&self, session_id: &str) -> ShellResponse<Vec<ServerSummary>> {
        guarded("refresh_servers", async {
            ShellResponse::from(self.cache.refresh_servers(session_id).await)
        })
        .await
    }

    pub async fn invalidate_server_cache(&self, session_id: Option<&str>) -> ShellResponse<()> {
        guarded("invalidate_server_cache", async {
            self.cache.invalidate_server_cache(session_id).await;
            ShellResponse::ok(())
        })
        .await
    }

    pub async fn update_display_order(
        &self,
        session_id: &str,
        server_id: &str,
        position: u32,
    ) -> ShellResponse<()> {
        guarded("update_display_order", async {
            ShellResponse::from(
                self.cache
                    .update_display_order(session_id, server_id, position)
                    .await,
            )
        })
        .await
    }
}
