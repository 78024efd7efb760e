//! 複数アカウントのセッションとサーバー一覧キャッシュ
//!
//! ## 責務
//!
//! - セッションの追加・削除・切り替え（アクティブなセッションは常に高々 1 つ）
//! - セッションごとのサーバー一覧の取得と TTL 付きキャッシュ
//! - 全セッション横断の一覧取得（失敗したセッションは省いて続行）
//! - ローカルの表示順の適用と保存
//!
//! ## 設計ノート
//!
//! ネットワーク呼び出しの間はロックを保持しません。同じセッションへの
//! 同時取得はそれぞれ API を呼び、後から書き込んだ結果が残ります。
//! 取得中にそのセッションの無効化が起きた場合、その取得結果はキャッシュに保存しません。
//!
//! 表示順はセッション ID ではなくアカウントのキー（ユーザー + エンドポイント）で
//! 保存するため、再起動後の同じアカウントにも適用されます。

use std::{collections::HashMap, sync::Arc};

use futures_util::future::join_all;
use hiroba_shared::time::Clock;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    api::ServerApi,
    domain::{AccountInfo, ServerSummary, Session, TaggedServer, apply_display_order},
    error::SessionError,
    store::DisplayOrderStore,
};

/// サーバー一覧キャッシュの有効期間（5 分）
pub const SERVER_CACHE_TTL_MILLIS: i64 = 5 * 60 * 1000;

struct CacheEntry {
    servers: Vec<ServerSummary>,
    fetched_at: i64,
}

#[derive(Default)]
struct CacheState {
    /// 追加順
    sessions: Vec<Session>,
    entries: HashMap<String, CacheEntry>,
    /// セッションごとに、無効化のたびに進むカウンタ
    epochs: HashMap<String, u64>,
}

impl CacheState {
    fn find(&self, session_id: &str) -> Result<&Session, SessionError> {
        self.sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    fn epoch_of(&self, session_id: &str) -> u64 {
        self.epochs.get(session_id).copied().unwrap_or_default()
    }

    fn invalidate(&mut self, session_id: Option<&str>) {
        match session_id {
            Some(id) => {
                *self.epochs.entry(id.to_string()).or_default() += 1;
                self.entries.remove(id);
            }
            None => {
                for session in &self.sessions {
                    *self.epochs.entry(session.id.clone()).or_default() += 1;
                }
                self.entries.clear();
            }
        }
    }
}

/// セッションキャッシュ
pub struct SessionCache {
    state: Mutex<CacheState>,
    api: Arc<dyn ServerApi>,
    order_store: Arc<dyn DisplayOrderStore>,
    clock: Arc<dyn Clock>,
    ttl_millis: i64,
}

impl SessionCache {
    pub fn new(
        api: Arc<dyn ServerApi>,
        order_store: Arc<dyn DisplayOrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            api,
            order_store,
            clock,
            ttl_millis: SERVER_CACHE_TTL_MILLIS,
        }
    }

    /// TTL を変更する
    pub fn with_ttl_millis(mut self, ttl_millis: i64) -> Self {
        self.ttl_millis = ttl_millis;
        self
    }

    /// セッションを追加する
    ///
    /// 同じアカウント（ユーザー + エンドポイント）が既にあれば資格情報を更新して返します。
    /// アクティブなセッションが無ければ、追加したセッションがアクティブになります。
    pub async fn add_session(&self, account: AccountInfo) -> Session {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .sessions
            .iter_mut()
            .find(|s| s.is_same_account(&account))
        {
            existing.username = account.username;
            existing.token = account.token;
            tracing::info!("Session '{}' updated", existing.id);
            return existing.clone();
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: account.user_id,
            username: account.username,
            token: account.token,
            api_base_url: account.api_base_url,
            is_active: !state.sessions.iter().any(|s| s.is_active),
            created_at: now,
        };
        tracing::info!(
            "Session '{}' added for '{}' at {}",
            session.id,
            session.username,
            session.api_base_url
        );
        state.sessions.push(session.clone());
        session
    }

    /// セッションをアクティブにし、他をすべて非アクティブにする
    ///
    /// # Errors
    ///
    /// 存在しない ID の場合は何も変更せずに `SessionError::NotFound` を返します。
    pub async fn set_active_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut state = self.state.lock().await;
        let activated = state.find(session_id)?.clone();

        for session in state.sessions.iter_mut() {
            session.is_active = session.id == session_id;
        }
        tracing::info!("Session '{}' is now active", session_id);
        Ok(Session {
            is_active: true,
            ..activated
        })
    }

    /// セッションとそのキャッシュを削除する
    ///
    /// アクティブなセッションを削除した場合は、残りの先頭（最も古い）を
    /// アクティブにします。保存済みの表示順も削除します。
    pub async fn remove_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let removed = {
            let mut state = self.state.lock().await;
            let index = state
                .sessions
                .iter()
                .position(|s| s.id == session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            let removed = state.sessions.remove(index);
            state.entries.remove(session_id);
            state.epochs.remove(session_id);

            if removed.is_active
                && let Some(next) = state.sessions.first_mut()
            {
                next.is_active = true;
                tracing::info!("Session '{}' promoted to active", next.id);
            }
            removed
        };

        if let Err(e) = self.order_store.clear_session(&removed.account_key()).await {
            tracing::warn!(
                "Failed to clear display order of session '{}': {}",
                session_id,
                e
            );
        }
        tracing::info!("Session '{}' removed", session_id);
        Ok(removed)
    }

    /// すべてのセッション（追加順）
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    /// アクティブなセッション
    pub async fn active_session(&self) -> Option<Session> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .find(|s| s.is_active)
            .cloned()
    }

    /// セッションのサーバー一覧を取得する
    ///
    /// キャッシュが TTL 内であればそれを返し、そうでなければ API から取得して
    /// 表示順を適用し、キャッシュします。
    ///
    /// # Errors
    ///
    /// * `SessionError::NotFound` - 存在しないセッション
    /// * `SessionError::Api` - 取得に失敗した
    pub async fn fetch_servers_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ServerSummary>, SessionError> {
        let (session, epoch) = {
            let state = self.state.lock().await;
            let session = state.find(session_id)?.clone();
            if let Some(entry) = state.entries.get(session_id)
                && self.clock.now_millis() - entry.fetched_at < self.ttl_millis
            {
                tracing::debug!("Server list cache hit for session '{}'", session_id);
                return Ok(entry.servers.clone());
            }
            (session, state.epoch_of(session_id))
        };

        tracing::debug!(
            "Fetching server list for session '{}' from {}",
            session.id,
            session.api_base_url
        );
        let fetched = self
            .api
            .fetch_servers(&session.api_base_url, &session.token)
            .await?;

        let overrides = match self.order_store.load(&session.account_key()).await {
            Ok(overrides) => overrides,
            Err(e) => {
                tracing::warn!(
                    "Failed to load display order of session '{}': {}",
                    session.id,
                    e
                );
                HashMap::new()
            }
        };
        let servers = apply_display_order(fetched, &overrides);

        let mut state = self.state.lock().await;
        if state.find(&session.id).is_ok() && state.epoch_of(&session.id) == epoch {
            state.entries.insert(
                session.id.clone(),
                CacheEntry {
                    servers: servers.clone(),
                    fetched_at: self.clock.now_millis(),
                },
            );
        }
        Ok(servers)
    }

    /// 全セッションのサーバー一覧を取得し、取得元のタグを付けて連結する
    ///
    /// 取得に失敗したセッションはログに残して省きます。
    pub async fn fetch_servers_from_all_sessions(&self) -> Vec<TaggedServer> {
        let sessions = self.list_sessions().await;
        let results = join_all(
            sessions
                .iter()
                .map(|session| self.fetch_servers_for_session(&session.id)),
        )
        .await;

        sessions
            .iter()
            .zip(results)
            .flat_map(|(session, result)| match result {
                Ok(servers) => servers
                    .into_iter()
                    .map(|server| TaggedServer {
                        server,
                        origin: session.origin(),
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        "Omitting servers of session '{}' ({}): {}",
                        session.id,
                        session.api_base_url,
                        e
                    );
                    Vec::new()
                }
            })
            .collect()
    }

    /// キャッシュを破棄する。`None` なら全セッション分
    pub async fn invalidate_server_cache(&self, session_id: Option<&str>) {
        self.state.lock().await.invalidate(session_id);
        tracing::debug!(
            "Server list cache invalidated ({})",
            session_id.unwrap_or("all sessions")
        );
    }

    /// キャッシュを破棄してから取得し直す
    pub async fn refresh_servers(
        &self,
        session_id: &str,
    ) -> Result<Vec<ServerSummary>, SessionError> {
        self.invalidate_server_cache(Some(session_id)).await;
        self.fetch_servers_for_session(session_id).await
    }

    /// サーバーの表示位置を保存し、そのセッションのキャッシュを破棄する
    pub async fn update_display_order(
        &self,
        session_id: &str,
        server_id: &str,
        position: u32,
    ) -> Result<(), SessionError> {
        let account_key = self.state.lock().await.find(session_id)?.account_key();
        self.order_store
            .save_position(&account_key, server_id, position)
            .await?;
        self.invalidate_server_cache(Some(session_id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::MockServerApi,
        error::ApiError,
        store::{InMemoryOrderStore, JsonFileOrderStore, MockDisplayOrderStore},
    };
    use hiroba_shared::time::ManualClock;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::Notify;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - アクティブなセッションが常に高々 1 つであること
    // - TTL と明示的な無効化によるキャッシュの更新
    // - 全セッション横断の取得で失敗したセッションだけが省かれること
    // - 表示順の保存と反映
    // ========================================

    const T0: i64 = 1_700_000_000_000;

    fn account(user_id: &str, base: &str) -> AccountInfo {
        AccountInfo {
            user_id: user_id.to_string(),
            username: format!("{}-name", user_id),
            token: format!("{}-token", user_id),
            api_base_url: base.to_string(),
        }
    }

    fn server(id: &str) -> ServerSummary {
        ServerSummary {
            id: id.to_string(),
            name: id.to_uppercase(),
            icon_url: None,
        }
    }

    fn ids(servers: &[ServerSummary]) -> Vec<&str> {
        servers.iter().map(|s| s.id.as_str()).collect()
    }

    fn cache_with(api: MockServerApi, clock: Arc<ManualClock>) -> SessionCache {
        SessionCache::new(Arc::new(api), Arc::new(InMemoryOrderStore::new()), clock)
    }

    fn idle_cache() -> SessionCache {
        cache_with(MockServerApi::new(), Arc::new(ManualClock::new(T0)))
    }

    fn active_count(sessions: &[Session]) -> usize {
        sessions.iter().filter(|s| s.is_active).count()
    }

    #[tokio::test]
    async fn test_first_session_becomes_active() {
        // テスト項目: 最初に追加したセッションだけがアクティブになる
        // given (前提条件):
        let cache = idle_cache();

        // when (操作):
        let first = cache.add_session(account("u1", "https://a.example")).await;
        let second = cache.add_session(account("u2", "https://b.example")).await;

        // then (期待する結果):
        assert!(first.is_active);
        assert!(!second.is_active);
        assert_eq!(cache.active_session().await.unwrap().id, first.id);
        assert_eq!(first.created_at, T0);
    }

    #[tokio::test]
    async fn test_add_session_upserts_same_account() {
        // テスト項目: 同じユーザー + エンドポイントの追加は既存セッションを更新する
        // given (前提条件):
        let cache = idle_cache();
        let original = cache.add_session(account("u1", "https://a.example")).await;

        // when (操作):
        let mut renewed = account("u1", "https://a.example");
        renewed.token = "new-token".to_string();
        let updated = cache.add_session(renewed).await;
        let other_endpoint = cache.add_session(account("u1", "https://b.example")).await;

        // then (期待する結果):
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.token, "new-token");
        assert!(updated.is_active);
        assert_ne!(other_endpoint.id, original.id);
        assert_eq!(cache.list_sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_active_session() {
        // テスト項目: 指定したセッションだけがアクティブになり、未知の ID は NotFound で何も変わらない
        // given (前提条件):
        let cache = idle_cache();
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let s2 = cache.add_session(account("u2", "https://b.example")).await;

        // when (操作):
        let activated = cache.set_active_session(&s2.id).await.unwrap();
        let unknown = cache.set_active_session("nope").await;

        // then (期待する結果):
        assert!(activated.is_active);
        assert!(matches!(unknown, Err(SessionError::NotFound(id)) if id == "nope"));
        let sessions = cache.list_sessions().await;
        assert_eq!(active_count(&sessions), 1);
        assert_eq!(cache.active_session().await.unwrap().id, s2.id);
        assert!(!sessions.iter().find(|s| s.id == s1.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_removing_active_session_promotes_another() {
        // テスト項目: 3 つ中アクティブを削除すると残り 2 つのうち 1 つがアクティブになり、
        //            最後の 1 つを削除するとアクティブは無くなる
        // given (前提条件):
        let cache = idle_cache();
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let s2 = cache.add_session(account("u2", "https://b.example")).await;
        let s3 = cache.add_session(account("u3", "https://c.example")).await;

        // when (操作):
        cache.remove_session(&s1.id).await.unwrap();

        // then (期待する結果):
        let sessions = cache.list_sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(active_count(&sessions), 1);

        // when (操作):
        cache.remove_session(&s2.id).await.unwrap();
        cache.remove_session(&s3.id).await.unwrap();

        // then (期待する結果):
        assert!(cache.list_sessions().await.is_empty());
        assert!(cache.active_session().await.is_none());
        assert!(matches!(
            cache.remove_session(&s3.id).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_removing_inactive_session_keeps_active() {
        // テスト項目: 非アクティブなセッションの削除ではアクティブは変わらない
        // given (前提条件):
        let cache = idle_cache();
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let s2 = cache.add_session(account("u2", "https://b.example")).await;

        // when (操作):
        cache.remove_session(&s2.id).await.unwrap();

        // then (期待する結果):
        assert_eq!(cache.active_session().await.unwrap().id, s1.id);
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        // テスト項目: TTL 内の読み出しはキャッシュを返し、TTL を過ぎると再取得する
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers()
            .times(2)
            .returning(|_, _| Ok(vec![server("x"), server("y")]));
        let cache = cache_with(api, clock.clone());
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // when (操作): t0 + TTL - 1s
        clock.advance(SERVER_CACHE_TTL_MILLIS - 1_000);
        let cached = cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // then (期待する結果): ネットワーク呼び出しは 1 回のまま
        assert_eq!(ids(&cached), vec!["x", "y"]);

        // when (操作): t0 + TTL + 1s
        clock.advance(2_000);
        let refreshed = cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // then (期待する結果): 2 回目の取得（times(2) で検証）
        assert_eq!(ids(&refreshed), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_invalidation_forces_refetch() {
        // テスト項目: 無効化後の読み出しは経過時間に関わらず再取得する
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers()
            .times(3)
            .returning(|_, _| Ok(vec![server("x")]));
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // when (操作):
        cache.invalidate_server_cache(Some(&s1.id)).await;
        cache.fetch_servers_for_session(&s1.id).await.unwrap();
        cache.invalidate_server_cache(None).await;
        cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // then (期待する結果): times(3) で検証
    }

    #[tokio::test]
    async fn test_refresh_servers_bypasses_cache() {
        // テスト項目: refresh_servers は TTL 内でも再取得する
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers()
            .times(2)
            .returning(|_, _| Ok(vec![server("x")]));
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // when (操作):
        let refreshed = cache.refresh_servers(&s1.id).await.unwrap();

        // then (期待する結果):
        assert_eq!(ids(&refreshed), vec!["x"]);
    }

    #[tokio::test]
    async fn test_single_session_fetch_failure_propagates() {
        // テスト項目: 単一セッションの取得失敗は呼び出し元に返り、キャッシュされない
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers().times(2).returning(|_, _| {
            Err(ApiError::Status {
                status: 500,
                body: "down".to_string(),
            })
        });
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://a.example")).await;

        // when (操作):
        let first = cache.fetch_servers_for_session(&s1.id).await;
        let second = cache.fetch_servers_for_session(&s1.id).await;

        // then (期待する結果):
        assert!(matches!(
            first,
            Err(SessionError::Api(ApiError::Status { status: 500, .. }))
        ));
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_fetch_for_unknown_session_is_not_found() {
        // テスト項目: 存在しないセッションの取得は NotFound（API は呼ばれない）
        // given (前提条件):
        let cache = idle_cache();

        // when (操作):
        let result = cache.fetch_servers_for_session("nope").await;

        // then (期待する結果):
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_all_sessions_omits_failed_session() {
        // テスト項目: S1 が [X, Y]、S2 が失敗のとき、S1 のタグ付きで [X, Y] だけが返る
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers().returning(|base, _| {
            if base.starts_with("https://s1") {
                Ok(vec![server("x"), server("y")])
            } else {
                Err(ApiError::Http("connection refused".to_string()))
            }
        });
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://s1.example")).await;
        cache.add_session(account("u2", "https://s2.example")).await;

        // when (操作):
        let servers = cache.fetch_servers_from_all_sessions().await;

        // then (期待する結果):
        let server_ids: Vec<&str> = servers.iter().map(|t| t.server.id.as_str()).collect();
        assert_eq!(server_ids, vec!["x", "y"]);
        for tagged in &servers {
            assert_eq!(tagged.origin.session_id, s1.id);
            assert_eq!(tagged.origin.user_id, "u1");
            assert_eq!(tagged.origin.token, "u1-token");
            assert_eq!(tagged.origin.api_base_url, "https://s1.example");
        }
    }

    #[tokio::test]
    async fn test_fetch_all_sessions_concatenates_in_session_order() {
        // テスト項目: 全セッションの結果が追加順に連結され、それぞれのセッションでタグ付けされる
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers().returning(|base, _| {
            if base.starts_with("https://s1") {
                Ok(vec![server("x")])
            } else {
                Ok(vec![server("z")])
            }
        });
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://s1.example")).await;
        let s2 = cache.add_session(account("u2", "https://s2.example")).await;

        // when (操作):
        let servers = cache.fetch_servers_from_all_sessions().await;

        // then (期待する結果):
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].server.id, "x");
        assert_eq!(servers[0].origin.session_id, s1.id);
        assert_eq!(servers[1].server.id, "z");
        assert_eq!(servers[1].origin.session_id, s2.id);
    }

    #[tokio::test]
    async fn test_update_display_order_is_reflected_on_next_fetch() {
        // テスト項目: 表示順を保存すると次の取得に反映される（キャッシュは破棄される）
        // given (前提条件):
        let clock = Arc::new(ManualClock::new(T0));
        let mut api = MockServerApi::new();
        api.expect_fetch_servers()
            .times(2)
            .returning(|_, _| Ok(vec![server("a"), server("b"), server("c")]));
        let cache = cache_with(api, clock);
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let before = cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // when (操作):
        cache.update_display_order(&s1.id, "c", 0).await.unwrap();
        let after = cache.fetch_servers_for_session(&s1.id).await.unwrap();

        // then (期待する結果):
        assert_eq!(ids(&before), vec!["a", "b", "c"]);
        assert_eq!(ids(&after), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_update_display_order_for_unknown_session() {
        // テスト項目: 存在しないセッションへの表示順保存は NotFound で、保存先は呼ばれない
        // given (前提条件):
        let mut store = MockDisplayOrderStore::new();
        store.expect_save_position().never();
        let cache = SessionCache::new(
            Arc::new(MockServerApi::new()),
            Arc::new(store),
            Arc::new(ManualClock::new(T0)),
        );

        // when (操作):
        let result = cache.update_display_order("nope", "x", 0).await;

        // then (期待する結果):
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_session_clears_display_order() {
        // テスト項目: セッション削除で保存済みの表示順も削除される
        // given (前提条件):
        let mut store = MockDisplayOrderStore::new();
        store
            .expect_clear_session()
            .withf(|account_key| account_key.to_string() == "u1@https://a.example")
            .times(1)
            .returning(|_| Ok(()));
        let cache = SessionCache::new(
            Arc::new(MockServerApi::new()),
            Arc::new(store),
            Arc::new(ManualClock::new(T0)),
        );
        let s1 = cache.add_session(account("u1", "https://a.example")).await;

        // when (操作):
        let removed = cache.remove_session(&s1.id).await.unwrap();

        // then (期待する結果):
        assert_eq!(removed.id, s1.id);
    }

    #[tokio::test]
    async fn test_display_order_survives_restart() {
        // テスト項目: 保存した表示順は、同じファイルを使う別のキャッシュ（再起動後）の同じアカウントにも適用される
        // given (前提条件):
        let dir = std::env::temp_dir().join(format!("hiroba-test-{}", Uuid::new_v4()));
        let path = dir.join("order.json");
        let new_cache = || {
            let mut api = MockServerApi::new();
            api.expect_fetch_servers()
                .returning(|_, _| Ok(vec![server("a"), server("b"), server("c")]));
            SessionCache::new(
                Arc::new(api),
                Arc::new(JsonFileOrderStore::new(&path)),
                Arc::new(ManualClock::new(T0)),
            )
        };
        let first_run = new_cache();
        let s1 = first_run.add_session(account("u1", "https://a.example")).await;
        first_run.update_display_order(&s1.id, "c", 0).await.unwrap();

        // when (操作):
        let second_run = new_cache();
        let s1_again = second_run.add_session(account("u1", "https://a.example")).await;
        let servers = second_run.fetch_servers_for_session(&s1_again.id).await.unwrap();

        // then (期待する結果):
        assert_ne!(s1_again.id, s1.id);
        assert_eq!(ids(&servers), vec!["c", "a", "b"]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    /// 解放されるまで応答を返さない API
    struct GatedApi {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl ServerApi for GatedApi {
        async fn fetch_servers(
            &self,
            _api_base_url: &str,
            _token: &str,
        ) -> Result<Vec<ServerSummary>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![server("x")])
        }
    }

    #[tokio::test]
    async fn test_invalidating_other_session_keeps_in_flight_result() {
        // テスト項目: 取得中に別のセッションを無効化しても、取得結果はキャッシュされる
        // given (前提条件):
        let api = Arc::new(GatedApi {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let cache = Arc::new(SessionCache::new(
            api.clone(),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(ManualClock::new(T0)),
        ));
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let s2 = cache.add_session(account("u2", "https://b.example")).await;
        let in_flight = {
            let cache = cache.clone();
            let s2_id = s2.id.clone();
            tokio::spawn(async move { cache.fetch_servers_for_session(&s2_id).await })
        };
        api.started.notified().await;

        // when (操作):
        cache.invalidate_server_cache(Some(&s1.id)).await;
        api.release.notify_one();
        in_flight.await.unwrap().unwrap();
        let cached = tokio::time::timeout(
            Duration::from_secs(5),
            cache.fetch_servers_for_session(&s2.id),
        )
        .await
        .expect("second fetch should be served from cache")
        .unwrap();

        // then (期待する結果):
        assert_eq!(ids(&cached), vec!["x"]);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidating_same_session_discards_in_flight_result() {
        // テスト項目: 取得中にそのセッションを無効化すると、取得結果はキャッシュされない
        // given (前提条件):
        let api = Arc::new(GatedApi {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        });
        let cache = Arc::new(SessionCache::new(
            api.clone(),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(ManualClock::new(T0)),
        ));
        let s1 = cache.add_session(account("u1", "https://a.example")).await;
        let in_flight = {
            let cache = cache.clone();
            let s1_id = s1.id.clone();
            tokio::spawn(async move { cache.fetch_servers_for_session(&s1_id).await })
        };
        api.started.notified().await;

        // when (操作):
        cache.invalidate_server_cache(Some(&s1.id)).await;
        api.release.notify_one();
        in_flight.await.unwrap().unwrap();
        let refetch = {
            let cache = cache.clone();
            let s1_id = s1.id.clone();
            tokio::spawn(async move { cache.fetch_servers_for_session(&s1_id).await })
        };
        api.started.notified().await;
        api.release.notify_one();
        refetch.await.unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }
}
