//! Domain models for the multi-account session cache.
//!
//! 表示順の決定は副作用の無い関数として切り出してあります。

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// ログイン済みアカウントの情報（セッション追加の入力）
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub user_id: String,
    pub username: String,
    pub token: String,
    /// 例: `https://chat.example.com`
    pub api_base_url: String,
}

impl fmt::Debug for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountInfo")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// 1 アカウント分のセッション
///
/// `is_active` なセッションは常に高々 1 つです。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub token: String,
    pub api_base_url: String,
    pub is_active: bool,
    /// 追加された時刻（Unix ミリ秒）
    pub created_at: i64,
}

impl Session {
    /// 同じアカウント（ユーザー + エンドポイント）か
    pub fn is_same_account(&self, account: &AccountInfo) -> bool {
        self.user_id == account.user_id && self.api_base_url == account.api_base_url
    }

    /// プロセスをまたいで変わらないアカウントのキー（`<user_id>@<api_base_url>`）
    ///
    /// セッション ID は起動ごとに振り直されるため、永続化にはこちらを使います。
    pub fn account_key(&self) -> String {
        format!("{}@{}", self.user_id, self.api_base_url)
    }

    /// このセッション経由でサーバーを操作するための情報
    pub fn origin(&self) -> ServerOrigin {
        ServerOrigin {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            token: self.token.clone(),
            api_base_url: self.api_base_url.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// API が返すサーバー 1 件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// サーバーの取得元セッション
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ServerOrigin {
    pub session_id: String,
    pub user_id: String,
    pub token: String,
    pub api_base_url: String,
}

impl fmt::Debug for ServerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOrigin")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

/// 取得元のタグが付いたサーバー（全セッション横断の一覧用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedServer {
    #[serde(flatten)]
    pub server: ServerSummary,
    pub origin: ServerOrigin,
}

/// ローカルの表示順を適用する
///
/// 表示順が指定されたサーバーを位置の昇順で先頭に並べ、残りは取得順のまま後ろに続けます。
/// 同じ位置が重なった場合は取得順を保ちます。
///
/// # Arguments
///
/// * `servers` - API から取得した順のサーバー一覧
/// * `overrides` - サーバー ID から表示位置へのマップ
pub fn apply_display_order(
    servers: Vec<ServerSummary>,
    overrides: &HashMap<String, u32>,
) -> Vec<ServerSummary> {
    if overrides.is_empty() {
        return servers;
    }
    let (mut ordered, rest): (Vec<_>, Vec<_>) = servers
        .into_iter()
        .partition(|server| overrides.contains_key(&server.id));
    // sort_by_key は安定ソート
    ordered.sort_by_key(|server| overrides.get(&server.id).copied().unwrap_or(u32::MAX));
    ordered.extend(rest);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> ServerSummary {
        ServerSummary {
            id: id.to_string(),
            name: format!("Server {}", id),
            icon_url: None,
        }
    }

    fn ids(servers: &[ServerSummary]) -> Vec<&str> {
        servers.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_apply_display_order_without_overrides_keeps_fetch_order() {
        // テスト項目: 表示順の指定が無ければ取得順のまま
        // given (前提条件):
        let servers = vec![server("a"), server("b"), server("c")];

        // when (操作):
        let result = apply_display_order(servers, &HashMap::new());

        // then (期待する結果):
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_apply_display_order_puts_overridden_first() {
        // テスト項目: 指定されたサーバーが位置順に先頭へ、残りは取得順で続く
        // given (前提条件):
        let servers = vec![server("a"), server("b"), server("c"), server("d")];
        let overrides = HashMap::from([("d".to_string(), 0), ("b".to_string(), 1)]);

        // when (操作):
        let result = apply_display_order(servers, &overrides);

        // then (期待する結果):
        assert_eq!(ids(&result), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_apply_display_order_ties_keep_fetch_order() {
        // テスト項目: 同じ位置の指定は取得順を保つ
        // given (前提条件):
        let servers = vec![server("a"), server("b"), server("c")];
        let overrides = HashMap::from([("c".to_string(), 2), ("b".to_string(), 2)]);

        // when (操作):
        let result = apply_display_order(servers, &overrides);

        // then (期待する結果):
        assert_eq!(ids(&result), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_apply_display_order_ignores_unknown_servers() {
        // テスト項目: 一覧に存在しないサーバーの指定は無視される
        // given (前提条件):
        let servers = vec![server("a"), server("b")];
        let overrides = HashMap::from([("zzz".to_string(), 0)]);

        // when (操作):
        let result = apply_display_order(servers, &overrides);

        // then (期待する結果):
        assert_eq!(ids(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_session_debug_redacts_token() {
        // テスト項目: Debug 出力にトークンが含まれない
        // given (前提条件):
        let session = Session {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            token: "super-secret".to_string(),
            api_base_url: "https://a.example".to_string(),
            is_active: true,
            created_at: 0,
        };

        // when (操作):
        let debug = format!("{:?}", session);

        // then (期待する結果):
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("alice"));
    }
}
