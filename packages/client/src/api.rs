//! サーバー一覧 API のクライアント

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{domain::ServerSummary, error::ApiError};

const MAX_ERROR_BODY_LEN: usize = 300;

/// アカウントから見えるサーバー一覧を取得する
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn fetch_servers(
        &self,
        api_base_url: &str,
        token: &str,
    ) -> Result<Vec<ServerSummary>, ApiError>;
}

/// 配列のままのレスポンスと `{"servers": [...]}` の両方を受け付ける
#[derive(Deserialize)]
#[serde(untagged)]
enum ServersResponse {
    List(Vec<ServerSummary>),
    Wrapped { servers: Vec<ServerSummary> },
}

impl From<ServersResponse> for Vec<ServerSummary> {
    fn from(response: ServersResponse) -> Self {
        match response {
            ServersResponse::List(servers) | ServersResponse::Wrapped { servers } => servers,
        }
    }
}

/// reqwest による `GET {base}/api/servers`
#[derive(Clone, Default)]
pub struct HttpServerApi {
    client: Client,
}

impl HttpServerApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn fetch_servers(
        &self,
        api_base_url: &str,
        token: &str,
    ) -> Result<Vec<ServerSummary>, ApiError> {
        let url = format!("{}/api/servers", api_base_url.trim_end_matches('/'));
        let response = self.client.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_LEN).collect(),
            });
        }

        let parsed: ServersResponse = response.json().await?;
        Ok(parsed.into())
    }
}
