//! 表示順の保存先とアカウント一覧ファイルの読み込み

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{domain::AccountInfo, error::StoreError};

/// サーバー ID から表示位置へのマップ
pub type DisplayOrder = HashMap<String, u32>;

/// アカウントごとの表示順を保存する
///
/// キーは `Session::account_key` です。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplayOrderStore: Send + Sync {
    async fn load(&self, account_key: &str) -> Result<DisplayOrder, StoreError>;

    async fn save_position(
        &self,
        account_key: &str,
        server_id: &str,
        position: u32,
    ) -> Result<(), StoreError>;

    async fn clear_session(&self, account_key: &str) -> Result<(), StoreError>;
}

/// メモリ上の保存先（テストや一時的な利用向け）
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, DisplayOrder>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DisplayOrderStore for InMemoryOrderStore {
    async fn load(&self, account_key: &str) -> Result<DisplayOrder, StoreError> {
        Ok(self
            .orders
            .lock()
            .await
            .get(account_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_position(
        &self,
        account_key: &str,
        server_id: &str,
        position: u32,
    ) -> Result<(), StoreError> {
        self.orders
            .lock()
            .await
            .entry(account_key.to_string())
            .or_default()
            .insert(server_id.to_string(), position);
        Ok(())
    }

    async fn clear_session(&self, account_key: &str) -> Result<(), StoreError> {
        self.orders.lock().await.remove(account_key);
        Ok(())
    }
}

/// JSON ファイルに保存する
///
/// ファイルの形式は `{"<account_key>": {"<server_id>": <position>}}` です。
/// 書き込みは一時ファイルへの書き出しと rename で行います。
pub struct JsonFileOrderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileOrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, DisplayOrder>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, orders: &HashMap<String, DisplayOrder>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(orders)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DisplayOrderStore for JsonFileOrderStore {
    async fn load(&self, account_key: &str) -> Result<DisplayOrder, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all()
            .await?
            .remove(account_key)
            .unwrap_or_default())
    }

    async fn save_position(
        &self,
        account_key: &str,
        server_id: &str,
        position: u32,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut orders = self.read_all().await?;
        orders
            .entry(account_key.to_string())
            .or_default()
            .insert(server_id.to_string(), position);
        self.write_all(&orders).await
    }

    async fn clear_session(&self, account_key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut orders = self.read_all().await?;
        if orders.remove(account_key).is_some() {
            self.write_all(&orders).await?;
        }
        Ok(())
    }
}

/// アカウント一覧（`AccountInfo` の JSON 配列）を読み込む
pub async fn load_accounts(path: &Path) -> Result<Vec<AccountInfo>, StoreError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}
