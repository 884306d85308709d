//! Key Store - 서명 공개키 캐시

use crate::plugin::error::PluginResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// 공개키 저장소 (영구 저장소는 외부 구현)
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// 키 ID로 armored 공개키 조회
    async fn get(&self, key_id: &str) -> PluginResult<Option<String>>;

    async fn set(&self, key_id: &str, public_key: &str) -> PluginResult<()>;

    async fn last_updated(&self) -> PluginResult<Option<DateTime<Utc>>>;

    async fn set_last_updated(&self, at: DateTime<Utc>) -> PluginResult<()>;
}

/// 메모리 기반 키 저장소
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, String>>,
    updated: RwLock<Option<DateTime<Utc>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn get(&self, key_id: &str) -> PluginResult<Option<String>> {
        Ok(self.keys.read().get(key_id).cloned())
    }

    async fn set(&self, key_id: &str, public_key: &str) -> PluginResult<()> {
        self.keys
            .write()
            .insert(key_id.to_string(), public_key.to_string());
        Ok(())
    }

    async fn last_updated(&self) -> PluginResult<Option<DateTime<Utc>>> {
        Ok(*self.updated.read())
    }

    async fn set_last_updated(&self, at: DateTime<Utc>) -> PluginResult<()> {
        *self.updated.write() = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryKeyStore::new();
        assert!(store.get("k1").await.unwrap().is_none());
        assert!(store.last_updated().await.unwrap().is_none());

        store.set("k1", "armored").await.unwrap();
        let now = Utc::now();
        store.set_last_updated(now).await.unwrap();

        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("armored"));
        assert_eq!(store.last_updated().await.unwrap(), Some(now));
        assert_eq!(store.len(), 1);
    }
}
