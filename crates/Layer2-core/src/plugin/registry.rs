//! Plugin Registry - 실행 중인 플러그인 저장소
//!
//! Initialization이 쓰고, 모든 단계가 읽고, Termination이 지웁니다.

use super::error::{PluginError, PluginResult};
use super::record::Plugin;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 플러그인 레지스트리 인터페이스
#[async_trait]
pub trait Registry: Send + Sync {
    /// 플러그인 조회 (ID 또는 별칭, 버전 지정 시 버전까지 일치)
    async fn plugin(&self, id: &str, version: Option<&str>) -> Option<Arc<Plugin>>;

    async fn plugins(&self) -> Vec<Arc<Plugin>>;

    /// 등록 (같은 ID가 있으면 에러)
    async fn add(&self, plugin: Plugin) -> PluginResult<Arc<Plugin>>;

    /// 등록 해제
    async fn remove(&self, id: &str) -> PluginResult<Arc<Plugin>>;
}

#[derive(Default)]
struct Inner {
    /// ID -> 플러그인
    plugins: HashMap<String, Arc<Plugin>>,
    /// 별칭 -> ID
    aliases: HashMap<String, String>,
}

/// 메모리 기반 플러그인 레지스트리
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<Inner>,
}

impl PluginRegistry {
    /// 새 레지스트리 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.plugins.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.plugins.is_empty()
    }

    /// ID + 버전 등록 여부
    pub async fn contains(&self, id: &str, version: &str) -> bool {
        self.plugin(id, Some(version)).await.is_some()
    }
}

#[async_trait]
impl Registry for PluginRegistry {
    async fn plugin(&self, id: &str, version: Option<&str>) -> Option<Arc<Plugin>> {
        let inner = self.inner.read().await;
        let plugin = inner.plugins.get(id).or_else(|| {
            inner
                .aliases
                .get(id)
                .and_then(|target| inner.plugins.get(target))
        })?;

        match version {
            Some(v) if plugin.version() != v => None,
            _ => Some(Arc::clone(plugin)),
        }
    }

    async fn plugins(&self) -> Vec<Arc<Plugin>> {
        let inner = self.inner.read().await;
        let mut plugins: Vec<_> = inner.plugins.values().cloned().collect();
        plugins.sort_by(|a, b| a.id().cmp(b.id()));
        plugins
    }

    async fn add(&self, plugin: Plugin) -> PluginResult<Arc<Plugin>> {
        let mut inner = self.inner.write().await;

        let id = plugin.id().to_string();
        if inner.plugins.contains_key(&id) {
            return Err(PluginError::AlreadyRegistered(id));
        }

        let mut aliases: Vec<String> = plugin.json.alias_ids.clone();
        if let Some(alias) = &plugin.alias {
            aliases.push(alias.clone());
        }
        for alias in aliases {
            if alias != id && !inner.plugins.contains_key(&alias) {
                inner.aliases.insert(alias, id.clone());
            }
        }

        let plugin = Arc::new(plugin);
        inner.plugins.insert(id.clone(), Arc::clone(&plugin));

        info!("Registered plugin: {} (v{})", id, plugin.version());
        Ok(plugin)
    }

    async fn remove(&self, id: &str) -> PluginResult<Arc<Plugin>> {
        let mut inner = self.inner.write().await;

        let plugin = inner
            .plugins
            .remove(id)
            .ok_or_else(|| PluginError::NotFound(id.to_string()))?;
        inner.aliases.retain(|_, target| target != id);

        debug!("Unregistered plugin: {}", id);
        Ok(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::fs::PluginFs;
    use crate::plugin::manifest::PluginJson;
    use crate::plugin::types::{PluginClass, Signature};

    fn plugin(id: &str, version: &str) -> Plugin {
        let json = PluginJson::from_slice(
            format!(
                r#"{{"id":"{}","type":"datasource","name":"{}","info":{{"version":"{}"}}}}"#,
                id, id, version
            )
            .as_bytes(),
        )
        .unwrap();
        Plugin::new(
            json,
            PluginFs::new(format!("/plugins/{}", id)),
            PluginClass::External,
            Signature::unsigned(),
        )
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let registry = PluginRegistry::new();
        registry.add(plugin("acme-datasource", "1.0.0")).await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains("acme-datasource", "1.0.0").await);
        assert!(!registry.contains("acme-datasource", "2.0.0").await);
        assert!(registry.plugin("acme-datasource", None).await.is_some());

        let removed = registry.remove("acme-datasource").await.unwrap();
        assert_eq!(removed.id(), "acme-datasource");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_add_fails() {
        let registry = PluginRegistry::new();
        registry.add(plugin("acme-datasource", "1.0.0")).await.unwrap();

        let result = registry.add(plugin("acme-datasource", "1.1.0")).await;
        assert!(matches!(result, Err(PluginError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.remove("nope").await,
            Err(PluginError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_alias_lookup() {
        let registry = PluginRegistry::new();
        let mut p = plugin("kiln-testdata-datasource", "1.0.0");
        p.alias = Some("testdata".into());
        registry.add(p).await.unwrap();

        let found = registry.plugin("testdata", None).await.unwrap();
        assert_eq!(found.id(), "kiln-testdata-datasource");

        registry.remove("kiln-testdata-datasource").await.unwrap();
        assert!(registry.plugin("testdata", None).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_adds() {
        let registry = Arc::new(PluginRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .add(plugin(&format!("acme-{}-datasource", i), "1.0.0"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(registry.plugins().await.len(), 16);
    }
}
