//! Termination Stage - 런타임 제거
//!
//! 단계별 롤백은 없습니다. 중간 실패 시 이미 완료된 단계의 결과가 그대로 남습니다.

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::process::ProcessManager;
use crate::plugin::record::Plugin;
use crate::plugin::registry::Registry;
use std::sync::Arc;
use tracing::{debug, info};

/// Termination 단계
pub struct Termination {
    registry: Arc<dyn Registry>,
    process_manager: Arc<dyn ProcessManager>,
}

impl Termination {
    pub fn new(registry: Arc<dyn Registry>, process_manager: Arc<dyn ProcessManager>) -> Self {
        Self {
            registry,
            process_manager,
        }
    }

    /// 플러그인 종료 + 등록 해제 + (가능하면) 파일 삭제
    pub async fn terminate(&self, id: &str) -> PluginResult<Arc<Plugin>> {
        let plugin = self
            .registry
            .plugin(id, None)
            .await
            .ok_or_else(|| PluginError::NotFound(id.to_string()))?;

        if plugin.class.is_protected() {
            return Err(PluginError::Protected {
                id: plugin.id().to_string(),
                class: plugin.class,
            });
        }

        // 중첩 자식의 수명은 부모가 관리
        if let Some(parent) = &plugin.parent {
            return Err(PluginError::OwnedByParent {
                id: plugin.id().to_string(),
                parent: parent.clone(),
            });
        }

        self.stop_and_remove(&plugin).await?;

        for child_id in &plugin.children {
            match self.registry.plugin(child_id, None).await {
                Some(child) => match self.stop_and_remove(&child).await {
                    Ok(()) | Err(PluginError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                },
                None => debug!(plugin_id = %child_id, "Child plugin already unregistered"),
            }
        }

        if plugin.fs.supports_removal() {
            plugin.fs.remove().await?;
            debug!(path = %plugin.fs.base().display(), "Removed plugin files");
        }

        info!(plugin_id = %plugin.id(), "Plugin terminated");
        Ok(plugin)
    }

    async fn stop_and_remove(&self, plugin: &Plugin) -> PluginResult<()> {
        if plugin.is_backend() {
            self.process_manager.stop(plugin.id()).await?;
        }
        self.registry.remove(plugin.id()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::fs::PluginFs;
    use crate::plugin::manifest::PluginJson;
    use crate::plugin::registry::PluginRegistry;
    use crate::plugin::types::{PluginClass, Signature};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct StopRecorder {
        stopped: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessManager for StopRecorder {
        async fn start(&self, _plugin: &Plugin) -> PluginResult<()> {
            Ok(())
        }

        async fn stop(&self, plugin_id: &str) -> PluginResult<()> {
            self.stopped.lock().push(plugin_id.to_string());
            Ok(())
        }
    }

    fn plugin(id: &str, fs: PluginFs, class: PluginClass) -> Plugin {
        let json = PluginJson::from_slice(
            format!(r#"{{"id":"{}","type":"datasource","name":"{}","backend":true}}"#, id, id)
                .as_bytes(),
        )
        .unwrap();
        Plugin::new(json, fs, class, Signature::internal())
    }

    #[tokio::test]
    async fn test_terminate_external_removes_files() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("acme-datasource");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("plugin.json"), "{}").unwrap();

        let registry = Arc::new(PluginRegistry::new());
        let manager = Arc::new(StopRecorder::default());
        registry
            .add(plugin(
                "acme-datasource",
                PluginFs::removable(&base),
                PluginClass::External,
            ))
            .await
            .unwrap();

        let termination = Termination::new(registry.clone(), manager.clone());
        termination.terminate("acme-datasource").await.unwrap();

        assert!(registry.is_empty().await);
        assert_eq!(*manager.stopped.lock(), vec!["acme-datasource".to_string()]);
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_protected_class_is_refused() {
        let registry = Arc::new(PluginRegistry::new());
        let manager = Arc::new(StopRecorder::default());
        registry
            .add(plugin("core-datasource", PluginFs::new("/core"), PluginClass::Core))
            .await
            .unwrap();

        let termination = Termination::new(registry.clone(), manager.clone());
        let err = termination.terminate("core-datasource").await.unwrap_err();

        assert!(matches!(err, PluginError::Protected { class: PluginClass::Core, .. }));
        assert!(manager.stopped.lock().is_empty());
        assert!(registry.contains("core-datasource", "").await);
    }

    #[tokio::test]
    async fn test_children_are_unregistered() {
        let registry = Arc::new(PluginRegistry::new());
        let manager = Arc::new(StopRecorder::default());

        let mut app = plugin("acme-app", PluginFs::new("/plugins/acme-app"), PluginClass::External);
        app.children.push("acme-child-datasource".to_string());
        let mut child = plugin(
            "acme-child-datasource",
            PluginFs::new("/plugins/acme-app/child"),
            PluginClass::External,
        );
        child.parent = Some("acme-app".to_string());
        registry.add(app).await.unwrap();
        registry.add(child).await.unwrap();

        let termination = Termination::new(registry.clone(), manager);
        termination.terminate("acme-app").await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_nested_child_is_refused() {
        let dir = TempDir::new().unwrap();
        let app_dir = dir.path().join("acme-app");
        let child_dir = app_dir.join("datasources/inner");
        std::fs::create_dir_all(&child_dir).unwrap();
        std::fs::write(app_dir.join("plugin.json"), "{}").unwrap();
        std::fs::write(child_dir.join("plugin.json"), "{}").unwrap();

        let registry = Arc::new(PluginRegistry::new());
        let manager = Arc::new(StopRecorder::default());
        let mut app = plugin("acme-app", PluginFs::removable(&app_dir), PluginClass::External);
        app.children.push("acme-inner-ds".to_string());
        let mut child = plugin("acme-inner-ds", PluginFs::removable(&child_dir), PluginClass::External);
        child.parent = Some("acme-app".to_string());
        registry.add(app).await.unwrap();
        registry.add(child).await.unwrap();

        let termination = Termination::new(registry.clone(), manager.clone());
        let err = termination.terminate("acme-inner-ds").await.unwrap_err();

        assert!(matches!(err, PluginError::OwnedByParent { ref parent, .. } if parent == "acme-app"));
        assert!(manager.stopped.lock().is_empty());
        assert!(child_dir.join("plugin.json").exists());
        assert!(registry.contains("acme-inner-ds", "").await);

        // 부모를 통해서는 함께 종료
        termination.terminate("acme-app").await.unwrap();
        assert!(registry.is_empty().await);
        assert!(!app_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_plugin() {
        let termination = Termination::new(
            Arc::new(PluginRegistry::new()),
            Arc::new(StopRecorder::default()),
        );
        assert!(matches!(
            termination.terminate("nope").await,
            Err(PluginError::NotFound(_))
        ));
    }
}
