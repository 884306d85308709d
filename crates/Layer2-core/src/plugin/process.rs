//! Process - 백엔드 프로세스 / 클라이언트 / 외부 서비스 경계
//!
//! 실제 RPC 전송은 이 모듈 밖의 책임입니다. 여기서는
//! - 프로세스 시작/중지 (`ProcessManager`)
//! - 플러그인 ID로 얻는 클라이언트 핸들 (`BackendClientProvider`)
//! - 외부 서비스 자격 증명 발급 (`ExternalServiceRegistry`)
//! 인터페이스와 로컬 기본 구현을 제공합니다.

use super::error::{PluginError, PluginResult};
use super::install::{host_arch, host_os};
use super::manifest::IamRequirements;
use super::record::Plugin;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

// ============================================================================
// Traits
// ============================================================================

/// 실행 중인 백엔드 플러그인과 통신하는 핸들
pub trait BackendClient: Send + Sync + fmt::Debug {
    fn plugin_id(&self) -> &str;
}

/// 플러그인 ID 기준 클라이언트 팩토리
#[async_trait]
pub trait BackendClientProvider: Send + Sync {
    async fn client(&self, plugin: &Plugin) -> PluginResult<Arc<dyn BackendClient>>;
}

/// 백엔드 프로세스 시작/중지
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn start(&self, plugin: &Plugin) -> PluginResult<()>;

    /// 실행 중이 아니면 아무것도 하지 않음
    async fn stop(&self, plugin_id: &str) -> PluginResult<()>;
}

/// 외부 서비스 자격 증명
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalServiceCredentials {
    pub client_id: String,
    pub token: String,
}

impl fmt::Debug for ExternalServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalServiceCredentials")
            .field("client_id", &self.client_id)
            .field("token", &"***")
            .finish()
    }
}

/// `iam` 요구사항을 선언한 플러그인에 자격 증명 발급
#[async_trait]
pub trait ExternalServiceRegistry: Send + Sync {
    async fn register(
        &self,
        plugin_id: &str,
        iam: &IamRequirements,
    ) -> PluginResult<ExternalServiceCredentials>;
}

// ============================================================================
// LocalProcessManager - 로컬 실행 파일 기반 구현
// ============================================================================

/// 로컬 프로세스 핸들
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    plugin_id: String,
    pub executable: PathBuf,
}

impl BackendClient for ProcessHandle {
    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

/// 플러그인 디렉토리의 실행 파일을 직접 띄우는 프로세스 관리자
#[derive(Default)]
pub struct LocalProcessManager {
    running: Mutex<HashMap<String, Child>>,
}

impl LocalProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{executable}_{os}_{arch}[.exe]`, 없으면 `{executable}`
    pub fn resolve_executable(plugin: &Plugin) -> PluginResult<PathBuf> {
        let name = plugin.json.executable.as_deref().ok_or_else(|| PluginError::Process {
            id: plugin.id().to_string(),
            message: "no executable declared".into(),
        })?;

        let suffix = if cfg!(windows) { ".exe" } else { "" };
        let specific = plugin
            .fs
            .base()
            .join(format!("{}_{}_{}{}", name, host_os(), host_arch(), suffix));
        if specific.is_file() {
            return Ok(specific);
        }

        let plain = plugin.fs.base().join(name);
        if plain.is_file() {
            return Ok(plain);
        }

        Err(PluginError::Process {
            id: plugin.id().to_string(),
            message: format!("executable {} not found in {}", name, plugin.fs.base().display()),
        })
    }

    pub fn is_running(&self, plugin_id: &str) -> bool {
        self.running.lock().contains_key(plugin_id)
    }
}

#[async_trait]
impl ProcessManager for LocalProcessManager {
    async fn start(&self, plugin: &Plugin) -> PluginResult<()> {
        if self.is_running(plugin.id()) {
            debug!("Plugin process {} already running", plugin.id());
            return Ok(());
        }

        let executable = Self::resolve_executable(plugin)?;
        info!("Starting plugin process: {} ({:?})", plugin.id(), executable);

        let child = Command::new(&executable)
            .current_dir(plugin.fs.base())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PluginError::Process {
                id: plugin.id().to_string(),
                message: format!("failed to spawn {}: {}", executable.display(), e),
            })?;

        self.running.lock().insert(plugin.id().to_string(), child);
        Ok(())
    }

    async fn stop(&self, plugin_id: &str) -> PluginResult<()> {
        let child = self.running.lock().remove(plugin_id);

        if let Some(mut child) = child {
            info!("Stopping plugin process: {}", plugin_id);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill plugin process {}: {}", plugin_id, e);
                return Err(PluginError::Process {
                    id: plugin_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackendClientProvider for LocalProcessManager {
    async fn client(&self, plugin: &Plugin) -> PluginResult<Arc<dyn BackendClient>> {
        let executable = Self::resolve_executable(plugin)?;
        Ok(Arc::new(ProcessHandle {
            plugin_id: plugin.id().to_string(),
            executable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::fs::PluginFs;
    use crate::plugin::manifest::PluginJson;
    use crate::plugin::types::{PluginClass, Signature};
    use tempfile::TempDir;

    fn backend_plugin(dir: &std::path::Path, executable: &str) -> Plugin {
        let json = PluginJson::from_slice(
            format!(
                r#"{{"id":"acme-backend-datasource","type":"datasource","name":"Acme","backend":true,"executable":"{}"}}"#,
                executable
            )
            .as_bytes(),
        )
        .unwrap();
        Plugin::new(json, PluginFs::new(dir), PluginClass::External, Signature::unsigned())
    }

    #[test]
    fn test_resolve_executable_prefers_platform_binary() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("gpx_acme"), "").unwrap();
        let plugin = backend_plugin(temp.path(), "gpx_acme");

        assert_eq!(
            LocalProcessManager::resolve_executable(&plugin).unwrap(),
            temp.path().join("gpx_acme")
        );

        let suffix = if cfg!(windows) { ".exe" } else { "" };
        let specific = temp
            .path()
            .join(format!("gpx_acme_{}_{}{}", host_os(), host_arch(), suffix));
        std::fs::write(&specific, "").unwrap();
        assert_eq!(LocalProcessManager::resolve_executable(&plugin).unwrap(), specific);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let temp = TempDir::new().unwrap();
        let plugin = backend_plugin(temp.path(), "gpx_missing");
        let manager = LocalProcessManager::new();

        assert!(matches!(
            manager.start(&plugin).await,
            Err(PluginError::Process { .. })
        ));
        assert!(!manager.is_running(plugin.id()));
        // 실행 중이 아닌 플러그인 중지는 no-op
        manager.stop(plugin.id()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_stop() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let script = temp.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let plugin = backend_plugin(temp.path(), "run.sh");
        let manager = LocalProcessManager::new();

        manager.start(&plugin).await.unwrap();
        assert!(manager.is_running(plugin.id()));

        manager.stop(plugin.id()).await.unwrap();
        assert!(!manager.is_running(plugin.id()));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let creds = ExternalServiceCredentials {
            client_id: "acme".into(),
            token: "secret".into(),
        };
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
