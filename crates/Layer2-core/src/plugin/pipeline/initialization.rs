//! Initialization Stage - 백엔드 준비 + 레지스트리 등록
//!
//! 에러 상태 플러그인도 등록됩니다 (에러 항목으로 조회 가능해야 함).
//! 등록 실패만 호출 전체를 실패시킵니다.

use crate::plugin::error::PluginResult;
use crate::plugin::process::{BackendClientProvider, ExternalServiceRegistry, ProcessManager};
use crate::plugin::record::Plugin;
use crate::plugin::registry::Registry;
use crate::plugin::types::ErrorCode;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 초기화 단계 하나
#[async_trait]
pub trait Initializer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn initialize(&self, plugin: &mut Plugin) -> PluginResult<()>;
}

/// 백엔드 플러그인 클라이언트 핸들 획득
pub struct BackendClientInit {
    provider: Arc<dyn BackendClientProvider>,
}

impl BackendClientInit {
    pub fn new(provider: Arc<dyn BackendClientProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Initializer for BackendClientInit {
    fn name(&self) -> &'static str {
        "backend-client"
    }

    async fn initialize(&self, plugin: &mut Plugin) -> PluginResult<()> {
        if !plugin.is_backend() {
            return Ok(());
        }
        let client = self.provider.client(plugin).await?;
        plugin.client = Some(client);
        debug!(plugin_id = %plugin.id(), "Backend client ready");
        Ok(())
    }
}

/// `iam` 요구사항 선언 플러그인의 외부 서비스 등록
pub struct ExternalServiceRegistration {
    registry: Arc<dyn ExternalServiceRegistry>,
}

impl ExternalServiceRegistration {
    pub fn new(registry: Arc<dyn ExternalServiceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Initializer for ExternalServiceRegistration {
    fn name(&self) -> &'static str {
        "external-service"
    }

    async fn initialize(&self, plugin: &mut Plugin) -> PluginResult<()> {
        let Some(iam) = plugin.json.iam.clone() else {
            return Ok(());
        };
        let credentials = self.registry.register(plugin.id(), &iam).await?;
        plugin.external_service = Some(credentials);
        Ok(())
    }
}

/// 백엔드 프로세스 시작
pub struct ProcessStart {
    manager: Arc<dyn ProcessManager>,
}

impl ProcessStart {
    pub fn new(manager: Arc<dyn ProcessManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Initializer for ProcessStart {
    fn name(&self) -> &'static str {
        "process-start"
    }

    async fn initialize(&self, plugin: &mut Plugin) -> PluginResult<()> {
        if !plugin.is_backend() {
            return Ok(());
        }
        self.manager.start(plugin).await
    }
}

/// Initialization 단계
pub struct Initialization {
    steps: Vec<Box<dyn Initializer>>,
    registry: Arc<dyn Registry>,
}

impl Initialization {
    pub fn new(steps: Vec<Box<dyn Initializer>>, registry: Arc<dyn Registry>) -> Self {
        Self { steps, registry }
    }

    pub async fn initialize(&self, plugins: Vec<Plugin>) -> PluginResult<Vec<Arc<Plugin>>> {
        let mut registered = Vec::with_capacity(plugins.len());

        for mut plugin in plugins {
            if !plugin.is_errored() {
                for step in &self.steps {
                    if let Err(e) = step.initialize(&mut plugin).await {
                        error!(
                            plugin_id = %plugin.id(),
                            step = step.name(),
                            "Plugin initialization failed: {}",
                            e
                        );
                        plugin.set_error(ErrorCode::InitializationFailed, e.to_string());
                        break;
                    }
                }
            }

            let plugin = self.registry.add(plugin).await?;
            if plugin.is_errored() {
                info!(plugin_id = %plugin.id(), status = %plugin.status, "Registered errored plugin");
            }
            registered.push(plugin);
        }

        Ok(registered)
    }
}
