//! Validation Stage - 플러그인별 검사
//!
//! 실패는 레코드 상태로 기록되고 플러그인은 결과에 남습니다.

use crate::plugin::error::PluginLoadError;
use crate::plugin::legacy::{LegacyInspector, MODULE_JS};
use crate::plugin::record::Plugin;
use crate::plugin::types::{ErrorCode, PluginClass, SignatureStatus};
use async_trait::async_trait;
use kiln_foundation::PluginsConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 단일 검사
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(&self, plugin: &mut Plugin) -> Result<(), PluginLoadError>;
}

// ============================================================================
// 서명
// ============================================================================

/// 허용되지 않은 서명 상태 거부
pub struct SignatureValidator {
    dev_mode: bool,
    allow_unsigned: Vec<glob::Pattern>,
}

impl SignatureValidator {
    pub fn new(dev_mode: bool, allow_unsigned: &[String]) -> Self {
        let allow_unsigned = allow_unsigned
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid allowUnsigned pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();
        Self {
            dev_mode,
            allow_unsigned,
        }
    }

    pub fn from_config(config: &PluginsConfig) -> Self {
        Self::new(config.dev_mode, &config.allow_unsigned)
    }

    fn is_allow_listed(&self, id: &str) -> bool {
        self.allow_unsigned.iter().any(|p| p.matches(id))
    }
}

#[async_trait]
impl Validator for SignatureValidator {
    fn name(&self) -> &'static str {
        "signature"
    }

    async fn validate(&self, plugin: &mut Plugin) -> Result<(), PluginLoadError> {
        let status = plugin.signature.status;
        let Some(code) = ErrorCode::for_signature(status) else {
            return Ok(());
        };

        if status == SignatureStatus::Unsigned {
            if self.dev_mode {
                debug!(plugin_id = %plugin.id(), "Allowing unsigned plugin in dev mode");
                return Ok(());
            }
            if self.is_allow_listed(plugin.id()) {
                warn!(plugin_id = %plugin.id(), "Running unsigned plugin (allow-listed)");
                return Ok(());
            }
        }

        Err(PluginLoadError::new(
            code,
            format!("plugin {} has signature status {}", plugin.id(), status),
        ))
    }
}

// ============================================================================
// 모듈 진입점
// ============================================================================

/// module.js 존재 확인 (없으면 경고만)
pub struct ModuleJsCheck;

#[async_trait]
impl Validator for ModuleJsCheck {
    fn name(&self) -> &'static str {
        "module-js"
    }

    async fn validate(&self, plugin: &mut Plugin) -> Result<(), PluginLoadError> {
        if plugin.is_renderer() || plugin.is_core() {
            return Ok(());
        }
        if !plugin.fs.exists(MODULE_JS) {
            warn!(
                plugin_id = %plugin.id(),
                path = %plugin.fs.base().display(),
                "Plugin is missing {}",
                MODULE_JS
            );
        }
        Ok(())
    }
}

// ============================================================================
// 레거시 프레임워크
// ============================================================================

/// 레거시 프레임워크 사용 플러그인 거부
pub struct LegacyFrameworkValidator {
    inspector: Arc<dyn LegacyInspector>,
    timeout: Duration,
    hide_deprecation: Vec<String>,
}

impl LegacyFrameworkValidator {
    pub fn new(
        inspector: Arc<dyn LegacyInspector>,
        timeout: Duration,
        hide_deprecation: Vec<String>,
    ) -> Self {
        Self {
            inspector,
            timeout,
            hide_deprecation,
        }
    }
}

#[async_trait]
impl Validator for LegacyFrameworkValidator {
    fn name(&self) -> &'static str {
        "legacy-framework"
    }

    async fn validate(&self, plugin: &mut Plugin) -> Result<(), PluginLoadError> {
        if plugin.class == PluginClass::Core {
            return Ok(());
        }

        let detected = match tokio::time::timeout(self.timeout, self.inspector.detect(plugin)).await {
            Ok(Ok(detected)) => detected,
            Ok(Err(e)) => {
                warn!(plugin_id = %plugin.id(), "Legacy framework inspection failed: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    plugin_id = %plugin.id(),
                    timeout_secs = self.timeout.as_secs(),
                    "Legacy framework inspection timed out"
                );
                false
            }
        };

        plugin.legacy.detected = detected;
        if detected {
            return Err(PluginLoadError::new(
                ErrorCode::LegacyFramework,
                format!("plugin {} uses a deprecated front-end framework", plugin.id()),
            ));
        }

        plugin.legacy.hide_deprecation = self.hide_deprecation.iter().any(|id| id == plugin.id());
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validation 단계
pub struct Validation {
    validators: Vec<Box<dyn Validator>>,
}

impl Validation {
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }

    /// 이미 에러 상태인 플러그인은 건너뜀. 첫 실패에서 해당 플러그인 검사 중단
    pub async fn validate(&self, mut plugins: Vec<Plugin>) -> Vec<Plugin> {
        for plugin in &mut plugins {
            if plugin.is_errored() {
                continue;
            }

            for validator in &self.validators {
                if let Err(e) = validator.validate(plugin).await {
                    warn!(
                        plugin_id = %plugin.id(),
                        validator = validator.name(),
                        code = %e.code,
                        "Plugin validation failed: {}",
                        e.message
                    );
                    plugin.set_error(e.code, e.message);
                    break;
                }
            }
        }
        plugins
    }
}
