//! Legacy Framework Detection - 사용 중단된 프런트엔드 프레임워크 검사
//!
//! 모듈 번들에서 레거시 프레임워크 흔적을 찾습니다.
//! 호출하는 쪽(Validation)이 시간 제한을 겁니다.
//! 정규식 검사는 블로킹 스레드에서 돌아가므로 시간 제한이 검사 도중에도 걸립니다.

use super::error::{PluginError, PluginResult};
use super::record::Plugin;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

/// 검사 대상 모듈 파일
pub const MODULE_JS: &str = "module.js";

lazy_static::lazy_static! {
    static ref LEGACY_PATTERNS: Vec<Regex> = compile_legacy_patterns();
}

fn compile_legacy_patterns() -> Vec<Regex> {
    let patterns = [
        r"\bPanelCtrl\b",
        r"\bMetricsPanelCtrl\b",
        r"\bQueryCtrl\b",
        r"\bConfigCtrl\b",
        r#"["']app/plugins/sdk["']"#,
        r"\bangular\.module\(",
        r"\btemplateUrl\s*:",
    ];

    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// 레거시 프레임워크 검사기
#[async_trait]
pub trait LegacyInspector: Send + Sync {
    async fn detect(&self, plugin: &Plugin) -> PluginResult<bool>;
}

/// module.js 패턴 검사
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternsInspector;

impl PatternsInspector {
    pub fn new() -> Self {
        Self
    }

    pub fn matches(source: &str) -> bool {
        LEGACY_PATTERNS.iter().any(|re| re.is_match(source))
    }
}

#[async_trait]
impl LegacyInspector for PatternsInspector {
    async fn detect(&self, plugin: &Plugin) -> PluginResult<bool> {
        if !plugin.fs.exists(MODULE_JS) {
            return Ok(false);
        }

        let bytes = plugin.fs.read(MODULE_JS).await?;
        let detected =
            tokio::task::spawn_blocking(move || Self::matches(&String::from_utf8_lossy(&bytes)))
                .await
                .map_err(|e| PluginError::Io(std::io::Error::other(e)))?;
        debug!(plugin_id = %plugin.id(), detected, "Inspected module for legacy framework");
        Ok(detected)
    }
}
