//! Plugin Sources - 플러그인 번들 공급원
//!
//! 로컬 디렉토리, CDN 레이아웃, 설치 요청 목록, 이미 찾은 번들 재실행.
//! 파이프라인은 `Source` 하나만 보고 나머지는 `PluginSource` 변형이 처리합니다.

mod bundle;
mod cdn;
mod install;
mod local;

pub use bundle::BundleSource;
pub use cdn::{CdnSource, CDN_SIGNING_ORG};
pub use install::{group_by_class, InstallSource};
pub use local::{LocalFinder, LocalSource};

use super::error::PluginResult;
use super::fs::PluginFs;
use super::manifest::PluginJson;
use super::types::{PluginClass, Signature};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// ============================================================================
// 발견 결과
// ============================================================================

/// 디스크에서 찾은 플러그인 (아직 레코드 아님)
#[derive(Debug, Clone)]
pub struct FoundPlugin {
    pub json: PluginJson,
    pub fs: PluginFs,
}

/// 최상위 플러그인과 그 아래 중첩된 자식들
#[derive(Debug, Clone)]
pub struct FoundBundle {
    pub primary: FoundPlugin,
    pub children: Vec<FoundPlugin>,
}

impl FoundBundle {
    pub fn new(primary: FoundPlugin) -> Self {
        Self {
            primary,
            children: Vec::new(),
        }
    }

    /// 번들에 포함된 모든 플러그인 ID
    pub fn ids(&self) -> Vec<&str> {
        std::iter::once(self.primary.json.id.as_str())
            .chain(self.children.iter().map(|c| c.json.id.as_str()))
            .collect()
    }
}

// ============================================================================
// Source
// ============================================================================

/// 번들 공급원
#[async_trait]
pub trait Source: Send + Sync {
    /// 이 공급원이 만드는 플러그인의 클래스
    fn class(&self) -> PluginClass;

    /// 서명 계산 대신 사용할 기본 서명
    fn default_signature(&self) -> Option<Signature> {
        None
    }

    /// 번들 탐색. 실패하면 Load 호출 전체가 실패
    async fn discover(&self, cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>>;
}

/// 공급원 변형
pub enum PluginSource {
    Local(LocalSource),
    Cdn(CdnSource),
    Install(InstallSource),
    Bundle(BundleSource),
}

#[async_trait]
impl Source for PluginSource {
    fn class(&self) -> PluginClass {
        match self {
            PluginSource::Local(s) => s.class(),
            PluginSource::Cdn(s) => s.class(),
            PluginSource::Install(s) => s.class(),
            PluginSource::Bundle(s) => s.class(),
        }
    }

    fn default_signature(&self) -> Option<Signature> {
        match self {
            PluginSource::Local(s) => s.default_signature(),
            PluginSource::Cdn(s) => s.default_signature(),
            PluginSource::Install(s) => s.default_signature(),
            PluginSource::Bundle(s) => s.default_signature(),
        }
    }

    async fn discover(&self, cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>> {
        match self {
            PluginSource::Local(s) => s.discover(cancel).await,
            PluginSource::Cdn(s) => s.discover(cancel).await,
            PluginSource::Install(s) => s.discover(cancel).await,
            PluginSource::Bundle(s) => s.discover(cancel).await,
        }
    }
}

impl From<LocalSource> for PluginSource {
    fn from(source: LocalSource) -> Self {
        PluginSource::Local(source)
    }
}

impl From<CdnSource> for PluginSource {
    fn from(source: CdnSource) -> Self {
        PluginSource::Cdn(source)
    }
}

impl From<InstallSource> for PluginSource {
    fn from(source: InstallSource) -> Self {
        PluginSource::Install(source)
    }
}

impl From<BundleSource> for PluginSource {
    fn from(source: BundleSource) -> Self {
        PluginSource::Bundle(source)
    }
}
