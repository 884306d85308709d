//! 플러그인 설치
//!
//! 설치 요청 목록을 카탈로그/다운로드/해제를 거쳐 로컬 경로로 해석합니다.

mod archive;
mod cache;
mod compat;
mod installer;
mod repo;
mod retry;

pub use archive::{simple_dir_name, ArchiveExtractor, DirNameFn, ExtractedPluginArchive};
pub use cache::{InstallMetrics, MetricsSnapshot, VersionCache};
pub use compat::{host_arch, host_os, CompatOpts};
pub use installer::{versioned_dir_name, Installer, Resolved};
pub use repo::{
    select_version, verify_checksum, ArchMeta, ArchiveInfo, HttpPluginRepo, PluginRepo,
    RepoVersion,
};
pub use retry::{with_retry, RetryConfig};

use crate::plugin::types::PluginClass;
use kiln_foundation::PreinstallPlugin;

/// 설치 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlugin {
    pub id: String,
    /// 고정 버전. 없으면 최신 호환 버전
    pub version: Option<String>,
    /// 아카이브 URL. 지정하면 카탈로그를 거치지 않음
    pub url: Option<String>,
    pub class: PluginClass,
}

impl InstallPlugin {
    pub fn new(id: impl Into<String>, class: PluginClass) -> Self {
        Self {
            id: id.into(),
            version: None,
            url: None,
            class,
        }
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(String::from);
        self
    }

    pub fn with_url(mut self, url: Option<&str>) -> Self {
        self.url = url.map(String::from);
        self
    }

    /// 설정의 preinstall 항목에서 (외부 설치 클래스)
    pub fn from_preinstall(entry: &PreinstallPlugin) -> Self {
        Self::new(&entry.id, PluginClass::External)
            .with_version(entry.version.as_deref())
            .with_url(entry.url.as_deref())
    }
}

/// 설치 실패 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// 실패하면 호출 전체가 실패 (호스트 기동 전 필수 플러그인)
    Sync,
    /// 실패는 로그만 남기고 계속
    Async,
}
