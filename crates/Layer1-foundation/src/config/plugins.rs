//! Plugins Config - 플러그인 로더/설치 설정
//!
//! 글로벌(`~/.config/kiln/plugins.json`)과 프로젝트(`.kiln/plugins.json`)
//! 설정을 병합해서 사용합니다. 프로젝트 설정이 우선합니다.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 설정 파일명
pub const PLUGINS_CONFIG_FILE: &str = "plugins.json";

/// 기본 플러그인 카탈로그 주소
pub const DEFAULT_REPOSITORY_URL: &str = "https://plugins.kiln.dev/api";

/// 기본 서명 키 목록 주소
pub const DEFAULT_KEY_LISTING_URL: &str = "https://plugins.kiln.dev/api/plugins/ci/keys";

// ============================================================================
// Plugins Config
// ============================================================================

/// 플러그인 서브시스템 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    /// 외부 플러그인 설치/캐시 루트
    #[serde(default = "default_plugins_path")]
    pub plugins_path: PathBuf,

    /// 개발 모드 (서명 없는 플러그인 전부 허용)
    #[serde(default)]
    pub dev_mode: bool,

    /// 서명 없이 허용할 플러그인 ID (glob 패턴 가능)
    #[serde(default)]
    pub allow_unsigned: Vec<String>,

    /// 레거시 프레임워크 경고를 숨길 플러그인 ID
    #[serde(default)]
    pub hide_legacy_deprecation: Vec<String>,

    /// 호스트 외부 URL (private 서명 검증용)
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// 호스트 서브 경로 (네비게이션 URL prefix)
    #[serde(default)]
    pub app_sub_url: String,

    /// CDN 베이스 URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_base_url: Option<String>,

    /// 플러그인 카탈로그 API
    #[serde(default = "default_repository_url")]
    pub repository_url: String,

    /// 호스트 버전 (호환성 판단)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_version: Option<String>,

    /// 추가 별칭 (ID -> 별칭)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// 서명 키 설정
    #[serde(default)]
    pub signature: SignatureConfig,

    /// 다운로드 재시도 설정
    #[serde(default)]
    pub download: DownloadConfig,

    /// 레거시 프레임워크 검사 제한 시간 (초)
    #[serde(default = "default_legacy_timeout")]
    pub legacy_inspection_timeout_secs: u64,

    /// 비동기 사전 설치 목록 (선택 플러그인)
    #[serde(default)]
    pub preinstall: Vec<PreinstallPlugin>,

    /// 동기 사전 설치 목록 (시작 전 필수)
    #[serde(default)]
    pub preinstall_sync: Vec<PreinstallPlugin>,
}

fn default_plugins_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("kiln").join("plugins"))
        .unwrap_or_else(|| PathBuf::from("data/plugins"))
}

fn default_app_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_repository_url() -> String {
    DEFAULT_REPOSITORY_URL.to_string()
}

fn default_legacy_timeout() -> u64 {
    10
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            plugins_path: default_plugins_path(),
            dev_mode: false,
            allow_unsigned: Vec::new(),
            hide_legacy_deprecation: Vec::new(),
            app_url: default_app_url(),
            app_sub_url: String::new(),
            cdn_base_url: None,
            repository_url: default_repository_url(),
            host_version: None,
            aliases: HashMap::new(),
            signature: SignatureConfig::default(),
            download: DownloadConfig::default(),
            legacy_inspection_timeout_secs: default_legacy_timeout(),
            preinstall: Vec::new(),
            preinstall_sync: Vec::new(),
        }
    }
}

impl PluginsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<PluginsConfig>(PLUGINS_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<PluginsConfig>(PLUGINS_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// 특정 저장소에서 로드 (없으면 기본값)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store
            .load_optional::<PluginsConfig>(PLUGINS_CONFIG_FILE)?
            .unwrap_or_default())
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(PLUGINS_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: PluginsConfig) {
        if other.plugins_path != default_plugins_path() {
            self.plugins_path = other.plugins_path;
        }
        self.dev_mode = self.dev_mode || other.dev_mode;
        extend_unique(&mut self.allow_unsigned, other.allow_unsigned);
        extend_unique(&mut self.hide_legacy_deprecation, other.hide_legacy_deprecation);
        if other.app_url != default_app_url() {
            self.app_url = other.app_url;
        }
        if !other.app_sub_url.is_empty() {
            self.app_sub_url = other.app_sub_url;
        }
        if other.cdn_base_url.is_some() {
            self.cdn_base_url = other.cdn_base_url;
        }
        if other.repository_url != default_repository_url() {
            self.repository_url = other.repository_url;
        }
        if other.host_version.is_some() {
            self.host_version = other.host_version;
        }
        self.aliases.extend(other.aliases);
        self.signature.merge(other.signature);
        self.download.merge(other.download);
        if other.legacy_inspection_timeout_secs != default_legacy_timeout() {
            self.legacy_inspection_timeout_secs = other.legacy_inspection_timeout_secs;
        }
        if !other.preinstall.is_empty() {
            self.preinstall = other.preinstall;
        }
        if !other.preinstall_sync.is_empty() {
            self.preinstall_sync = other.preinstall_sync;
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn plugins_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugins_path = path.into();
        self
    }

    pub fn allow_unsigned(mut self, id: impl Into<String>) -> Self {
        self.allow_unsigned.push(id.into());
        self
    }

    pub fn cdn_base_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_base_url = Some(url.into());
        self
    }

    pub fn host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = Some(version.into());
        self
    }
}

fn extend_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

// ============================================================================
// Signature Config
// ============================================================================

/// 서명 검증 키 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    /// 원격 키 목록 사용 (feature flag, 기본 꺼짐)
    #[serde(default)]
    pub dynamic_keys: bool,

    /// 키 목록 API
    #[serde(default = "default_key_listing_url")]
    pub key_listing_url: String,
}

fn default_key_listing_url() -> String {
    DEFAULT_KEY_LISTING_URL.to_string()
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            dynamic_keys: false,
            key_listing_url: default_key_listing_url(),
        }
    }
}

impl SignatureConfig {
    fn merge(&mut self, other: SignatureConfig) {
        self.dynamic_keys = self.dynamic_keys || other.dynamic_keys;
        if other.key_listing_url != default_key_listing_url() {
            self.key_listing_url = other.key_listing_url;
        }
    }
}

// ============================================================================
// Download Config
// ============================================================================

/// 아카이브 다운로드 재시도 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    5000
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl DownloadConfig {
    fn merge(&mut self, other: DownloadConfig) {
        if other != DownloadConfig::default() {
            *self = other;
        }
    }
}

// ============================================================================
// Preinstall
// ============================================================================

/// 사전 설치 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreinstallPlugin {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
