//! kiln-core: Plugin runtime for Kiln
//!
//! Layer2 - 플러그인 로더 파이프라인 + 설치 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 공급원 탐색, 서명 검증, 검사, 초기화, 종료
//! - `plugin::install`: 버전 해석, 다운로드 캐시, 아카이브 해제
//! - `plugin::signature`: 서명 매니페스트 검증
//!
//! # 사용 예시
//!
//! ```ignore
//! use kiln_core::plugin::{LoaderServices, PluginLoader, Provisioner};
//!
//! let config = PluginsConfig::load()?;
//! let loader = Arc::new(PluginLoader::with_defaults(&config, services));
//!
//! // 필수 플러그인은 기다리고, 선택 플러그인은 백그라운드에서
//! let provisioner = Provisioner::from_config(&config, loader.clone());
//! let (required, optional) = provisioner.provision(&config, &cancel).await?;
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    ErrorCode, ErrorTracker, Plugin, PluginClass, PluginError, PluginLoader, PluginRegistry,
    PluginResult, PluginSource, PluginStatus, Provisioner, Registry, Source,
};

// Layer1 re-exports
pub use kiln_foundation::{Error, PluginsConfig, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
