//! # kiln-foundation
//!
//! Foundation layer for Kiln:
//! - Error: 기반 에러 타입
//! - Config: 플러그인 서브시스템 설정 (PluginsConfig)
//! - Storage: JsonStore (범용)
//! - Logging: tracing subscriber 초기화

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    DownloadConfig, PluginsConfig, PreinstallPlugin, SignatureConfig, DEFAULT_KEY_LISTING_URL,
    DEFAULT_REPOSITORY_URL, PLUGINS_CONFIG_FILE,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Logging (로깅)
// ============================================================================
pub use logging::init_tracing;
