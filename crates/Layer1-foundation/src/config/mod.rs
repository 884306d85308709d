//! Config - 통합 설정 관리
//!
//! - `plugins.rs` - PluginsConfig 플러그인 서브시스템 설정

mod plugins;

pub use plugins::{
    DownloadConfig, PluginsConfig, PreinstallPlugin, SignatureConfig, DEFAULT_KEY_LISTING_URL,
    DEFAULT_REPOSITORY_URL, PLUGINS_CONFIG_FILE,
};
