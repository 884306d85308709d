//! Plugin 에러 타입
//!
//! - `PluginError`: 호출 단위 실패 (소스, 레지스트리, 설치 등)
//! - `PluginLoadError`: 플러그인 단위 실패 (상태로 기록되는 데이터)

use super::types::{ErrorCode, PluginClass};
use thiserror::Error;

/// Result type alias
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Plugin 에러
#[derive(Error, Debug)]
pub enum PluginError {
    // ========================================================================
    // 파이프라인 / 레지스트리
    // ========================================================================
    #[error("Plugin source failed: {0}")]
    Source(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin {id} is {class} and cannot be terminated at runtime")]
    Protected { id: String, class: PluginClass },

    #[error("Plugin {id} belongs to {parent} and is terminated with it")]
    OwnedByParent { id: String, parent: String },

    #[error("Plugin already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Plugin files at {0} cannot be removed")]
    NotRemovable(String),

    #[error("Process error for {id}: {message}")]
    Process { id: String, message: String },

    // ========================================================================
    // 설치 / 다운로드
    // ========================================================================
    /// 다른 작업이 같은 대상을 받는 중 (에러가 아닌 제어 신호)
    #[error("Download of {0} is already in progress")]
    DuplicateInProgress(String),

    #[error("Plugin {id} version {version} not found")]
    VersionNotFound { id: String, version: String },

    #[error("Plugin {id} has no version compatible with {os}-{arch}")]
    ArchUnsupported { id: String, os: String, arch: String },

    #[error("Plugin {id}@{version} requires host {requirement}")]
    IncompatibleHost {
        id: String,
        version: String,
        requirement: String,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    // ========================================================================
    // 아카이브 / 매니페스트
    // ========================================================================
    #[error("Archive entry escapes target directory: {0}")]
    PathTraversal(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Invalid plugin.json: {0}")]
    Manifest(String),

    // ========================================================================
    // 서명
    // ========================================================================
    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    #[error("Signature verification failed: {0}")]
    Verification(String),

    // ========================================================================
    // 실행
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Foundation(#[from] kiln_foundation::Error),
}

impl PluginError {
    /// 재시도 가능 여부 (다운로드 루프에서 사용)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Download(_) | Self::Timeout(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Foundation(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_duplicate_in_progress(&self) -> bool {
        matches!(self, Self::DuplicateInProgress(_))
    }

    /// 카탈로그에 없는 버전인지 (아키텍처 미지원과 구분)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::VersionNotFound { .. })
    }
}

impl From<reqwest::Error> for PluginError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Download(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            Self::Download(err.to_string())
        }
    }
}

// ============================================================================
// PluginLoadError - 플러그인별 에러 (상태로 기록)
// ============================================================================

/// 플러그인 단위 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct PluginLoadError {
    pub code: ErrorCode,
    pub message: String,
}

impl PluginLoadError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(PluginError::Download("reset".into()).is_retryable());
        assert!(PluginError::HttpStatus {
            status: 503,
            url: "u".into()
        }
        .is_retryable());
        assert!(!PluginError::HttpStatus {
            status: 404,
            url: "u".into()
        }
        .is_retryable());
        assert!(!PluginError::ChecksumMismatch {
            expected: "a".into(),
            actual: "b".into()
        }
        .is_retryable());
        assert!(!PluginError::DuplicateInProgress("x".into()).is_retryable());
    }

    #[test]
    fn test_not_found_is_distinct_from_arch() {
        let missing = PluginError::VersionNotFound {
            id: "p".into(),
            version: "9.9.9".into(),
        };
        let arch = PluginError::ArchUnsupported {
            id: "p".into(),
            os: "linux".into(),
            arch: "riscv64".into(),
        };
        assert!(missing.is_not_found());
        assert!(!arch.is_not_found());
    }

    #[test]
    fn test_load_error_display() {
        let err = PluginLoadError::new(ErrorCode::LegacyFramework, "uses PanelCtrl");
        assert_eq!(err.to_string(), "legacyFramework: uses PanelCtrl");
    }
}
