//! Plugin Types - 클래스, 타입, 서명, 상태

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PluginClass - 플러그인 출처 분류
// ============================================================================

/// 플러그인 클래스 (자산 경로 전략과 종료 가능 여부를 결정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginClass {
    /// 호스트에 내장
    Core,
    /// 호스트와 함께 배포
    Bundled,
    /// 외부 설치
    External,
    /// CDN 호스팅
    Cdn,
}

impl PluginClass {
    /// 런타임 종료가 금지된 클래스
    pub fn is_protected(&self) -> bool {
        matches!(self, PluginClass::Core | PluginClass::Bundled)
    }
}

impl fmt::Display for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginClass::Core => "core",
            PluginClass::Bundled => "bundled",
            PluginClass::External => "external",
            PluginClass::Cdn => "cdn",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// PluginType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Datasource,
    Panel,
    App,
    Renderer,
}

impl PluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Datasource => "datasource",
            PluginType::Panel => "panel",
            PluginType::App => "app",
            PluginType::Renderer => "renderer",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Signature - 서명 판정
// ============================================================================

/// 서명 검증 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    /// 내장 플러그인 (검증 불필요)
    Internal,
    Valid,
    Invalid,
    /// 서명 이후 파일이 변경됨
    Modified,
    Unsigned,
}

impl SignatureStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureStatus::Valid)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, SignatureStatus::Internal)
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignatureStatus::Internal => "internal",
            SignatureStatus::Valid => "valid",
            SignatureStatus::Invalid => "invalid",
            SignatureStatus::Modified => "modified",
            SignatureStatus::Unsigned => "unsigned",
        };
        write!(f, "{}", s)
    }
}

/// 서명 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureType {
    /// 1st party
    Kiln,
    Commercial,
    Community,
    Private,
    PrivateGlob,
}

impl SignatureType {
    pub fn is_private(&self) -> bool {
        matches!(self, SignatureType::Private | SignatureType::PrivateGlob)
    }
}

/// 서명 판정 (상태 + 등급 + 서명 조직)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub status: SignatureStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<SignatureType>,

    #[serde(default)]
    pub signing_org: String,
}

impl Signature {
    pub fn new(status: SignatureStatus) -> Self {
        Self {
            status,
            signature_type: None,
            signing_org: String::new(),
        }
    }

    pub fn internal() -> Self {
        Self::new(SignatureStatus::Internal)
    }

    pub fn unsigned() -> Self {
        Self::new(SignatureStatus::Unsigned)
    }

    pub fn invalid() -> Self {
        Self::new(SignatureStatus::Invalid)
    }

    pub fn modified() -> Self {
        Self::new(SignatureStatus::Modified)
    }

    pub fn valid(signature_type: SignatureType, org: impl Into<String>) -> Self {
        Self {
            status: SignatureStatus::Valid,
            signature_type: Some(signature_type),
            signing_org: org.into(),
        }
    }
}

// ============================================================================
// Status - 플러그인 상태 (로드 후 변경 가능한 유일한 속성)
// ============================================================================

/// 플러그인별 에러 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    SignatureMissing,
    SignatureInvalid,
    SignatureModified,
    LegacyFramework,
    DecorationFailed,
    InitializationFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SignatureMissing => "signatureMissing",
            ErrorCode::SignatureInvalid => "signatureInvalid",
            ErrorCode::SignatureModified => "signatureModified",
            ErrorCode::LegacyFramework => "legacyFramework",
            ErrorCode::DecorationFailed => "decorationFailed",
            ErrorCode::InitializationFailed => "initializationFailed",
        }
    }

    /// 서명 판정에 대응하는 에러 코드
    pub fn for_signature(status: SignatureStatus) -> Option<Self> {
        match status {
            SignatureStatus::Unsigned => Some(ErrorCode::SignatureMissing),
            SignatureStatus::Invalid => Some(ErrorCode::SignatureInvalid),
            SignatureStatus::Modified => Some(ErrorCode::SignatureModified),
            SignatureStatus::Valid | SignatureStatus::Internal => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 플러그인 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Ok,
    Errored { code: ErrorCode, message: String },
}

impl PluginStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PluginStatus::Ok)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            PluginStatus::Ok => None,
            PluginStatus::Errored { code, .. } => Some(*code),
        }
    }
}

impl Default for PluginStatus {
    fn default() -> Self {
        PluginStatus::Ok
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Ok => write!(f, "ok"),
            PluginStatus::Errored { code, message } => write!(f, "errored ({}): {}", code, message),
        }
    }
}
