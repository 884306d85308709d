//! Plugin Record - 로드된 플러그인 레코드
//!
//! Bootstrap에서 한 번 생성되고, Validation/Initialization에서 상태와
//! 클라이언트 핸들만 바뀐 뒤 레지스트리에 들어갑니다.
//! 부모/자식 관계는 ID로만 참조합니다 (레지스트리가 arena 역할).

use super::fs::PluginFs;
use super::manifest::PluginJson;
use super::process::{BackendClient, ExternalServiceCredentials};
use super::types::{ErrorCode, PluginClass, PluginStatus, PluginType, Signature};
use std::sync::Arc;

/// 레거시 프런트엔드 프레임워크 검사 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyInfo {
    pub detected: bool,
    /// 사용 중단 안내 숨김 여부
    pub hide_deprecation: bool,
}

/// 플러그인 레코드
#[derive(Debug, Clone)]
pub struct Plugin {
    pub json: PluginJson,
    pub fs: PluginFs,
    pub class: PluginClass,
    pub signature: Signature,

    pub base_url: String,
    pub module: String,

    /// 부모 플러그인 ID (비소유 역참조)
    pub parent: Option<String>,
    /// 자식 플러그인 ID (소유)
    pub children: Vec<String>,
    pub included_in_app_id: Option<String>,

    pub alias: Option<String>,
    pub default_nav_url: String,
    pub legacy: LegacyInfo,

    pub external_service: Option<ExternalServiceCredentials>,
    pub client: Option<Arc<dyn BackendClient>>,

    pub status: PluginStatus,
}

impl Plugin {
    pub fn new(json: PluginJson, fs: PluginFs, class: PluginClass, signature: Signature) -> Self {
        Self {
            json,
            fs,
            class,
            signature,
            base_url: String::new(),
            module: String::new(),
            parent: None,
            children: Vec::new(),
            included_in_app_id: None,
            alias: None,
            default_nav_url: String::new(),
            legacy: LegacyInfo::default(),
            external_service: None,
            client: None,
            status: PluginStatus::Ok,
        }
    }

    pub fn id(&self) -> &str {
        &self.json.id
    }

    pub fn version(&self) -> &str {
        self.json.version()
    }

    pub fn plugin_type(&self) -> PluginType {
        self.json.plugin_type
    }

    pub fn is_core(&self) -> bool {
        self.class == PluginClass::Core
    }

    pub fn is_app(&self) -> bool {
        self.json.plugin_type == PluginType::App
    }

    pub fn is_renderer(&self) -> bool {
        self.json.plugin_type == PluginType::Renderer
    }

    pub fn is_backend(&self) -> bool {
        self.json.backend
    }

    pub fn is_errored(&self) -> bool {
        !self.status.is_ok()
    }

    /// 에러 기록 (먼저 기록된 에러 유지)
    pub fn set_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        if self.status.is_ok() {
            self.status = PluginStatus::Errored {
                code,
                message: message.into(),
            };
        }
    }
}
