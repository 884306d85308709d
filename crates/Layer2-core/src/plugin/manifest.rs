//! Plugin Manifest - plugin.json 메타데이터 정의
//!
//! 플러그인 디렉토리 루트 또는 `dist/` 아래의 `plugin.json`을 읽습니다.

use super::error::{PluginError, PluginResult};
use super::types::PluginType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 매니페스트 파일명
pub const PLUGIN_JSON: &str = "plugin.json";

/// 빌드 산출물 디렉토리
pub const DIST_DIR: &str = "dist";

// ============================================================================
// PluginJson
// ============================================================================

/// plugin.json 내용
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginJson {
    pub id: String,

    #[serde(rename = "type")]
    pub plugin_type: PluginType,

    pub name: String,

    #[serde(default)]
    pub info: PluginInfo,

    #[serde(default)]
    pub dependencies: Dependencies,

    #[serde(default)]
    pub includes: Vec<Include>,

    /// 백엔드 프로세스 보유 여부
    #[serde(default)]
    pub backend: bool,

    /// 백엔드 실행 파일 이름 (OS/아키텍처 접미사 제외)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// 외부 서비스 권한 요구사항
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<IamRequirements>,

    /// 선언된 별칭
    #[serde(default, rename = "aliasIDs")]
    pub alias_ids: Vec<String>,
}

impl PluginJson {
    /// 바이트에서 파싱 + 검증
    pub fn from_slice(bytes: &[u8]) -> PluginResult<Self> {
        let json: PluginJson =
            serde_json::from_slice(bytes).map_err(|e| PluginError::Manifest(e.to_string()))?;
        json.validate()?;
        Ok(json)
    }

    /// 필수 필드 검증
    pub fn validate(&self) -> PluginResult<()> {
        if self.id.is_empty() {
            return Err(PluginError::Manifest("missing id".into()));
        }
        if !is_valid_plugin_id(&self.id) {
            return Err(PluginError::Manifest(format!("invalid id {:?}", self.id)));
        }
        if self.name.is_empty() {
            return Err(PluginError::Manifest(format!("{} has no name", self.id)));
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    /// 의존하는 플러그인 ID 목록
    pub fn plugin_dependencies(&self) -> Vec<String> {
        self.dependencies
            .plugins
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }
}

/// 영숫자로 시작하고 영숫자, `-`, `_`, `.`만 포함
fn is_valid_plugin_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// 메타 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    #[serde(default)]
    pub author: InfoLink,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub links: Vec<InfoLink>,

    #[serde(default)]
    pub logos: Logos,

    #[serde(default)]
    pub screenshots: Vec<Screenshot>,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub updated: String,

    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoLink {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logos {
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub large: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Screenshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
}

/// 의존성 선언
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// 호스트 버전 요구사항 (semver range)
    #[serde(default)]
    pub host_dependency: String,

    #[serde(default)]
    pub plugins: Vec<PluginDependency>,
}

/// 다른 플러그인 의존성
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDependency {
    pub id: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub plugin_type: Option<PluginType>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// 앱 플러그인이 포함하는 페이지/대시보드
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Include {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: String,

    #[serde(rename = "type", default)]
    pub include_type: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub add_to_nav: bool,

    #[serde(default)]
    pub default_nav: bool,

    #[serde(default)]
    pub slug: String,

    #[serde(default)]
    pub uid: String,
}

impl Include {
    pub fn is_page(&self) -> bool {
        self.include_type == "page"
    }

    pub fn is_dashboard(&self) -> bool {
        self.include_type == "dashboard"
    }
}

/// 외부 서비스 권한 요구사항
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRequirements {
    #[serde(default)]
    pub permissions: Vec<IamPermission>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPermission {
    pub action: String,
    #[serde(default)]
    pub scope: String,
}

// ============================================================================
// 읽기
// ============================================================================

/// 디렉토리에서 plugin.json 경로 찾기 (루트 우선, 없으면 dist/)
pub fn locate_plugin_json(dir: &Path) -> Option<PathBuf> {
    let root = dir.join(PLUGIN_JSON);
    if root.is_file() {
        return Some(root);
    }
    let dist = dir.join(DIST_DIR).join(PLUGIN_JSON);
    if dist.is_file() {
        return Some(dist);
    }
    None
}

/// plugin.json 읽기 (비동기)
pub async fn read_plugin_json(dir: &Path) -> PluginResult<PluginJson> {
    let path = locate_plugin_json(dir).ok_or_else(|| {
        PluginError::Manifest(format!("{} not found in {}", PLUGIN_JSON, dir.display()))
    })?;
    let bytes = tokio::fs::read(&path).await?;
    PluginJson::from_slice(&bytes)
}

/// plugin.json 읽기 (블로킹 컨텍스트용)
pub fn read_plugin_json_blocking(dir: &Path) -> PluginResult<PluginJson> {
    let path = locate_plugin_json(dir).ok_or_else(|| {
        PluginError::Manifest(format!("{} not found in {}", PLUGIN_JSON, dir.display()))
    })?;
    let bytes = std::fs::read(&path)?;
    PluginJson::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APP_JSON: &str = r#"{
        "id": "acme-monitor-app",
        "type": "app",
        "name": "Acme Monitor",
        "info": {"version": "1.4.0", "logos": {"small": "img/logo.svg", "large": ""}},
        "dependencies": {
            "hostDependency": ">=10.0.0",
            "plugins": [{"id": "acme-metrics-datasource", "type": "datasource", "name": "Metrics"}]
        },
        "includes": [{"type": "page", "name": "Overview", "defaultNav": true}],
        "backend": true,
        "executable": "gpx_monitor"
    }"#;

    #[test]
    fn test_parse_app_manifest() {
        let json = PluginJson::from_slice(APP_JSON.as_bytes()).unwrap();
        assert_eq!(json.id, "acme-monitor-app");
        assert_eq!(json.plugin_type, PluginType::App);
        assert_eq!(json.version(), "1.4.0");
        assert_eq!(json.plugin_dependencies(), vec!["acme-metrics-datasource"]);
        assert!(json.includes[0].is_page());
        assert!(json.includes[0].default_nav);
        assert_eq!(json.executable.as_deref(), Some("gpx_monitor"));
    }

    #[test]
    fn test_rejects_bad_manifests() {
        assert!(PluginJson::from_slice(b"{}").is_err());
        assert!(PluginJson::from_slice(br#"{"id":"x","type":"widget","name":"X"}"#).is_err());
        assert!(PluginJson::from_slice(br#"{"id":"../x","type":"panel","name":"X"}"#).is_err());
        assert!(PluginJson::from_slice(br#"{"id":"","type":"panel","name":"X"}"#).is_err());
    }

    #[tokio::test]
    async fn test_read_prefers_root_then_dist() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join(DIST_DIR);
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(
            dist.join(PLUGIN_JSON),
            r#"{"id":"from-dist","type":"panel","name":"Dist"}"#,
        )
        .unwrap();

        let json = read_plugin_json(temp.path()).await.unwrap();
        assert_eq!(json.id, "from-dist");

        std::fs::write(
            temp.path().join(PLUGIN_JSON),
            r#"{"id":"from-root","type":"panel","name":"Root"}"#,
        )
        .unwrap();
        let json = read_plugin_json_blocking(temp.path()).unwrap();
        assert_eq!(json.id, "from-root");
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            read_plugin_json(temp.path()).await,
            Err(PluginError::Manifest(_))
        ));
    }
}
