//! Asset Path - 플러그인 base URL / 모듈 경로 계산

use super::manifest::{Logos, PluginJson};
use super::types::{PluginClass, PluginType};

/// 플러그인 자산 경로 계산기
#[derive(Debug, Clone, Default)]
pub struct AssetPath {
    cdn_base_url: Option<String>,
}

impl AssetPath {
    pub fn new(cdn_base_url: Option<String>) -> Self {
        Self {
            cdn_base_url: cdn_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// base URL
    ///
    /// `parent`는 중첩 자식일 때 (부모 base URL, 부모 기준 상대 디렉토리)
    pub fn base(&self, json: &PluginJson, class: PluginClass, parent: Option<(&str, &str)>) -> String {
        if class == PluginClass::Core {
            return format!("public/app/plugins/{}/{}", json.plugin_type, json.id);
        }

        if let Some((parent_base, rel)) = parent {
            return join_url(parent_base, rel);
        }

        match (class, &self.cdn_base_url) {
            (PluginClass::Cdn, Some(cdn)) => format!(
                "{}/{}/{}/public/plugins/{}",
                cdn,
                json.id,
                json.version(),
                json.id
            ),
            _ => format!("public/plugins/{}", json.id),
        }
    }

    /// 프런트엔드 모듈 진입점
    pub fn module(&self, json: &PluginJson, class: PluginClass, base: &str) -> String {
        if class == PluginClass::Core {
            return format!("core:plugin/{}", json.id);
        }
        join_url(base, "module.js")
    }

    /// base 기준 상대 자산 경로 해석 (절대 URL은 그대로)
    pub fn relative_url(&self, base: &str, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
            return path.to_string();
        }
        join_url(base, path)
    }

    /// 로고 경로 (비어 있으면 타입별 기본 아이콘)
    pub fn logos(&self, plugin_type: PluginType, logos: &Logos, base: &str) -> Logos {
        let resolve = |path: &str| {
            if path.is_empty() {
                default_logo(plugin_type)
            } else {
                self.relative_url(base, path)
            }
        };
        Logos {
            small: resolve(&logos.small),
            large: resolve(&logos.large),
        }
    }
}

/// 타입별 기본 아이콘
pub fn default_logo(plugin_type: PluginType) -> String {
    format!("public/img/icn-{}.svg", plugin_type)
}

fn join_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches("./").trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(id: &str, plugin_type: &str, version: &str) -> PluginJson {
        PluginJson::from_slice(
            format!(
                r#"{{"id":"{}","type":"{}","name":"{}","info":{{"version":"{}"}}}}"#,
                id, plugin_type, id, version
            )
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_core_paths() {
        let assets = AssetPath::default();
        let j = json("loki", "datasource", "");
        let base = assets.base(&j, PluginClass::Core, None);
        assert_eq!(base, "public/app/plugins/datasource/loki");
        assert_eq!(assets.module(&j, PluginClass::Core, &base), "core:plugin/loki");
    }

    #[test]
    fn test_external_paths() {
        let assets = AssetPath::default();
        let j = json("test-datasource", "datasource", "1.0.0");
        let base = assets.base(&j, PluginClass::External, None);
        assert_eq!(base, "public/plugins/test-datasource");
        assert_eq!(
            assets.module(&j, PluginClass::External, &base),
            "public/plugins/test-datasource/module.js"
        );

        let child = json("test-panel", "panel", "1.0.0");
        let child_base = assets.base(&child, PluginClass::External, Some((&base, "nested")));
        assert_eq!(child_base, "public/plugins/test-datasource/nested");
    }

    #[test]
    fn test_cdn_paths() {
        let assets = AssetPath::new(Some("https://cdn.example.com/".into()));
        let j = json("acme-panel", "panel", "2.1.0");
        let base = assets.base(&j, PluginClass::Cdn, None);
        assert_eq!(
            base,
            "https://cdn.example.com/acme-panel/2.1.0/public/plugins/acme-panel"
        );
        assert_eq!(
            assets.module(&j, PluginClass::Cdn, &base),
            "https://cdn.example.com/acme-panel/2.1.0/public/plugins/acme-panel/module.js"
        );
        assert_eq!(
            assets.relative_url(&base, "img/logo.svg"),
            "https://cdn.example.com/acme-panel/2.1.0/public/plugins/acme-panel/img/logo.svg"
        );
    }

    #[test]
    fn test_logos() {
        let assets = AssetPath::default();
        let logos = Logos {
            small: "img/small.svg".into(),
            large: String::new(),
        };
        let resolved = assets.logos(PluginType::Panel, &logos, "public/plugins/acme-panel");
        assert_eq!(resolved.small, "public/plugins/acme-panel/img/small.svg");
        assert_eq!(resolved.large, "public/img/icn-panel.svg");
    }
}
