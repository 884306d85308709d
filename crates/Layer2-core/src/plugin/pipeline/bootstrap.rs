//! Bootstrap Stage - 레코드 생성(Construct) + 후처리(Decorate)

use crate::plugin::assetpath::AssetPath;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::record::Plugin;
use crate::plugin::signature::SignatureCalculator;
use crate::plugin::sources::{FoundBundle, FoundPlugin};
use crate::plugin::types::{ErrorCode, PluginClass, Signature};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Construct
// ============================================================================

/// 번들 -> 플러그인 레코드 (주 플러그인이 먼저, 자식이 뒤)
#[async_trait]
pub trait Constructor: Send + Sync {
    async fn construct(
        &self,
        class: PluginClass,
        default_signature: Option<&Signature>,
        bundle: FoundBundle,
    ) -> PluginResult<Vec<Plugin>>;
}

/// 서명 판정 + 자산 경로 계산
pub struct DefaultConstructor {
    calculator: Arc<dyn SignatureCalculator>,
    assets: AssetPath,
}

impl DefaultConstructor {
    pub fn new(calculator: Arc<dyn SignatureCalculator>, assets: AssetPath) -> Self {
        Self { calculator, assets }
    }

    fn build(
        &self,
        found: FoundPlugin,
        class: PluginClass,
        signature: Signature,
        parent: Option<(&str, &str)>,
    ) -> Plugin {
        let FoundPlugin { mut json, fs } = found;

        let base_url = self.assets.base(&json, class, parent);
        let module = self.assets.module(&json, class, &base_url);

        json.info.logos = self.assets.logos(json.plugin_type, &json.info.logos, &base_url);
        for screenshot in &mut json.info.screenshots {
            screenshot.path = self.assets.relative_url(&base_url, &screenshot.path);
        }

        let mut plugin = Plugin::new(json, fs, class, signature);
        plugin.base_url = base_url;
        plugin.module = module;
        plugin
    }
}

#[async_trait]
impl Constructor for DefaultConstructor {
    async fn construct(
        &self,
        class: PluginClass,
        default_signature: Option<&Signature>,
        bundle: FoundBundle,
    ) -> PluginResult<Vec<Plugin>> {
        let signature = self
            .calculator
            .calculate(class, default_signature, &bundle.primary)
            .await?;

        let FoundBundle { primary, children } = bundle;
        let primary_fs = primary.fs.clone();
        let mut parent = self.build(primary, class, signature.clone(), None);

        let mut plugins = Vec::with_capacity(children.len() + 1);
        let mut built_children = Vec::with_capacity(children.len());
        for child in children {
            let rel = child.fs.relative_to(&primary_fs).ok_or_else(|| {
                PluginError::Source(format!(
                    "{} is not nested under {}",
                    child.fs.base().display(),
                    primary_fs.base().display()
                ))
            })?;

            let mut plugin = self.build(
                child,
                class,
                signature.clone(),
                Some((parent.base_url.as_str(), rel.as_str())),
            );
            plugin.parent = Some(parent.id().to_string());
            parent.children.push(plugin.id().to_string());
            built_children.push(plugin);
        }

        plugins.push(parent);
        plugins.extend(built_children);
        Ok(plugins)
    }
}

// ============================================================================
// Decorate
// ============================================================================

/// 생성된 레코드 후처리
pub trait Decorator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `parent`는 같은 배치에서 만들어진 부모 레코드
    fn decorate(&self, plugin: &mut Plugin, parent: Option<&Plugin>) -> PluginResult<()>;
}

/// 잘 알려진 ID에 짧은 별칭
pub struct AliasDecorator {
    aliases: HashMap<String, String>,
}

/// 기본 별칭 (ID -> 별칭)
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("kiln-testdata-datasource", "testdata"),
    ("kiln-postgresql-datasource", "postgres"),
    ("kiln-pyroscope-datasource", "phlare"),
];

impl AliasDecorator {
    /// 기본 별칭 + 설정 별칭 (설정이 우선)
    pub fn new(extra: &HashMap<String, String>) -> Self {
        let mut aliases: HashMap<String, String> = DEFAULT_ALIASES
            .iter()
            .map(|(id, alias)| (id.to_string(), alias.to_string()))
            .collect();
        aliases.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { aliases }
    }
}

impl Decorator for AliasDecorator {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn decorate(&self, plugin: &mut Plugin, _parent: Option<&Plugin>) -> PluginResult<()> {
        if let Some(alias) = self.aliases.get(plugin.id()) {
            plugin.alias = Some(alias.clone());
        }
        Ok(())
    }
}

/// 앱 플러그인의 기본 네비게이션 URL
pub struct AppDefaultNavDecorator {
    app_sub_url: String,
}

impl AppDefaultNavDecorator {
    pub fn new(app_sub_url: impl Into<String>) -> Self {
        Self {
            app_sub_url: app_sub_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Decorator for AppDefaultNavDecorator {
    fn name(&self) -> &'static str {
        "app-default-nav"
    }

    fn decorate(&self, plugin: &mut Plugin, _parent: Option<&Plugin>) -> PluginResult<()> {
        if !plugin.is_app() {
            return Ok(());
        }

        let id = plugin.json.id.clone();
        let mut nav_url = None;

        for include in &mut plugin.json.includes {
            if include.is_page() && include.slug.is_empty() {
                include.slug = slugify(&include.name);
            }
            if !include.default_nav {
                continue;
            }

            if include.is_page() {
                nav_url = Some(format!(
                    "{}/plugins/{}/page/{}",
                    self.app_sub_url, id, include.slug
                ));
            } else if include.is_dashboard() {
                if include.uid.is_empty() {
                    warn!(
                        plugin_id = %id,
                        include = %include.name,
                        "Default nav dashboard has no uid, leaving nav URL empty"
                    );
                    continue;
                }
                nav_url = Some(format!("{}/d/{}", self.app_sub_url, include.uid));
            }
        }

        if let Some(url) = nav_url {
            plugin.default_nav_url = url;
        }
        Ok(())
    }
}

/// 앱의 자식 플러그인: 부모 base URL 상속 + 부모 기준 모듈 경로
pub struct AppChildDecorator;

impl Decorator for AppChildDecorator {
    fn name(&self) -> &'static str {
        "app-child"
    }

    fn decorate(&self, plugin: &mut Plugin, parent: Option<&Plugin>) -> PluginResult<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if !parent.is_app() {
            return Ok(());
        }

        let rel = plugin.fs.relative_to(&parent.fs).ok_or_else(|| {
            PluginError::Source(format!(
                "{} is not nested under app {}",
                plugin.id(),
                parent.id()
            ))
        })?;

        plugin.base_url = parent.base_url.clone();
        plugin.module = if parent.is_core() {
            format!("core:plugin/{}/{}", parent.id(), rel)
        } else {
            format!("public/plugins/{}/{}/module.js", parent.id(), rel)
        };
        plugin.included_in_app_id = Some(parent.id().to_string());
        Ok(())
    }
}

/// 소문자, 영숫자 외 문자는 `-`로
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Bootstrap 단계
pub struct Bootstrap {
    constructor: Box<dyn Constructor>,
    decorators: Vec<Box<dyn Decorator>>,
}

impl Bootstrap {
    pub fn new(constructor: Box<dyn Constructor>, decorators: Vec<Box<dyn Decorator>>) -> Self {
        Self {
            constructor,
            decorators,
        }
    }

    pub async fn bootstrap(
        &self,
        class: PluginClass,
        default_signature: Option<&Signature>,
        bundles: Vec<FoundBundle>,
    ) -> Vec<Plugin> {
        let mut plugins = Vec::new();

        for bundle in bundles {
            let id = bundle.primary.json.id.clone();
            match self.constructor.construct(class, default_signature, bundle).await {
                Ok(built) => plugins.extend(built),
                Err(e) => {
                    warn!(plugin_id = %id, %class, "Skipping plugin bundle: {}", e);
                }
            }
        }

        for i in 0..plugins.len() {
            let parent_index = plugins[i]
                .parent
                .as_deref()
                .and_then(|parent_id| plugins[..i].iter().position(|p| p.id() == parent_id));

            let (before, rest) = plugins.split_at_mut(i);
            let plugin = &mut rest[0];
            let parent = parent_index.map(|j| &before[j]);

            for decorator in &self.decorators {
                if let Err(e) = decorator.decorate(plugin, parent) {
                    warn!(
                        plugin_id = %plugin.id(),
                        decorator = decorator.name(),
                        "Decoration failed: {}",
                        e
                    );
                    plugin.set_error(ErrorCode::DecorationFailed, e.to_string());
                }
            }
        }

        debug!(%class, "Bootstrapped {} plugins", plugins.len());
        plugins
    }
}
