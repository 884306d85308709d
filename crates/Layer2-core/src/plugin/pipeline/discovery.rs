//! Discovery Stage - 공급원 탐색 + 필터

use crate::plugin::error::PluginResult;
use crate::plugin::registry::Registry;
use crate::plugin::sources::{FoundBundle, Source};
use crate::plugin::types::PluginClass;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 탐색 결과 필터
#[async_trait]
pub trait DiscoveryFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// 에러를 반환하면 Discovery 전체가 실패
    async fn apply(&self, class: PluginClass, bundles: Vec<FoundBundle>) -> PluginResult<Vec<FoundBundle>>;
}

/// 이미 등록된 ID + 버전 제거
pub struct DuplicateFilter {
    registry: Arc<dyn Registry>,
}

impl DuplicateFilter {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    async fn is_registered(&self, id: &str, version: &str) -> bool {
        self.registry.plugin(id, Some(version)).await.is_some()
    }
}

#[async_trait]
impl DiscoveryFilter for DuplicateFilter {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    async fn apply(&self, class: PluginClass, bundles: Vec<FoundBundle>) -> PluginResult<Vec<FoundBundle>> {
        let mut kept = Vec::with_capacity(bundles.len());

        for mut bundle in bundles {
            let primary = &bundle.primary.json;
            if self.is_registered(&primary.id, primary.version()).await {
                warn!(
                    plugin_id = %primary.id,
                    version = %primary.version(),
                    %class,
                    "Skipping plugin that is already registered"
                );
                continue;
            }

            let mut children = Vec::with_capacity(bundle.children.len());
            for child in bundle.children.drain(..) {
                if self.is_registered(&child.json.id, child.json.version()).await {
                    warn!(
                        plugin_id = %child.json.id,
                        parent = %bundle.primary.json.id,
                        "Skipping child plugin that is already registered"
                    );
                    continue;
                }
                children.push(child);
            }
            bundle.children = children;
            kept.push(bundle);
        }

        Ok(kept)
    }
}

/// Discovery 단계
pub struct Discovery {
    filters: Vec<Box<dyn DiscoveryFilter>>,
}

impl Discovery {
    pub fn new(filters: Vec<Box<dyn DiscoveryFilter>>) -> Self {
        Self { filters }
    }

    /// 기본 필터 (중복 제거)
    pub fn with_defaults(registry: Arc<dyn Registry>) -> Self {
        Self::new(vec![Box::new(DuplicateFilter::new(registry))])
    }

    pub async fn discover(
        &self,
        source: &dyn Source,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<FoundBundle>> {
        let class = source.class();
        let mut bundles = source.discover(cancel).await?;
        debug!(%class, "Source returned {} bundles", bundles.len());

        for filter in &self.filters {
            bundles = filter.apply(class, bundles).await?;
            debug!(filter = filter.name(), "{} bundles after filter", bundles.len());
        }

        Ok(bundles)
    }
}
