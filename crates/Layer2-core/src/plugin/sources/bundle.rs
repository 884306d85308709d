//! Bundle Source - 이미 찾은 번들을 다시 파이프라인에 태움

use super::{FoundBundle, Source};
use crate::plugin::error::PluginResult;
use crate::plugin::types::{PluginClass, Signature};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 단일 번들 공급원 (디렉토리를 다시 읽지 않음)
pub struct BundleSource {
    class: PluginClass,
    signature: Option<Signature>,
    bundles: Vec<FoundBundle>,
}

impl BundleSource {
    pub fn new(class: PluginClass, bundle: FoundBundle) -> Self {
        Self {
            class,
            signature: None,
            bundles: vec![bundle],
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }
}

#[async_trait]
impl Source for BundleSource {
    fn class(&self) -> PluginClass {
        self.class
    }

    fn default_signature(&self) -> Option<Signature> {
        self.signature.clone()
    }

    async fn discover(&self, _cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>> {
        Ok(self.bundles.clone())
    }
}
