//! CDN Source - 에셋을 CDN에서 제공하는 플러그인
//!
//! plugin.json 메타데이터는 로컬 디렉토리에서 읽고, 에셋 경로는 CDN 기준으로 계산됩니다.

use super::{FoundBundle, LocalFinder, Source};
use crate::plugin::error::PluginResult;
use crate::plugin::types::{PluginClass, Signature, SignatureType};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// CDN 플러그인의 기본 서명 조직
pub const CDN_SIGNING_ORG: &str = "Kiln Labs";

/// CDN 공급원
pub struct CdnSource {
    paths: Vec<PathBuf>,
    finder: LocalFinder,
}

impl CdnSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            finder: LocalFinder::new(),
        }
    }
}

#[async_trait]
impl Source for CdnSource {
    fn class(&self) -> PluginClass {
        PluginClass::Cdn
    }

    /// CDN 배포는 배포 시점에 검증되므로 서명 계산을 건너뜀
    fn default_signature(&self) -> Option<Signature> {
        Some(Signature::valid(SignatureType::Kiln, CDN_SIGNING_ORG))
    }

    async fn discover(&self, cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>> {
        self.finder.find(&self.paths, false, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::types::SignatureStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cdn_source() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("acme-panel");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("plugin.json"),
            r#"{"id":"acme-panel","type":"panel","name":"Acme","info":{"version":"1.0.0"}}"#,
        )
        .unwrap();

        let source = CdnSource::new(vec![temp.path().to_path_buf()]);
        assert_eq!(source.class(), PluginClass::Cdn);

        let signature = source.default_signature().unwrap();
        assert_eq!(signature.status, SignatureStatus::Valid);
        assert_eq!(signature.signing_org, CDN_SIGNING_ORG);

        let bundles = source.discover(&CancellationToken::new()).await.unwrap();
        assert_eq!(bundles.len(), 1);
        assert!(!bundles[0].primary.fs.supports_removal());
    }
}
