//! Signature Calculator - 플러그인 서명 판정
//!
//! MANIFEST.txt 서명 검증 -> 본문 검사 -> 파일 해시 비교 순서로 진행합니다.

use super::manifest::{SignatureManifest, SignedManifest, MANIFEST_FILE};
use super::verifier::ManifestVerifier;
use crate::plugin::error::PluginResult;
use crate::plugin::sources::FoundPlugin;
use crate::plugin::types::{PluginClass, Signature, SignatureType};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// 서명 판정기
#[async_trait]
pub trait SignatureCalculator: Send + Sync {
    /// 판정 불가(I/O 실패 등)일 때만 에러, 신뢰 실패는 판정 결과로 반환
    async fn calculate(
        &self,
        class: PluginClass,
        default_signature: Option<&Signature>,
        plugin: &FoundPlugin,
    ) -> PluginResult<Signature>;
}

/// MANIFEST.txt 기반 기본 판정기
pub struct ManifestCalculator {
    verifier: Arc<ManifestVerifier>,
    app_url: String,
}

impl ManifestCalculator {
    pub fn new(verifier: Arc<ManifestVerifier>, app_url: impl Into<String>) -> Self {
        Self {
            verifier,
            app_url: app_url.into(),
        }
    }

    /// private 서명의 root URL이 호스트 URL을 포함하는지
    fn root_url_matches(&self, manifest: &SignatureManifest) -> bool {
        let app_url = normalize_url(&self.app_url);
        manifest.root_urls.iter().any(|root| {
            let root = normalize_url(root);
            match manifest.signature_type {
                SignatureType::PrivateGlob => glob::Pattern::new(&root)
                    .map(|p| p.matches(&app_url))
                    .unwrap_or(false),
                _ => root == app_url,
            }
        })
    }

    /// 매니페스트 파일 목록과 실제 파일 비교
    async fn files_match(&self, plugin: &FoundPlugin, manifest: &SignatureManifest) -> PluginResult<bool> {
        let id = &plugin.json.id;

        for (path, expected) in &manifest.files {
            if !plugin.fs.exists(path) {
                warn!(plugin_id = %id, file = %path, "Signed file is missing");
                return Ok(false);
            }
            let content = plugin.fs.read(path).await?;
            let actual = hex::encode(Sha256::digest(&content));
            if !actual.eq_ignore_ascii_case(expected) {
                warn!(plugin_id = %id, file = %path, "Signed file hash mismatch");
                return Ok(false);
            }
        }

        let listed: BTreeSet<&str> = manifest.files.keys().map(String::as_str).collect();
        for file in plugin.fs.files().await? {
            if file == MANIFEST_FILE {
                continue;
            }
            if !listed.contains(file.as_str()) {
                warn!(plugin_id = %id, file = %file, "Unsigned file present");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl SignatureCalculator for ManifestCalculator {
    async fn calculate(
        &self,
        class: PluginClass,
        default_signature: Option<&Signature>,
        plugin: &FoundPlugin,
    ) -> PluginResult<Signature> {
        if class == PluginClass::Core {
            return Ok(Signature::internal());
        }
        if let Some(signature) = default_signature {
            return Ok(signature.clone());
        }

        let id = &plugin.json.id;
        if !plugin.fs.exists(MANIFEST_FILE) {
            debug!(plugin_id = %id, "No {} found", MANIFEST_FILE);
            return Ok(Signature::unsigned());
        }

        let text = plugin.fs.read(MANIFEST_FILE).await?;
        let text = String::from_utf8_lossy(&text);

        let signed = match SignedManifest::parse(&text) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(plugin_id = %id, "Invalid signed manifest: {}", e);
                return Ok(Signature::invalid());
            }
        };

        if let Err(e) = self
            .verifier
            .verify(&signed.key_id, signed.body.as_bytes(), &signed.signature)
            .await
        {
            warn!(plugin_id = %id, "Manifest signature rejected: {}", e);
            return Ok(Signature::invalid());
        }

        let manifest = match SignatureManifest::from_body(&signed.body) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(plugin_id = %id, "Unreadable manifest body: {}", e);
                return Ok(Signature::invalid());
            }
        };

        if !manifest.is_supported_version() {
            warn!(plugin_id = %id, version = %manifest.manifest_version, "Unsupported manifest version");
            return Ok(Signature::invalid());
        }

        if manifest.plugin != plugin.json.id || manifest.version != plugin.json.version() {
            warn!(
                plugin_id = %id,
                signed_plugin = %manifest.plugin,
                signed_version = %manifest.version,
                "Manifest does not match plugin.json"
            );
            return Ok(Signature::invalid());
        }

        if manifest.signature_type.is_private() && !self.root_url_matches(&manifest) {
            warn!(plugin_id = %id, app_url = %self.app_url, "Private signature root URLs do not match");
            return Ok(Signature::invalid());
        }

        if !self.files_match(plugin, &manifest).await? {
            return Ok(Signature::modified());
        }

        debug!(plugin_id = %id, org = %manifest.signed_by_org, "Plugin signature valid");
        Ok(Signature::valid(manifest.signature_type, manifest.signed_by_org))
    }
}

fn normalize_url(url: &str) -> String {
    let mut url = url.trim().to_lowercase();
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::fs::PluginFs;
    use crate::plugin::manifest::PluginJson;
    use crate::plugin::signature::keystore::InMemoryKeyStore;
    use crate::plugin::signature::verifier::armor_public_key;
    use crate::plugin::types::SignatureStatus;
    use ed25519_dalek::{Signer, SigningKey};
    use kiln_foundation::SignatureConfig;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    const PLUGIN_JSON: &str = r#"{"id":"acme-panel","type":"panel","name":"Acme","info":{"version":"1.0.0"}}"#;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn calculator(app_url: &str) -> ManifestCalculator {
        let verifier = ManifestVerifier::new(&SignatureConfig::default(), Arc::new(InMemoryKeyStore::new()))
            .with_static_key("test-key", armor_public_key(&signing_key().verifying_key()));
        ManifestCalculator::new(Arc::new(verifier), app_url)
    }

    fn write_plugin(dir: &Path) {
        std::fs::write(dir.join("plugin.json"), PLUGIN_JSON).unwrap();
        std::fs::write(dir.join("module.js"), "export const plugin = {};").unwrap();
    }

    fn sign(dir: &Path, signature_type: &str, root_urls: &[&str], manifest_version: &str) {
        let mut files = BTreeMap::new();
        for name in ["plugin.json", "module.js"] {
            let content = std::fs::read(dir.join(name)).unwrap();
            files.insert(name.to_string(), hex::encode(Sha256::digest(&content)));
        }
        let body = serde_json::to_string_pretty(&serde_json::json!({
            "manifestVersion": manifest_version,
            "signatureType": signature_type,
            "signedByOrg": "acme",
            "signedByOrgName": "Acme Corp",
            "rootUrls": root_urls,
            "plugin": "acme-panel",
            "version": "1.0.0",
            "time": 1_700_000_000_000i64,
            "files": files,
        }))
        .unwrap();
        let signed = SignedManifest {
            key_id: "test-key".into(),
            signature: signing_key().sign(body.as_bytes()).to_bytes().to_vec(),
            body,
        };
        std::fs::write(dir.join(MANIFEST_FILE), signed.to_armored()).unwrap();
    }

    fn found(dir: &Path) -> FoundPlugin {
        FoundPlugin {
            json: PluginJson::from_slice(PLUGIN_JSON.as_bytes()).unwrap(),
            fs: PluginFs::new(dir),
        }
    }

    #[tokio::test]
    async fn test_core_and_default_signature() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        let calc = calculator("http://localhost:3000/");

        let sig = calc.calculate(PluginClass::Core, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Internal);

        let default = Signature::valid(SignatureType::Kiln, "kiln");
        let sig = calc
            .calculate(PluginClass::Cdn, Some(&default), &found(temp.path()))
            .await
            .unwrap();
        assert_eq!(sig, default);
    }

    #[tokio::test]
    async fn test_unsigned_and_valid() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        let calc = calculator("http://localhost:3000/");

        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Unsigned);

        sign(temp.path(), "community", &[], "2.0.0");
        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Valid);
        assert_eq!(sig.signature_type, Some(SignatureType::Community));
        assert_eq!(sig.signing_org, "acme");
    }

    #[tokio::test]
    async fn test_modified_files() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "community", &[], "2.0.0");
        let calc = calculator("http://localhost:3000/");

        std::fs::write(temp.path().join("module.js"), "tampered").unwrap();
        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Modified);

        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "community", &[], "2.0.0");
        std::fs::write(temp.path().join("extra.js"), "injected").unwrap();
        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Modified);
    }

    #[tokio::test]
    async fn test_invalid_signatures() {
        let calc = calculator("http://localhost:3000/");

        // v1 매니페스트
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "community", &[], "1.0.0");
        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Invalid);

        // 변조된 서명 블록
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "community", &[], "2.0.0");
        let text = std::fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap();
        std::fs::write(
            temp.path().join(MANIFEST_FILE),
            text.replace("\"acme\"", "\"evil\""),
        )
        .unwrap();
        let sig = calc.calculate(PluginClass::External, None, &found(temp.path())).await.unwrap();
        assert_eq!(sig.status, SignatureStatus::Invalid);
    }

    #[tokio::test]
    async fn test_private_root_urls() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "private", &["https://kiln.acme.com"], "2.0.0");

        let sig = calculator("https://kiln.acme.com/")
            .calculate(PluginClass::External, None, &found(temp.path()))
            .await
            .unwrap();
        assert_eq!(sig.status, SignatureStatus::Valid);

        let sig = calculator("http://localhost:3000/")
            .calculate(PluginClass::External, None, &found(temp.path()))
            .await
            .unwrap();
        assert_eq!(sig.status, SignatureStatus::Invalid);
    }

    #[tokio::test]
    async fn test_private_glob_root_urls() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path());
        sign(temp.path(), "private-glob", &["https://*.acme.com"], "2.0.0");

        let sig = calculator("https://eu.acme.com")
            .calculate(PluginClass::External, None, &found(temp.path()))
            .await
            .unwrap();
        assert_eq!(sig.status, SignatureStatus::Valid);
    }
}
