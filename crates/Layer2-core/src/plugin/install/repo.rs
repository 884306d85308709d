//! Plugin Repo - 카탈로그 조회와 아카이브 다운로드

use super::compat::CompatOpts;
use super::retry::{with_retry, RetryConfig};
use crate::plugin::error::{PluginError, PluginResult};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

// ============================================================================
// 카탈로그 모델
// ============================================================================

/// 카탈로그의 버전 항목
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoVersion {
    pub version: String,

    /// `os-arch` (또는 `any`) -> 메타데이터. 비어 있으면 모든 플랫폼 지원
    #[serde(default)]
    pub arch: HashMap<String, ArchMeta>,

    /// 호스트 버전 요구사항 (semver range)
    #[serde(default)]
    pub host_dependency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchMeta {
    #[serde(default)]
    pub sha256: String,
}

impl RepoVersion {
    pub fn supports(&self, compat: &CompatOpts) -> bool {
        self.arch.is_empty()
            || self.arch.contains_key("any")
            || self.arch.contains_key(&compat.os_arch())
    }

    pub fn host_compatible(&self, compat: &CompatOpts) -> bool {
        let (Some(requirement), Some(host)) = (&self.host_dependency, &compat.host_version) else {
            return true;
        };
        match semver::VersionReq::parse(requirement) {
            Ok(req) => req.matches(host),
            Err(_) => true,
        }
    }

    /// 플랫폼별 체크섬 (없으면 `any`)
    pub fn checksum(&self, compat: &CompatOpts) -> Option<String> {
        self.arch
            .get(&compat.os_arch())
            .or_else(|| self.arch.get("any"))
            .map(|m| m.sha256.clone())
            .filter(|s| !s.is_empty())
    }

    fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    items: Vec<RepoVersion>,
}

/// 다운로드 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub version: String,
    pub url: String,
    pub checksum: Option<String>,
}

// ============================================================================
// 버전 선택
// ============================================================================

/// 호환 버전 선택
///
/// - 버전 지정: 카탈로그에 없으면 `VersionNotFound`, 플랫폼 미지원이면 `ArchUnsupported`
/// - 버전 미지정: 플랫폼/호스트가 호환되는 가장 높은 버전
pub fn select_version(
    id: &str,
    versions: &[RepoVersion],
    requested: Option<&str>,
    compat: &CompatOpts,
) -> PluginResult<RepoVersion> {
    if versions.is_empty() {
        return Err(PluginError::NotFound(id.to_string()));
    }

    if let Some(requested) = requested {
        let wanted = requested.trim_start_matches('v');
        let version = versions
            .iter()
            .find(|v| v.version.trim_start_matches('v') == wanted)
            .ok_or_else(|| PluginError::VersionNotFound {
                id: id.to_string(),
                version: requested.to_string(),
            })?;

        if !version.supports(compat) {
            return Err(arch_unsupported(id, compat));
        }
        if !version.host_compatible(compat) {
            return Err(incompatible_host(id, version));
        }
        return Ok(version.clone());
    }

    let mut sorted: Vec<&RepoVersion> = versions.iter().collect();
    sorted.sort_by(|a, b| b.semver().cmp(&a.semver()));

    if let Some(version) = sorted
        .iter()
        .find(|v| v.supports(compat) && v.host_compatible(compat))
    {
        return Ok((*version).clone());
    }

    match sorted.iter().find(|v| v.supports(compat)) {
        Some(version) => Err(incompatible_host(id, version)),
        None => Err(arch_unsupported(id, compat)),
    }
}

fn arch_unsupported(id: &str, compat: &CompatOpts) -> PluginError {
    PluginError::ArchUnsupported {
        id: id.to_string(),
        os: compat.os.clone(),
        arch: compat.arch.clone(),
    }
}

fn incompatible_host(id: &str, version: &RepoVersion) -> PluginError {
    PluginError::IncompatibleHost {
        id: id.to_string(),
        version: version.version.clone(),
        requirement: version.host_dependency.clone().unwrap_or_default(),
    }
}

/// sha256 체크섬 검증
pub fn verify_checksum(bytes: &[u8], expected: &str) -> PluginResult<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(PluginError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

// ============================================================================
// PluginRepo
// ============================================================================

/// 아카이브 저장소
#[async_trait]
pub trait PluginRepo: Send + Sync {
    /// 카탈로그에서 호환 버전과 다운로드 URL 결정
    async fn archive_info(
        &self,
        id: &str,
        version: Option<&str>,
        compat: &CompatOpts,
    ) -> PluginResult<ArchiveInfo>;

    /// zip 다운로드 (체크섬이 있으면 검증)
    async fn download(&self, url: &str, checksum: Option<&str>) -> PluginResult<Vec<u8>>;
}

/// HTTP 카탈로그 클라이언트
pub struct HttpPluginRepo {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpPluginRepo {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn versions(&self, id: &str) -> PluginResult<Vec<RepoVersion>> {
        let url = format!("{}/plugins/{}/versions", self.base_url, id);
        debug!("Fetching versions for {} from {}", id, url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PluginError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(PluginError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body: VersionsResponse = response.json().await?;
        Ok(body.items)
    }

    fn download_url(&self, id: &str, version: &str, compat: &CompatOpts) -> PluginResult<String> {
        let mut url = url::Url::parse(&format!(
            "{}/plugins/{}/versions/{}/download",
            self.base_url, id, version
        ))
        .map_err(|e| PluginError::Download(format!("bad repository URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("os", &compat.os)
            .append_pair("arch", &compat.arch);
        Ok(url.to_string())
    }
}

#[async_trait]
impl PluginRepo for HttpPluginRepo {
    async fn archive_info(
        &self,
        id: &str,
        version: Option<&str>,
        compat: &CompatOpts,
    ) -> PluginResult<ArchiveInfo> {
        let versions = with_retry(&self.retry, "plugin versions", || self.versions(id)).await?;
        let selected = select_version(id, &versions, version, compat)?;

        Ok(ArchiveInfo {
            url: self.download_url(id, &selected.version, compat)?,
            checksum: selected.checksum(compat),
            version: selected.version,
        })
    }

    async fn download(&self, url: &str, checksum: Option<&str>) -> PluginResult<Vec<u8>> {
        info!("Downloading plugin archive from {}", url);

        let bytes = with_retry(&self.retry, "plugin download", || async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PluginError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await?;

        if let Some(expected) = checksum {
            verify_checksum(&bytes, expected)?;
        }
        Ok(bytes)
    }
}
