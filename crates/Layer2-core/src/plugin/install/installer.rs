//! Installer - 버전 해석과 다운로드 캐시
//!
//! 디스크 레이아웃:
//! - `{root}/{id}-{version}`: 정식 설치 위치 (새 설치는 항상 여기로)
//! - `{root}/{id}`: 레거시 설치, 읽기 전용 폴백
//! - `{root}/.tmp-{id}-{uuid}`: 해제 중인 다운로드. 끝나면 정식 위치로 rename

use super::archive::{ArchiveExtractor, ExtractedPluginArchive};
use super::cache::{InstallMetrics, VersionCache};
use super::compat::CompatOpts;
use super::repo::PluginRepo;
use super::InstallPlugin;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::manifest::read_plugin_json;
use dashmap::DashMap;
use std::collections::HashSet;
use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = PluginResult<Option<Resolved>>> + Send + 'a>>;

/// 해석된 설치 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: String,
    pub version: String,
    pub path: PathBuf,
    /// 재귀적으로 해석된 의존성
    pub dependencies: Vec<Resolved>,
}

impl Resolved {
    /// 자신과 모든 의존성의 설치 경로
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.path.clone()];
        for dep in &self.dependencies {
            paths.extend(dep.paths());
        }
        paths
    }
}

// ============================================================================
// 진행 중 다운로드 추적
// ============================================================================

struct InFlightGuard {
    in_flight: Arc<DashMap<String, ()>>,
    key: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<DashMap<String, ()>>, key: String) -> PluginResult<Self> {
        use dashmap::mapref::entry::Entry;

        match in_flight.entry(key.clone()) {
            Entry::Occupied(_) => Err(PluginError::DuplicateInProgress(key)),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self {
                    in_flight: Arc::clone(in_flight),
                    key,
                })
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

// ============================================================================
// Installer
// ============================================================================

/// 설치 요청을 로컬 경로로 해석
pub struct Installer {
    plugins_dir: PathBuf,
    repo: Arc<dyn PluginRepo>,
    extractor: ArchiveExtractor,
    compat: CompatOpts,
    versions: Arc<VersionCache>,
    metrics: Arc<InstallMetrics>,
    in_flight: Arc<DashMap<String, ()>>,
}

impl Installer {
    pub fn new(
        plugins_dir: impl Into<PathBuf>,
        repo: Arc<dyn PluginRepo>,
        compat: CompatOpts,
        versions: Arc<VersionCache>,
        metrics: Arc<InstallMetrics>,
    ) -> Self {
        let plugins_dir = plugins_dir.into();
        Self {
            extractor: ArchiveExtractor::new(&plugins_dir),
            plugins_dir,
            repo,
            compat,
            versions,
            metrics,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn metrics(&self) -> &Arc<InstallMetrics> {
        &self.metrics
    }

    pub fn versions(&self) -> &Arc<VersionCache> {
        &self.versions
    }

    /// 설치 요청 하나를 보장
    ///
    /// 같은 대상을 다른 작업이 이미 받고 있으면 `Ok(None)`.
    pub async fn ensure(
        &self,
        spec: &InstallPlugin,
        cancel: &CancellationToken,
    ) -> PluginResult<Option<Resolved>> {
        let mut visited = HashSet::new();
        let resolution = self.resolve(
            &spec.id,
            spec.version.as_deref(),
            spec.url.as_deref(),
            &mut visited,
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            result = resolution => result,
        };

        match result {
            Err(e) if e.is_duplicate_in_progress() => {
                info!(plugin_id = %spec.id, "Install already in progress elsewhere, skipping");
                self.metrics.record_duplicate();
                Ok(None)
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e)
            }
            ok => ok,
        }
    }

    fn resolve<'a>(
        &'a self,
        id: &'a str,
        version: Option<&'a str>,
        url: Option<&'a str>,
        visited: &'a mut HashSet<String>,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            if !visited.insert(id.to_string()) {
                debug!(plugin_id = %id, "Already resolved in this request");
                return Ok(None);
            }

            // 버전 미지정: 메모리 캐시에서 해석된 버전 조회
            let version = match version {
                Some(v) => Some(v.to_string()),
                None => self.versions.get(id, url),
            };

            // 캐시 조회 전에 진행 중 키를 잡아야 다른 작업의 설치를 적중으로 보지 않음
            let key = match version.as_deref() {
                Some(v) => versioned_dir_name(id, v),
                None => format!("{}@{}", id, url.unwrap_or_default()),
            };
            let guard = InFlightGuard::acquire(&self.in_flight, key)?;

            let cached = match version.as_deref() {
                Some(v) => self.cached_install(id, v).await,
                None => None,
            };
            let installed = match cached {
                Some(hit) => {
                    info!(plugin_id = %id, version = %hit.version, path = %hit.path.display(), "Plugin cache hit");
                    self.metrics.record_cache_hit();
                    hit
                }
                None => self.download(id, version.as_deref(), url).await?,
            };
            drop(guard);

            // 캐시 적중이어도 의존성은 확인 (대부분 그 자체로 캐시 적중)
            let mut dependencies = Vec::new();
            for dep in &installed.dependencies {
                let dep_version = dep.version.as_deref().filter(|v| is_exact_version(v));
                match self.resolve(&dep.id, dep_version, None, &mut *visited).await {
                    Ok(Some(resolved)) => dependencies.push(resolved),
                    Ok(None) => {}
                    Err(e) if e.is_duplicate_in_progress() => {
                        debug!(plugin_id = %dep.id, "Dependency install already in progress");
                    }
                    Err(e) => {
                        warn!(plugin_id = %id, dependency = %dep.id, "Dependency install failed: {}", e);
                        return Err(e);
                    }
                }
            }

            Ok(Some(Resolved {
                id: installed.id,
                version: installed.version,
                path: installed.path,
                dependencies,
            }))
        })
    }

    /// 캐시 적중 확인. 버전 디렉토리가 레거시 디렉토리보다 우선
    ///
    /// 손상되었거나 없는 plugin.json은 캐시 미스입니다.
    async fn cached_install(&self, id: &str, version: &str) -> Option<ExtractedPluginArchive> {
        let versioned = self.plugins_dir.join(versioned_dir_name(id, version));
        if let Some(hit) = installed_at(&versioned, id, version).await {
            return Some(hit);
        }
        installed_at(&self.plugins_dir.join(id), id, version).await
    }

    async fn download(
        &self,
        id: &str,
        version: Option<&str>,
        url: Option<&str>,
    ) -> PluginResult<ExtractedPluginArchive> {
        // 명시적 URL은 카탈로그를 거치지 않음
        let (download_url, checksum) = match url {
            Some(url) => (url.to_string(), None),
            None => {
                let info = self.repo.archive_info(id, version, &self.compat).await?;
                (info.url, info.checksum)
            }
        };

        let bytes = self.repo.download(&download_url, checksum.as_deref()).await?;
        self.metrics.record_download();

        // 항상 임시 디렉토리에 풀고 정식 위치로 이동
        let temp_name = format!(".tmp-{}-{}", id, uuid::Uuid::new_v4());
        let extracted = self.extract(id, temp_name, bytes).await?;

        let canonical = match version {
            Some(version) => {
                if extracted.version != version {
                    warn!(
                        plugin_id = %id,
                        requested = %version,
                        actual = %extracted.version,
                        "Downloaded archive declares a different version"
                    );
                }
                self.plugins_dir.join(versioned_dir_name(id, version))
            }
            None => self
                .plugins_dir
                .join(versioned_dir_name(id, &extracted.version)),
        };

        let temp_path = extracted.path.clone();
        let installed = match self.promote(extracted, canonical).await {
            Ok(installed) => installed,
            Err(e) => {
                remove_quietly(&temp_path).await;
                return Err(e);
            }
        };

        if version.is_none() {
            self.versions.set(id, url, installed.version.clone());
        }
        info!(plugin_id = %id, version = %installed.version, "Installed plugin");
        Ok(installed)
    }

    /// 임시 해제 결과를 정식 위치로 원자적 이동
    ///
    /// 정식 위치에 이미 유효한 설치가 있으면 그것을 유지합니다.
    async fn promote(
        &self,
        mut extracted: ExtractedPluginArchive,
        canonical: PathBuf,
    ) -> PluginResult<ExtractedPluginArchive> {
        if installed_at(&canonical, &extracted.id, &extracted.version)
            .await
            .is_some()
        {
            debug!(path = %canonical.display(), "Canonical install already exists, discarding download");
            remove_quietly(&extracted.path).await;
        } else {
            if tokio::fs::try_exists(&canonical).await.unwrap_or(false) {
                debug!(path = %canonical.display(), "Replacing broken install");
                tokio::fs::remove_dir_all(&canonical).await?;
            }
            if let Err(e) = tokio::fs::rename(&extracted.path, &canonical).await {
                // 동시에 다른 해석이 먼저 옮긴 경우
                if !tokio::fs::try_exists(&canonical).await.unwrap_or(false) {
                    return Err(e.into());
                }
                remove_quietly(&extracted.path).await;
            }
        }

        extracted.path = canonical;
        Ok(extracted)
    }

    async fn extract(
        &self,
        id: &str,
        dir_name: String,
        bytes: Vec<u8>,
    ) -> PluginResult<ExtractedPluginArchive> {
        let extractor = self.extractor.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            extractor.extract(&id, &move |_: &str| dir_name.clone(), Cursor::new(bytes))
        })
        .await
        .map_err(|e| PluginError::InvalidArchive(format!("extraction task failed: {}", e)))?
    }
}

/// `dir`에 `id@version` 설치가 온전히 있으면 그 매니페스트 정보
async fn installed_at(dir: &Path, id: &str, version: &str) -> Option<ExtractedPluginArchive> {
    let json = read_plugin_json(dir).await.ok()?;
    if json.id != id || json.version() != version {
        debug!(plugin_id = %id, path = %dir.display(), "Installed plugin does not match request");
        return None;
    }
    Some(ExtractedPluginArchive {
        id: json.id.clone(),
        version: version.to_string(),
        dependencies: json.dependencies.plugins.clone(),
        path: dir.to_path_buf(),
    })
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// 정식 설치 디렉토리 이름
pub fn versioned_dir_name(id: &str, version: &str) -> String {
    format!("{}-{}", id, version)
}

/// 범위가 아닌 정확한 버전인지
fn is_exact_version(version: &str) -> bool {
    semver::Version::parse(version.trim_start_matches('v')).is_ok()
}
