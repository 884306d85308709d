//! Local Source - 디렉토리 트리에서 플러그인 탐색

use super::{FoundBundle, FoundPlugin, Source};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::fs::PluginFs;
use crate::plugin::manifest::{PluginJson, DIST_DIR, PLUGIN_JSON};
use crate::plugin::types::PluginClass;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 건너뛸 디렉토리
const SKIP_DIRS: &[&str] = &["node_modules"];

// ============================================================================
// LocalFinder
// ============================================================================

/// plugin.json이 있는 디렉토리를 찾아 번들로 묶음
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFinder;

impl LocalFinder {
    pub fn new() -> Self {
        Self
    }

    /// 경로 목록 탐색
    ///
    /// - 한 디렉토리에 루트와 `dist/` plugin.json이 모두 있으면 `dist/` 사용
    /// - 파싱 실패는 경고 후 건너뜀
    /// - 한 번의 탐색에서 중복된 ID는 첫 번째만 사용
    /// - 중첩된 플러그인은 가장 바깥 플러그인의 자식
    pub async fn find(
        &self,
        paths: &[PathBuf],
        removable: bool,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<FoundBundle>> {
        let mut plugin_dirs = Vec::new();
        let mut visited = HashSet::new();

        for root in paths {
            if !fs::try_exists(root).await.unwrap_or(false) {
                debug!(path = %root.display(), "Plugin path does not exist, skipping");
                continue;
            }
            self.walk(root, &mut visited, &mut plugin_dirs, cancel).await?;
        }

        plugin_dirs.sort();
        plugin_dirs.dedup();

        let mut seen_ids = HashSet::new();
        let mut found: Vec<FoundPlugin> = Vec::new();
        for dir in plugin_dirs {
            let json = match read_json(&dir).await {
                Ok(json) => json,
                Err(e) => {
                    warn!(path = %dir.display(), "Skipping plugin with invalid {}: {}", PLUGIN_JSON, e);
                    continue;
                }
            };
            if !seen_ids.insert(json.id.clone()) {
                warn!(plugin_id = %json.id, path = %dir.display(), "Skipping duplicate plugin");
                continue;
            }

            let fs = if removable {
                PluginFs::removable(&dir)
            } else {
                PluginFs::new(&dir)
            };
            found.push(FoundPlugin { json, fs });
        }

        let bundles = group_bundles(found);
        info!("Found {} plugin bundles", bundles.len());
        Ok(bundles)
    }

    async fn walk(
        &self,
        root: &Path,
        visited: &mut HashSet<PathBuf>,
        plugin_dirs: &mut Vec<PathBuf>,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(PluginError::Cancelled);
            }

            // 심볼릭 링크 순환 방지
            let canonical = fs::canonicalize(&dir).await.unwrap_or_else(|_| dir.clone());
            if !visited.insert(canonical) {
                continue;
            }

            let dist = dir.join(DIST_DIR);
            let scan_dir = if fs::try_exists(dist.join(PLUGIN_JSON)).await.unwrap_or(false) {
                plugin_dirs.push(dist.clone());
                dist
            } else {
                if fs::try_exists(dir.join(PLUGIN_JSON)).await.unwrap_or(false) {
                    plugin_dirs.push(dir.clone());
                }
                dir
            };

            let mut entries = match fs::read_dir(&scan_dir).await {
                Ok(entries) => entries,
                Err(e) if scan_dir == root => {
                    return Err(PluginError::Source(format!(
                        "failed to read {}: {}",
                        root.display(),
                        e
                    )));
                }
                Err(e) => {
                    warn!(path = %scan_dir.display(), "Failed to read directory: {}", e);
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || SKIP_DIRS.contains(&&*name) {
                    continue;
                }

                let path = entry.path();
                // 링크를 따라가서 디렉토리인지 확인
                if fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
                    stack.push(path);
                }
            }
        }

        Ok(())
    }
}

async fn read_json(dir: &Path) -> PluginResult<PluginJson> {
    let bytes = fs::read(dir.join(PLUGIN_JSON)).await?;
    PluginJson::from_slice(&bytes)
}

/// 경로 기준으로 가장 바깥 플러그인에 자식을 붙임
fn group_bundles(mut found: Vec<FoundPlugin>) -> Vec<FoundBundle> {
    found.sort_by(|a, b| a.fs.base().cmp(b.fs.base()));

    let mut bundles: Vec<FoundBundle> = Vec::new();
    for plugin in found {
        let owner = bundles
            .iter_mut()
            .find(|b| is_nested(plugin.fs.base(), b.primary.fs.base()));

        match owner {
            Some(bundle) => {
                debug!(
                    plugin_id = %plugin.json.id,
                    parent = %bundle.primary.json.id,
                    "Found nested plugin"
                );
                bundle.children.push(plugin);
            }
            None => bundles.push(FoundBundle::new(plugin)),
        }
    }
    bundles
}

/// `child`가 `parent` 플러그인 디렉토리 아래인지 (`dist/` 루트면 그 상위 기준)
fn is_nested(child: &Path, parent: &Path) -> bool {
    let parent_root = match parent.file_name() {
        Some(name) if name == DIST_DIR => parent.parent().unwrap_or(parent),
        _ => parent,
    };
    child != parent && child.starts_with(parent_root)
}

// ============================================================================
// LocalSource
// ============================================================================

/// 로컬 디렉토리 공급원
pub struct LocalSource {
    paths: Vec<PathBuf>,
    class: PluginClass,
    finder: LocalFinder,
}

impl LocalSource {
    pub fn new(class: PluginClass, paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            class,
            finder: LocalFinder::new(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[async_trait]
impl Source for LocalSource {
    fn class(&self) -> PluginClass {
        self.class
    }

    async fn discover(&self, cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>> {
        // 외부 설치 플러그인만 런타임 삭제 대상
        let removable = self.class == PluginClass::External;
        self.finder.find(&self.paths, removable, cancel).await
    }
}
