//! Install Source - 설치 요청 목록을 해석한 뒤 로컬 탐색

use super::{FoundBundle, LocalFinder, Source};
use crate::plugin::error::PluginResult;
use crate::plugin::install::{InstallMode, InstallPlugin, Installer};
use crate::plugin::types::PluginClass;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 설치 요청 공급원
pub struct InstallSource {
    installer: Arc<Installer>,
    specs: Vec<InstallPlugin>,
    class: PluginClass,
    mode: InstallMode,
    finder: LocalFinder,
}

impl InstallSource {
    pub fn new(
        installer: Arc<Installer>,
        class: PluginClass,
        specs: Vec<InstallPlugin>,
        mode: InstallMode,
    ) -> Self {
        Self {
            installer,
            specs,
            class,
            mode,
            finder: LocalFinder::new(),
        }
    }

    pub fn mode(&self) -> InstallMode {
        self.mode
    }

    pub fn specs(&self) -> &[InstallPlugin] {
        &self.specs
    }

    /// 모든 요청을 로컬 경로로 해석
    async fn resolve_paths(&self, cancel: &CancellationToken) -> PluginResult<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = Vec::new();

        for spec in &self.specs {
            match self.installer.ensure(spec, cancel).await {
                Ok(Some(resolved)) => {
                    for path in resolved.paths() {
                        if !paths.contains(&path) {
                            paths.push(path);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => match self.mode {
                    InstallMode::Sync => {
                        error!(plugin_id = %spec.id, "Required plugin install failed: {}", e);
                        return Err(e);
                    }
                    InstallMode::Async => {
                        warn!(plugin_id = %spec.id, "Plugin install failed, skipping: {}", e);
                    }
                },
            }
        }

        info!(
            mode = ?self.mode,
            "Resolved {} of {} requested plugins to local paths",
            paths.len(),
            self.specs.len()
        );
        Ok(paths)
    }
}

#[async_trait]
impl Source for InstallSource {
    fn class(&self) -> PluginClass {
        self.class
    }

    async fn discover(&self, cancel: &CancellationToken) -> PluginResult<Vec<FoundBundle>> {
        let paths = self.resolve_paths(cancel).await?;
        let removable = self.class == PluginClass::External;
        self.finder.find(&paths, removable, cancel).await
    }
}

/// 요청을 클래스별로 묶음 (처음 등장한 순서 유지)
pub fn group_by_class(specs: Vec<InstallPlugin>) -> Vec<(PluginClass, Vec<InstallPlugin>)> {
    let mut groups: Vec<(PluginClass, Vec<InstallPlugin>)> = Vec::new();
    for spec in specs {
        match groups.iter_mut().find(|(class, _)| *class == spec.class) {
            Some((_, group)) => group.push(spec),
            None => groups.push((spec.class, vec![spec])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::error::PluginError;
    use crate::plugin::install::{ArchiveInfo, CompatOpts, InstallMetrics, PluginRepo, VersionCache};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    struct ZipRepo;

    #[async_trait]
    impl PluginRepo for ZipRepo {
        async fn archive_info(
            &self,
            id: &str,
            version: Option<&str>,
            _compat: &CompatOpts,
        ) -> PluginResult<ArchiveInfo> {
            if id == "missing-panel" {
                return Err(PluginError::NotFound(id.to_string()));
            }
            let version = version.unwrap_or("1.0.0").to_string();
            Ok(ArchiveInfo {
                url: format!("{}/{}", id, version),
                version,
                checksum: None,
            })
        }

        async fn download(&self, url: &str, _checksum: Option<&str>) -> PluginResult<Vec<u8>> {
            let (id, version) = url.split_once('/').unwrap_or((url, "1.0.0"));
            let json = format!(
                r#"{{"id":"{}","type":"panel","name":"{}","info":{{"version":"{}"}}}}"#,
                id, id, version
            );
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("plugin.json", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(json.as_bytes()).unwrap();
            Ok(writer.finish().unwrap().into_inner())
        }
    }

    fn source(dir: &TempDir, ids: &[&str], mode: InstallMode) -> InstallSource {
        let installer = Arc::new(Installer::new(
            dir.path(),
            Arc::new(ZipRepo),
            CompatOpts::new(None, "linux", "amd64"),
            Arc::new(VersionCache::new()),
            Arc::new(InstallMetrics::new()),
        ));
        let specs = ids
            .iter()
            .map(|id| InstallPlugin::new(*id, PluginClass::External))
            .collect();
        InstallSource::new(installer, PluginClass::External, specs, mode)
    }

    #[tokio::test]
    async fn test_async_mode_skips_failures() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, &["acme-panel", "missing-panel"], InstallMode::Async);

        let bundles = source.discover(&CancellationToken::new()).await.unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].primary.json.id, "acme-panel");
        assert!(bundles[0].primary.fs.supports_removal());
        assert_eq!(bundles[0].primary.fs.base(), dir.path().join("acme-panel-1.0.0"));
    }

    #[tokio::test]
    async fn test_sync_mode_aborts() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, &["acme-panel", "missing-panel"], InstallMode::Sync);

        let result = source.discover(&CancellationToken::new()).await;
        assert!(matches!(result, Err(PluginError::NotFound(_))));
    }

    #[test]
    fn test_group_by_class() {
        let specs = vec![
            InstallPlugin::new("a", PluginClass::External),
            InstallPlugin::new("b", PluginClass::Bundled),
            InstallPlugin::new("c", PluginClass::External),
        ];
        let groups = group_by_class(specs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, PluginClass::External);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1[0].id, "b");
    }
}
