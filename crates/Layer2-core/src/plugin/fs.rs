//! Plugin FS - 플러그인 설치 디렉토리 핸들

use super::error::{PluginError, PluginResult};
use super::manifest::locate_plugin_json;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// 플러그인 디렉토리 핸들
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFs {
    base: PathBuf,
    removable: bool,
}

impl PluginFs {
    /// 읽기 전용 핸들
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            removable: false,
        }
    }

    /// 삭제 가능한 핸들 (외부 설치 플러그인)
    pub fn removable(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            removable: true,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn supports_removal(&self) -> bool {
        self.removable
    }

    /// 상대 경로 해석 (디렉토리 밖으로 나가는 경로는 None)
    fn resolve(&self, rel: &str) -> Option<PathBuf> {
        let rel = Path::new(rel);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.base.join(rel))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).map(|p| p.exists()).unwrap_or(false)
    }

    /// 파일 읽기
    pub async fn read(&self, rel: &str) -> PluginResult<Vec<u8>> {
        let path = self
            .resolve(rel)
            .ok_or_else(|| PluginError::PathTraversal(rel.to_string()))?;
        Ok(fs::read(path).await?)
    }

    /// 모든 파일의 상대 경로 (`/` 구분, 정렬됨)
    pub async fn files(&self) -> PluginResult<Vec<String>> {
        let mut files = Vec::new();
        Self::collect_files(&self.base, &self.base, &mut files).await?;
        files.sort();
        Ok(files)
    }

    fn collect_files<'a>(
        root: &'a Path,
        dir: &'a Path,
        out: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = PluginResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    Self::collect_files(root, &path, out).await?;
                } else if let Ok(rel) = path.strip_prefix(root) {
                    let rel: Vec<String> = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    out.push(rel.join("/"));
                }
            }
            Ok(())
        })
    }

    /// 디렉토리 삭제
    ///
    /// plugin.json이 없는 디렉토리는 플러그인 디렉토리로 보지 않고 거부합니다.
    pub async fn remove(&self) -> PluginResult<()> {
        if !self.removable {
            return Err(PluginError::NotRemovable(self.base.display().to_string()));
        }
        if locate_plugin_json(&self.base).is_none() {
            return Err(PluginError::NotRemovable(format!(
                "{} (no plugin.json)",
                self.base.display()
            )));
        }
        fs::remove_dir_all(&self.base).await?;
        Ok(())
    }

    /// 다른 핸들 기준의 상대 경로 (`/` 구분)
    pub fn relative_to(&self, parent: &PluginFs) -> Option<String> {
        let rel = self.base.strip_prefix(&parent.base).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_files_and_read() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("plugin.json"), "{}");
        write(&temp.path().join("img/logo.svg"), "<svg/>");

        let pfs = PluginFs::new(temp.path());
        assert_eq!(pfs.files().await.unwrap(), vec!["img/logo.svg", "plugin.json"]);
        assert_eq!(pfs.read("img/logo.svg").await.unwrap(), b"<svg/>");
        assert!(pfs.exists("plugin.json"));
        assert!(!pfs.exists("../plugin.json"));
        assert!(matches!(
            pfs.read("../secret").await,
            Err(PluginError::PathTraversal(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_requires_removable_plugin_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("acme-panel");
        write(&dir.join("module.js"), "");

        assert!(PluginFs::new(&dir).remove().await.is_err());
        assert!(PluginFs::removable(&dir).remove().await.is_err());

        write(&dir.join("plugin.json"), "{}");
        PluginFs::removable(&dir).remove().await.unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_relative_to() {
        let parent = PluginFs::new("/plugins/app");
        let child = PluginFs::new("/plugins/app/datasources/child");
        assert_eq!(child.relative_to(&parent).as_deref(), Some("datasources/child"));
        assert!(parent.relative_to(&child).is_none());
    }
}
