//! Archive Extractor - zip 아카이브를 플러그인 디렉토리로 해제
//!
//! 항목별 규칙:
//! - 대상 디렉토리 밖으로 나가는 경로(절대 경로, `..`)는 거부
//! - 심볼릭 링크는 링크 대상이 디렉토리 안에 머물 때만 생성
//! - 이미 만든 심볼릭 링크를 거쳐 쓰는 항목은 거부 (링크 체인 탈출 방지)
//! - 백엔드 실행 파일 접미사는 실행 권한 강제

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::manifest::{read_plugin_json_blocking, PluginDependency};
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// 실행 권한이 필요한 백엔드 실행 파일 접미사
const EXECUTABLE_SUFFIXES: &[&str] = &[
    "_linux_amd64",
    "_linux_arm",
    "_linux_arm64",
    "_darwin_amd64",
    "_darwin_arm64",
    "_freebsd_amd64",
    "_windows_amd64.exe",
];

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// 플러그인 ID -> 설치 디렉토리 이름
pub type DirNameFn = dyn Fn(&str) -> String + Send + Sync;

/// 기본 레이아웃 (ID당 디렉토리 하나)
pub fn simple_dir_name(plugin_id: &str) -> String {
    plugin_id.to_string()
}

/// 해제 결과
#[derive(Debug, Clone)]
pub struct ExtractedPluginArchive {
    pub id: String,
    pub version: String,
    pub dependencies: Vec<PluginDependency>,
    pub path: PathBuf,
}

/// zip 해제기
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    plugins_dir: PathBuf,
}

impl ArchiveExtractor {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// 아카이브 해제 (블로킹)
    ///
    /// 실패하면 대상 디렉토리를 지웁니다.
    pub fn extract<R: Read + Seek>(
        &self,
        plugin_id: &str,
        dir_name: &DirNameFn,
        reader: R,
    ) -> PluginResult<ExtractedPluginArchive> {
        let name = dir_name(plugin_id);
        let mut components = Path::new(&name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(PluginError::InvalidArchive(format!(
                "invalid install directory name {:?}",
                name
            )));
        }

        let target = self.plugins_dir.join(&name);
        if target.exists() {
            debug!("Removing previous install at {:?}", target);
            fs::remove_dir_all(&target)?;
        }
        fs::create_dir_all(&target)?;

        let result = extract_entries(plugin_id, &target, reader).and_then(|_| {
            let json = read_plugin_json_blocking(&target)?;
            if json.id != plugin_id {
                return Err(PluginError::InvalidArchive(format!(
                    "archive contains plugin {} instead of {}",
                    json.id, plugin_id
                )));
            }
            Ok(ExtractedPluginArchive {
                id: json.id.clone(),
                version: json.info.version.clone(),
                dependencies: json.dependencies.plugins.clone(),
                path: target.clone(),
            })
        });

        if result.is_err() {
            if let Err(e) = fs::remove_dir_all(&target) {
                warn!("Failed to clean up {:?}: {}", target, e);
            }
        }
        result
    }
}

fn extract_entries<R: Read + Seek>(plugin_id: &str, target: &Path, reader: R) -> PluginResult<()> {
    let mut archive = ZipArchive::new(reader)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let raw_name = entry.name().replace('\\', "/");
        let rel = strip_plugin_root(&raw_name, plugin_id);
        if rel.is_empty() {
            continue;
        }

        let rel_path =
            normalize_rel(&rel).ok_or_else(|| PluginError::PathTraversal(raw_name.clone()))?;
        if rel_path.as_os_str().is_empty() {
            continue;
        }
        let dest = target.join(&rel_path);
        let mode = entry.unix_mode();
        let is_symlink = mode.map(|m| m & S_IFMT == S_IFLNK).unwrap_or(false);

        // 새 심볼릭 링크는 기존 링크를 대체할 수 있으므로 마지막 구성요소 제외
        reject_symlinked_components(target, &rel_path, !is_symlink)
            .map_err(|_| PluginError::PathTraversal(raw_name.clone()))?;

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_symlink {
            let mut link_target = String::new();
            entry.read_to_string(&mut link_target)?;
            extract_symlink(target, &rel_path, &link_target, &dest)?;
            continue;
        }

        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
        set_permissions(&dest, &rel, mode)?;
    }

    Ok(())
}

/// 최상위가 `{plugin_id}/`이면 제거
fn strip_plugin_root(name: &str, plugin_id: &str) -> String {
    let trimmed = name.strip_prefix("./").unwrap_or(name);
    match trimmed.split_once('/') {
        Some((first, rest)) if first == plugin_id => rest.to_string(),
        _ if trimmed == plugin_id => String::new(),
        _ => trimmed.to_string(),
    }
}

/// 경로 구성요소 기준 정규화. `..`로 루트를 벗어나면 `None`
fn normalize_rel(rel: &str) -> Option<PathBuf> {
    if rel.starts_with('/') {
        return None;
    }
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return None;
    }

    let mut out = PathBuf::new();
    for component in rel_path.components() {
        match component {
            Component::Normal(c) => out.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// 디스크에 이미 있는 구성요소 중 심볼릭 링크가 있으면 거부
///
/// 텍스트 검사만으로는 `a -> .`, `b -> a/..` 같은 링크 체인을 막을 수 없습니다.
fn reject_symlinked_components(root: &Path, rel: &Path, include_last: bool) -> io::Result<()> {
    let components: Vec<_> = rel.components().collect();
    let checked = if include_last {
        components.len()
    } else {
        components.len().saturating_sub(1)
    };

    let mut current = root.to_path_buf();
    for component in &components[..checked] {
        current.push(component);
        match current.symlink_metadata() {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is a symlink", current.display()),
                ));
            }
            Ok(_) => {}
            // 아직 없는 구성요소부터는 새로 만들어지는 실제 디렉토리
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// 링크 대상을 실제 디렉토리 트리 기준으로 따라가며 `root` 안에 머무는지 확인
///
/// 경로 도중에 다른 심볼릭 링크를 지나면 실패로 봅니다.
fn link_stays_inside(root: &Path, link_parent: &Path, link_target: &str) -> bool {
    let target = Path::new(link_target);
    if target.is_absolute() || link_target.starts_with('/') {
        return false;
    }

    let mut resolved = link_parent.to_path_buf();
    for component in target.components() {
        match component {
            Component::Normal(c) => {
                resolved.push(c);
                match root.join(&resolved).symlink_metadata() {
                    Ok(meta) if meta.file_type().is_symlink() => return false,
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(_) => return false,
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn extract_symlink(root: &Path, rel: &Path, link_target: &str, dest: &Path) -> PluginResult<()> {
    let link_target = link_target.trim();
    let link_parent = rel.parent().unwrap_or_else(|| Path::new(""));

    if !link_stays_inside(root, link_parent, link_target) {
        warn!(
            "Skipping symlink {} -> {} (escapes plugin directory)",
            rel.display(),
            link_target
        );
        return Ok(());
    }

    create_symlink(link_target, dest)
}

#[cfg(unix)]
fn create_symlink(link_target: &str, dest: &Path) -> PluginResult<()> {
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest)?;
    }
    std::os::unix::fs::symlink(link_target, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(link_target: &str, dest: &Path) -> PluginResult<()> {
    warn!("Skipping symlink {:?} -> {} (unsupported platform)", dest, link_target);
    Ok(())
}

fn is_backend_executable(rel: &str) -> bool {
    let file_name = rel.rsplit('/').next().unwrap_or(rel);
    EXECUTABLE_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}

#[cfg(unix)]
fn set_permissions(dest: &Path, rel: &str, mode: Option<u32>) -> PluginResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if is_backend_executable(rel) {
        Some(0o755)
    } else {
        mode.map(|m| m & 0o777).filter(|m| *m != 0)
    };
    if let Some(mode) = mode {
        fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_dest: &Path, _rel: &str, _mode: Option<u32>) -> PluginResult<()> {
    Ok(())
}
