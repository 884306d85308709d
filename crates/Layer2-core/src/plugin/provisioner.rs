//! Provisioner - 호스트 기동 시 preinstall 목록 설치 + 로드
//!
//! 비동기 목록은 별도 태스크에서, 동기 목록은 호출자가 기다립니다.

use super::error::PluginResult;
use super::install::{
    CompatOpts, HttpPluginRepo, InstallMetrics, InstallMode, InstallPlugin, Installer, PluginRepo,
    RetryConfig, VersionCache,
};
use super::loader::PluginLoader;
use super::record::Plugin;
use super::sources::{group_by_class, InstallSource, PluginSource};
use kiln_foundation::PluginsConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Provisioner {
    loader: Arc<PluginLoader>,
    installer: Arc<Installer>,
}

impl Provisioner {
    pub fn new(loader: Arc<PluginLoader>, installer: Arc<Installer>) -> Self {
        Self { loader, installer }
    }

    /// 설정의 저장소 URL / 재시도 / 호스트 버전으로 설치기 구성
    pub fn from_config(config: &PluginsConfig, loader: Arc<PluginLoader>) -> Self {
        let repo: Arc<dyn PluginRepo> = Arc::new(
            HttpPluginRepo::new(&config.repository_url)
                .with_retry(RetryConfig::from(&config.download)),
        );
        let installer = Installer::new(
            &config.plugins_path,
            repo,
            CompatOpts::current(config.host_version.as_deref()),
            Arc::new(VersionCache::new()),
            Arc::new(InstallMetrics::new()),
        );
        Self::new(loader, Arc::new(installer))
    }

    pub fn installer(&self) -> &Arc<Installer> {
        &self.installer
    }

    /// 비동기 목록 태스크 시작 후 동기 목록 로드
    ///
    /// 동기 목록 실패는 에러로 돌아오고, 이미 시작된 비동기 태스크는 그대로 진행됩니다.
    pub async fn provision(
        &self,
        config: &PluginsConfig,
        cancel: &CancellationToken,
    ) -> PluginResult<(Vec<Arc<Plugin>>, JoinHandle<Vec<Arc<Plugin>>>)> {
        let background = self.spawn_async(
            config.preinstall.iter().map(InstallPlugin::from_preinstall).collect(),
            cancel.clone(),
        );

        let required = config
            .preinstall_sync
            .iter()
            .map(InstallPlugin::from_preinstall)
            .collect();
        let loaded = self.load_sync(required, cancel).await?;

        Ok((loaded, background))
    }

    /// 필수 플러그인 설치 + 로드. 설치 실패는 그대로 전파
    pub async fn load_sync(
        &self,
        specs: Vec<InstallPlugin>,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<Arc<Plugin>>> {
        let mut loaded = Vec::new();
        for (class, group) in group_by_class(specs) {
            let source = PluginSource::from(InstallSource::new(
                self.installer.clone(),
                class,
                group,
                InstallMode::Sync,
            ));
            match self.loader.load(&source, cancel).await {
                Ok(plugins) => loaded.extend(plugins),
                Err(e) => {
                    error!(%class, "Required plugin provisioning failed: {}", e);
                    return Err(e);
                }
            }
        }
        info!("Provisioned {} required plugins", loaded.len());
        Ok(loaded)
    }

    /// 선택 플러그인 설치 + 로드를 별도 태스크로 시작
    pub fn spawn_async(
        &self,
        specs: Vec<InstallPlugin>,
        cancel: CancellationToken,
    ) -> JoinHandle<Vec<Arc<Plugin>>> {
        let loader = self.loader.clone();
        let installer = self.installer.clone();

        tokio::spawn(async move {
            let mut loaded = Vec::new();
            for (class, group) in group_by_class(specs) {
                let source = PluginSource::from(InstallSource::new(
                    installer.clone(),
                    class,
                    group,
                    InstallMode::Async,
                ));
                match loader.load(&source, &cancel).await {
                    Ok(plugins) => loaded.extend(plugins),
                    Err(e) => warn!(%class, "Optional plugin provisioning failed: {}", e),
                }
            }
            info!("Provisioned {} optional plugins", loaded.len());
            loaded
        })
    }
}
