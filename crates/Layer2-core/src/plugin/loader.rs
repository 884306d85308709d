//! Plugin Loader - 파이프라인 조립 + Load/Unload 진입점
//!
//! `load`는 Discovery → Bootstrap → Validation → Initialization을 순서대로 실행하고,
//! 에러 상태 플러그인을 포함한 등록 결과를 돌려줍니다.
//! 플러그인별 에러는 `ErrorTracker`에도 남습니다.

use super::assetpath::AssetPath;
use super::error::{PluginError, PluginResult};
use super::error_tracker::ErrorTracker;
use super::legacy::{LegacyInspector, PatternsInspector};
use super::pipeline::{
    AliasDecorator, AppChildDecorator, AppDefaultNavDecorator, BackendClientInit, Bootstrap,
    DefaultConstructor, Discovery, ExternalServiceRegistration, Initialization, Initializer,
    LegacyFrameworkValidator, ModuleJsCheck, ProcessStart, SignatureValidator, Termination,
    Validation,
};
use super::process::{
    BackendClientProvider, ExternalServiceRegistry, LocalProcessManager, ProcessManager,
};
use super::record::Plugin;
use super::registry::Registry;
use super::signature::SignatureCalculator;
use super::sources::Source;
use super::types::PluginStatus;
use kiln_foundation::PluginsConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 파이프라인이 사용하는 외부 서비스 묶음
#[derive(Clone)]
pub struct LoaderServices {
    pub registry: Arc<dyn Registry>,
    pub calculator: Arc<dyn SignatureCalculator>,
    pub process_manager: Arc<dyn ProcessManager>,
    pub client_provider: Arc<dyn BackendClientProvider>,
    pub external_services: Option<Arc<dyn ExternalServiceRegistry>>,
    pub inspector: Arc<dyn LegacyInspector>,
}

impl LoaderServices {
    /// 로컬 프로세스 관리자 + 패턴 검사기 기본 구성
    pub fn new(registry: Arc<dyn Registry>, calculator: Arc<dyn SignatureCalculator>) -> Self {
        let processes = Arc::new(LocalProcessManager::new());
        Self {
            registry,
            calculator,
            process_manager: processes.clone(),
            client_provider: processes,
            external_services: None,
            inspector: Arc::new(PatternsInspector::new()),
        }
    }

    pub fn with_process_manager(mut self, manager: Arc<dyn ProcessManager>) -> Self {
        self.process_manager = manager;
        self
    }

    pub fn with_client_provider(mut self, provider: Arc<dyn BackendClientProvider>) -> Self {
        self.client_provider = provider;
        self
    }

    pub fn with_external_services(mut self, registry: Arc<dyn ExternalServiceRegistry>) -> Self {
        self.external_services = Some(registry);
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn LegacyInspector>) -> Self {
        self.inspector = inspector;
        self
    }
}

/// 플러그인 로더
pub struct PluginLoader {
    registry: Arc<dyn Registry>,
    discovery: Discovery,
    bootstrap: Bootstrap,
    validation: Validation,
    initialization: Initialization,
    termination: Termination,
    errors: Arc<ErrorTracker>,
}

impl PluginLoader {
    pub fn new(
        registry: Arc<dyn Registry>,
        discovery: Discovery,
        bootstrap: Bootstrap,
        validation: Validation,
        initialization: Initialization,
        termination: Termination,
    ) -> Self {
        Self {
            registry,
            discovery,
            bootstrap,
            validation,
            initialization,
            termination,
            errors: Arc::new(ErrorTracker::new()),
        }
    }

    /// 설정 기반 기본 단계 구성
    pub fn with_defaults(config: &PluginsConfig, services: LoaderServices) -> Self {
        let LoaderServices {
            registry,
            calculator,
            process_manager,
            client_provider,
            external_services,
            inspector,
        } = services;

        let discovery = Discovery::with_defaults(registry.clone());

        let bootstrap = Bootstrap::new(
            Box::new(DefaultConstructor::new(
                calculator,
                AssetPath::new(config.cdn_base_url.clone()),
            )),
            vec![
                Box::new(AliasDecorator::new(&config.aliases)),
                Box::new(AppDefaultNavDecorator::new(config.app_sub_url.clone())),
                Box::new(AppChildDecorator),
            ],
        );

        let validation = Validation::new(vec![
            Box::new(SignatureValidator::from_config(config)),
            Box::new(ModuleJsCheck),
            Box::new(LegacyFrameworkValidator::new(
                inspector,
                Duration::from_secs(config.legacy_inspection_timeout_secs),
                config.hide_legacy_deprecation.clone(),
            )),
        ]);

        let mut steps: Vec<Box<dyn Initializer>> =
            vec![Box::new(BackendClientInit::new(client_provider))];
        if let Some(external) = external_services {
            steps.push(Box::new(ExternalServiceRegistration::new(external)));
        }
        steps.push(Box::new(ProcessStart::new(process_manager.clone())));
        let initialization = Initialization::new(steps, registry.clone());

        let termination = Termination::new(registry.clone(), process_manager);

        Self::new(
            registry,
            discovery,
            bootstrap,
            validation,
            initialization,
            termination,
        )
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn errors(&self) -> &Arc<ErrorTracker> {
        &self.errors
    }

    // ========================================================================
    // Load / Unload
    // ========================================================================

    /// 공급원 하나를 전체 파이프라인으로 로드
    ///
    /// 공급원 실패, 등록 실패, 취소만 에러로 돌아옵니다.
    pub async fn load(
        &self,
        source: &dyn Source,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<Arc<Plugin>>> {
        let class = source.class();
        info!(%class, "Loading plugins");

        let bundles = self.discovery.discover(source, cancel).await?;
        if bundles.is_empty() {
            debug!(%class, "Nothing to load");
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(PluginError::Cancelled);
        }

        let default_signature = source.default_signature();
        let plugins = self
            .bootstrap
            .bootstrap(class, default_signature.as_ref(), bundles)
            .await;
        let plugins = self.validation.validate(plugins).await;
        let registered = self.initialization.initialize(plugins).await?;

        let mut errored = 0;
        for plugin in &registered {
            match &plugin.status {
                PluginStatus::Errored { code, message } => {
                    errored += 1;
                    self.errors.record(
                        plugin.id(),
                        *code,
                        message.clone(),
                        Some(plugin.signature.status),
                    );
                }
                PluginStatus::Ok => self.errors.clear(plugin.id()),
            }
        }

        info!(
            %class,
            loaded = registered.len() - errored,
            errored,
            "Plugins loaded"
        );
        Ok(registered)
    }

    /// 플러그인 제거 (자식 포함)
    pub async fn unload(&self, id: &str) -> PluginResult<Arc<Plugin>> {
        let plugin = match self.termination.terminate(id).await {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!(plugin_id = %id, "Plugin unload failed: {}", e);
                return Err(e);
            }
        };

        self.errors.clear(plugin.id());
        for child in &plugin.children {
            self.errors.clear(child);
        }
        Ok(plugin)
    }
}
