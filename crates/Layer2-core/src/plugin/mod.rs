//! # Plugin System
//!
//! 디스크/CDN/설치 요청에서 플러그인 번들을 찾아 검증하고 실행 가능한 상태로
//! 등록한 뒤, 나중에 런타임에서 제거합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          PluginLoader                             │
//! │                                                                   │
//! │  Source ─▶ Discovery ─▶ Bootstrap ─▶ Validation ─▶ Initialization │
//! │  (local,    (duplicate   (signature,   (signature,   (backend      │
//! │   cdn,       filter)      asset path,   module.js,    client,       │
//! │   install,                decorators)   legacy)       process)      │
//! │   bundle)                                                 │       │
//! │                                                           ▼       │
//! │                      Termination ◀──────────────── PluginRegistry │
//! └──────────────────────────────────────────────────────────────────┘
//!          ▲
//!          │ InstallSource
//! ┌────────┴─────────────────────────────────────────────────────────┐
//! │  Installer: VersionCache │ PluginRepo (HTTP) │ ArchiveExtractor   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! let registry: Arc<dyn Registry> = Arc::new(PluginRegistry::new());
//! let verifier = Arc::new(ManifestVerifier::new(&config.signature, Arc::new(InMemoryKeyStore::new())));
//! let calculator = Arc::new(ManifestCalculator::new(verifier, &config.app_url));
//!
//! let loader = PluginLoader::with_defaults(&config, LoaderServices::new(registry, calculator));
//! let source = PluginSource::from(LocalSource::new(PluginClass::External, vec![config.plugins_path.clone()]));
//! let plugins = loader.load(&source, &CancellationToken::new()).await?;
//!
//! loader.unload("acme-panel").await?;
//! ```

mod assetpath;
mod error;
mod error_tracker;
mod fs;
pub mod install;
mod legacy;
mod loader;
mod manifest;
pub mod pipeline;
mod process;
mod provisioner;
mod record;
mod registry;
pub mod signature;
pub mod sources;
mod types;

pub use assetpath::{default_logo, AssetPath};
pub use error::{PluginError, PluginLoadError, PluginResult};
pub use error_tracker::{ErrorTracker, PluginErrorEntry};
pub use fs::PluginFs;
pub use legacy::{LegacyInspector, PatternsInspector, MODULE_JS};
pub use loader::{LoaderServices, PluginLoader};
pub use manifest::{
    locate_plugin_json, read_plugin_json, read_plugin_json_blocking, IamPermission,
    IamRequirements, Include, PluginDependency, PluginJson, DIST_DIR, PLUGIN_JSON,
};
pub use process::{
    BackendClient, BackendClientProvider, ExternalServiceCredentials, ExternalServiceRegistry,
    LocalProcessManager, ProcessHandle, ProcessManager,
};
pub use provisioner::Provisioner;
pub use record::{LegacyInfo, Plugin};
pub use registry::{PluginRegistry, Registry};
pub use sources::{FoundBundle, FoundPlugin, PluginSource, Source};
pub use types::{
    ErrorCode, PluginClass, PluginStatus, PluginType, Signature, SignatureStatus, SignatureType,
};
