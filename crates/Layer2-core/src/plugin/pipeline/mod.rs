//! Loader Pipeline
//!
//! ```text
//! Source ─▶ Discovery ─▶ Bootstrap ─▶ Validation ─▶ Initialization ─▶ Registry
//!                                                                        │
//!                                                     Termination ◀──────┘
//! ```
//!
//! 각 단계는 교체 가능한 단계 목록(trait object)으로 구성됩니다.

mod bootstrap;
mod discovery;
mod initialization;
mod termination;
mod validation;

pub use bootstrap::{
    slugify, AliasDecorator, AppChildDecorator, AppDefaultNavDecorator, Bootstrap, Constructor,
    Decorator, DefaultConstructor, DEFAULT_ALIASES,
};
pub use discovery::{Discovery, DiscoveryFilter, DuplicateFilter};
pub use initialization::{
    BackendClientInit, ExternalServiceRegistration, Initialization, Initializer, ProcessStart,
};
pub use termination::Termination;
pub use validation::{
    LegacyFrameworkValidator, ModuleJsCheck, SignatureValidator, Validation, Validator,
};
