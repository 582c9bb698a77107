//! modhost - a plugin host with a build pipeline and typed settings.
//!
//! The host turns module distribution archives into compiled artifact
//! trees, loads one module instance per tree through an explicit factory,
//! and routes events between the UI layer, the host, and modules. Each
//! module owns a typed settings page persisted as JSON under the host's
//! storage directory.
//!
//! ## Layers
//!
//! 1. [`build`] - archive extraction, manifest-cached compilation, stale
//!    output cleanup
//! 2. [`module`] - manifest, loader, registry, event router
//! 3. [`settings`] - typed settings, display containers, JSON persistence
//! 4. [`host`] - assembly of the above into a running host

pub mod build;
pub mod config;
pub mod host;
pub mod module;
pub mod settings;
pub mod utils;

pub use config::{HostConfig, HostPaths};
pub use host::{Host, HostError};
pub use module::{HostLink, Module, ModuleError, ModuleFactory, RendererPort};
pub use settings::{Setting, SettingKind, SettingValue, SettingsEntry};
