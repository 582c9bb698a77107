//! Module contract and host ports.
//!
//! Defines the `Module` trait every plugin implements, the error taxonomy,
//! and the narrow ports through which modules talk back to the host: a
//! one-way renderer notification and a brokered inter-module request. Modules
//! hold only a [`HostLink`], never a registry reference.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::module::manifest::ModuleManifest;
use crate::settings::{SettingError, SettingsEntry, StorageError};

/// Routing id of the host itself; `request_external` calls addressed here are
/// handled at host level instead of being forwarded to a module.
pub const HOST_ID: &str = "host.main";

/// Well-known host-level event types.
pub const EVENT_RENDERER_INIT: &str = "renderer-init";
pub const EVENT_SWAP_MODULES: &str = "swap-modules";
pub const EVENT_SETTINGS_INIT: &str = "settings-init";
pub const EVENT_SETTING_MODIFIED: &str = "setting-modified";
pub const EVENT_SETTING_RESET: &str = "setting-reset";

tokio::task_local! {
    /// Ids of the modules whose handlers are executing in the current
    /// delivery chain. `HostLink::request_external` forwards it so the
    /// router can refuse a re-entrant request (a module addressing itself,
    /// directly or through a cycle) instead of deadlocking on the target's
    /// mutex.
    pub(crate) static DELIVERY_CHAIN: Vec<String>;
}

/// Module system errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("no module with id {0}")]
    NoSuchModule(String),

    #[error("duplicate module id '{id}': '{existing}' already registered, rejecting '{rejected}'")]
    DuplicateId {
        id: String,
        existing: String,
        rejected: String,
    },

    #[error("invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("module load failed: {0}")]
    LoadError(String),

    #[error("module operation failed: {0}")]
    OperationError(String),

    #[error("request cycle: module '{0}' is already handling an event in this delivery chain")]
    DeliveryCycle(String),

    #[error("setting error: {0}")]
    Setting(#[from] SettingError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for module")]
    Timeout,
}

/// Module trait that all modules must implement.
///
/// Instances are created once by the loader's factory at registry-population
/// time and destroyed at shutdown, after `on_exit` has returned. Event
/// delivery is serialized per module; handlers may suspend freely without
/// blocking other modules.
#[async_trait]
pub trait Module: Send + Sync {
    /// Globally unique routing id. Events are addressed by this, never by
    /// display name.
    fn id(&self) -> &str;

    /// Presentation name; not required to be unique.
    fn display_name(&self) -> &str;

    fn manifest(&self) -> Option<&ModuleManifest> {
        None
    }

    /// Settings (and section headers) owned by this module, in display
    /// order. Called once at registration.
    fn register_settings(&self) -> Vec<SettingsEntry> {
        Vec::new()
    }

    /// Entry point for events addressed to this module from the UI layer.
    async fn handle_event(
        &mut self,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError>;

    /// Entry point for brokered requests from other modules. Defaults to the
    /// regular event path.
    async fn handle_external(
        &mut self,
        _source: &str,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError> {
        self.handle_event(event_type, data).await
    }

    async fn on_gui_shown(&mut self) {}

    async fn on_gui_hidden(&mut self) {}

    /// Called after one of this module's settings was successfully modified
    /// and persisted.
    async fn on_setting_modified(&mut self, _setting: &crate::settings::Setting) {}

    /// Called once per module before process termination, in registration
    /// order. Modules cancel their own timers here.
    async fn on_exit(&mut self) {}
}

/// One-way push channel into the renderer, implemented by the UI shell.
pub trait RendererPort: Send + Sync {
    fn notify(&self, source: &str, event_type: &str, data: Vec<Value>);
}

/// Renderer port that only logs, for headless operation and tests.
pub struct NullRenderer;

impl RendererPort for NullRenderer {
    fn notify(&self, source: &str, event_type: &str, _data: Vec<Value>) {
        debug!(source, event_type, "renderer notification dropped (headless)");
    }
}

/// Command sent from a module into the host's router task.
pub enum HostCommand {
    RequestExternal {
        source: String,
        target: String,
        event_type: String,
        data: Vec<Value>,
        /// Module ids already executing handlers in the requesting chain.
        chain: Vec<String>,
        reply: oneshot::Sender<Result<Value, ModuleError>>,
    },
}

/// Clonable handle injected into every module at construction: the only way
/// a module reaches the rest of the host.
#[derive(Clone)]
pub struct HostLink {
    renderer: Arc<dyn RendererPort>,
    commands: mpsc::UnboundedSender<HostCommand>,
}

impl HostLink {
    pub fn new(
        renderer: Arc<dyn RendererPort>,
        commands: mpsc::UnboundedSender<HostCommand>,
    ) -> Self {
        Self { renderer, commands }
    }

    /// One-way push to the renderer; never expects a reply.
    pub fn notify_renderer(&self, source: &str, event_type: &str, data: Vec<Value>) {
        self.renderer.notify(source, event_type, data);
    }

    /// Brokered module-to-module request. Resolution and delivery happen in
    /// the router; an unknown target id comes back as an error value, not a
    /// panic across the transport boundary.
    pub async fn request_external(
        &self,
        source: &str,
        target: &str,
        event_type: &str,
        data: Vec<Value>,
    ) -> Result<Value, ModuleError> {
        let (reply, response) = oneshot::channel();
        let chain = DELIVERY_CHAIN.try_with(Vec::clone).unwrap_or_default();
        self.commands
            .send(HostCommand::RequestExternal {
                source: source.to_string(),
                target: target.to_string(),
                event_type: event_type.to_string(),
                data,
                chain,
                reply,
            })
            .map_err(|_| ModuleError::OperationError("host router is not running".to_string()))?;

        response.await.map_err(|_| {
            ModuleError::OperationError("host router dropped the request".to_string())
        })?
    }
}
