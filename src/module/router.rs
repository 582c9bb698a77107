//! Event router.
//!
//! Delivers inbound events to exactly one module, brokers module-to-module
//! requests, and drives the shown/hidden lifecycle. Delivery to one module
//! is serialized in arrival order through that module's fair mutex; a
//! suspended handler never blocks delivery to other modules.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::module::registry::{ModuleHandle, ModuleRegistry};
use crate::module::traits::{
    HostCommand, HostLink, ModuleError, RendererPort, DELIVERY_CHAIN, EVENT_RENDERER_INIT,
    EVENT_SETTINGS_INIT, EVENT_SETTING_MODIFIED, EVENT_SETTING_RESET, EVENT_SWAP_MODULES, HOST_ID,
};
use crate::settings::{SetOutcome, Setting};

/// Routes events between the UI layer, the host, and modules.
pub struct EventRouter {
    registry: Arc<ModuleRegistry>,
    link: HostLink,
    /// Command receiver, taken by the broker task on `start`.
    commands: Mutex<Option<mpsc::UnboundedReceiver<HostCommand>>>,
    /// Currently visible module id; guards the show/hide short-circuit.
    visible: Mutex<Option<String>>,
}

impl EventRouter {
    pub fn new(registry: Arc<ModuleRegistry>, renderer: Arc<dyn RendererPort>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            registry,
            link: HostLink::new(renderer, tx),
            commands: Mutex::new(Some(rx)),
            visible: Mutex::new(None),
        })
    }

    /// The handle modules receive at construction.
    pub fn link(&self) -> HostLink {
        self.link.clone()
    }

    /// Start the broker task serving module-to-module requests. Each
    /// request runs in its own task so one suspended caller cannot stall
    /// the broker loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let Some(mut commands) = router.commands.lock().await.take() else {
                warn!("event router started twice, ignoring");
                return;
            };

            while let Some(command) = commands.recv().await {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    match command {
                        HostCommand::RequestExternal {
                            source,
                            target,
                            event_type,
                            data,
                            chain,
                            reply,
                        } => {
                            let result = router
                                .deliver_request(&source, &target, &event_type, &data, chain)
                                .await;
                            let _ = reply.send(result);
                        }
                    }
                });
            }
        })
    }

    /// Deliver an inbound event to the addressed module (or to the host for
    /// the host id) and propagate the handler's return value to the caller.
    pub async fn dispatch(
        &self,
        target_id: &str,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError> {
        if target_id == HOST_ID {
            return self.handle_host_event(event_type, data).await;
        }

        let handle = self
            .registry
            .get(target_id)
            .await
            .ok_or_else(|| ModuleError::NoSuchModule(target_id.to_string()))?;

        let mut module = handle.module.lock().await;
        DELIVERY_CHAIN
            .scope(
                vec![target_id.to_string()],
                module.handle_event(event_type, data),
            )
            .await
    }

    /// Broker a module-to-module request. The host id routes to host-level
    /// handling; an unknown target id fails with a descriptive error
    /// returned to the caller.
    pub async fn request_external(
        &self,
        source_id: &str,
        target_id: &str,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError> {
        let chain = DELIVERY_CHAIN.try_with(Vec::clone).unwrap_or_default();
        self.deliver_request(source_id, target_id, event_type, data, chain)
            .await
    }

    /// Deliver one brokered request. A target already executing in the
    /// requesting chain would deadlock on its own mutex, so the request is
    /// refused instead.
    async fn deliver_request(
        &self,
        source_id: &str,
        target_id: &str,
        event_type: &str,
        data: &[Value],
        mut chain: Vec<String>,
    ) -> Result<Value, ModuleError> {
        if target_id == HOST_ID {
            return self.handle_host_request(source_id, event_type, data).await;
        }

        if chain.iter().any(|id| id == target_id) {
            warn!(
                source = source_id,
                target = target_id,
                "refusing re-entrant request in delivery chain"
            );
            return Err(ModuleError::DeliveryCycle(target_id.to_string()));
        }

        let handle = self
            .registry
            .get(target_id)
            .await
            .ok_or_else(|| ModuleError::NoSuchModule(target_id.to_string()))?;

        let mut module = handle.module.lock().await;
        chain.push(target_id.to_string());
        DELIVERY_CHAIN
            .scope(chain, module.handle_external(source_id, event_type, data))
            .await
    }

    /// Make a module visible, firing `on_gui_hidden`/`on_gui_shown` exactly
    /// once per transition. Re-requesting the visible module is a no-op: no
    /// duplicate hide/show pair fires.
    pub async fn show_module(&self, id: &str) -> Result<(), ModuleError> {
        let mut visible = self.visible.lock().await;
        if visible.as_deref() == Some(id) {
            debug!(id, "module already visible");
            return Ok(());
        }

        let next = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| ModuleError::NoSuchModule(id.to_string()))?;

        if let Some(previous_id) = visible.take() {
            if let Some(previous) = self.registry.get(&previous_id).await {
                previous.module.lock().await.on_gui_hidden().await;
            }
        }

        next.module.lock().await.on_gui_shown().await;
        *visible = Some(id.to_string());
        self.link
            .notify_renderer(HOST_ID, EVENT_SWAP_MODULES, vec![json!(id)]);
        Ok(())
    }

    /// Currently visible module id.
    pub async fn visible_module(&self) -> Option<String> {
        self.visible.lock().await.clone()
    }

    async fn handle_host_event(
        &self,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError> {
        match event_type {
            EVENT_RENDERER_INIT => {
                let mut listing = Map::new();
                for (id, display_name) in self.registry.listing().await {
                    listing.insert(id, Value::String(display_name));
                }
                self.link
                    .notify_renderer(HOST_ID, "load-modules", vec![Value::Object(listing)]);

                if let Some(first) = self.registry.first_id().await {
                    self.show_module(&first).await?;
                }
                Ok(Value::Null)
            }
            EVENT_SWAP_MODULES => {
                let id = expect_str(data, 0, event_type)?;
                self.show_module(id).await?;
                Ok(Value::Null)
            }
            EVENT_SETTINGS_INIT => {
                let mut pages = Vec::new();
                for (id, display_name) in self.registry.listing().await {
                    if let Some(handle) = self.registry.get(&id).await {
                        let settings = handle.settings.lock().await;
                        pages.push(json!({
                            "id": id,
                            "displayName": display_name,
                            "settings": settings.display_json(),
                        }));
                    }
                }
                let pages = Value::Array(pages);
                self.link
                    .notify_renderer(HOST_ID, EVENT_SETTINGS_INIT, vec![pages.clone()]);
                Ok(pages)
            }
            EVENT_SETTING_MODIFIED => {
                let id = expect_str(data, 0, event_type)?.to_string();
                let key = expect_str(data, 1, event_type)?.to_string();
                let value = data.get(2).cloned().ok_or_else(|| {
                    ModuleError::OperationError(format!("{event_type}: missing value"))
                })?;
                self.modify_setting(&id, &key, &value).await
            }
            EVENT_SETTING_RESET => {
                let id = expect_str(data, 0, event_type)?.to_string();
                let key = expect_str(data, 1, event_type)?.to_string();
                self.reset_setting(&id, &key).await
            }
            _ => Err(ModuleError::OperationError(format!(
                "unknown host event '{event_type}'"
            ))),
        }
    }

    async fn handle_host_request(
        &self,
        source_id: &str,
        event_type: &str,
        _data: &[Value],
    ) -> Result<Value, ModuleError> {
        match event_type {
            "get-module-ids" => Ok(json!(self.registry.ids().await)),
            _ => Err(ModuleError::OperationError(format!(
                "unknown host request '{event_type}' from '{source_id}'"
            ))),
        }
    }

    /// Apply a new value to one module's setting. A successful mutation is
    /// persisted immediately and announced to the owning module; a rejected
    /// input changes nothing.
    pub async fn modify_setting(
        &self,
        module_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<Value, ModuleError> {
        let handle = self
            .registry
            .get(module_id)
            .await
            .ok_or_else(|| ModuleError::NoSuchModule(module_id.to_string()))?;

        let updated = {
            let mut settings = handle.settings.lock().await;
            let setting = settings.find_mut(key).ok_or_else(|| {
                ModuleError::OperationError(format!(
                    "module '{module_id}' has no setting '{key}'"
                ))
            })?;

            match setting.set_value(value) {
                SetOutcome::Accepted => Some(setting.clone()),
                SetOutcome::Rejected => {
                    warn!(module = module_id, key, %value, "rejected setting value");
                    None
                }
            }
        };

        match updated {
            Some(setting) => {
                self.after_setting_change(&handle, &setting).await?;
                Ok(setting.value_json())
            }
            None => Ok(Value::Null),
        }
    }

    /// Reset one module's setting to its default, persisting the result.
    pub async fn reset_setting(&self, module_id: &str, key: &str) -> Result<Value, ModuleError> {
        let handle = self
            .registry
            .get(module_id)
            .await
            .ok_or_else(|| ModuleError::NoSuchModule(module_id.to_string()))?;

        let setting = {
            let mut settings = handle.settings.lock().await;
            let setting = settings.find_mut(key).ok_or_else(|| {
                ModuleError::OperationError(format!(
                    "module '{module_id}' has no setting '{key}'"
                ))
            })?;
            setting.reset_to_default();
            setting.clone()
        };

        self.after_setting_change(&handle, &setting).await?;
        Ok(setting.value_json())
    }

    async fn after_setting_change(
        &self,
        handle: &ModuleHandle,
        setting: &Setting,
    ) -> Result<(), ModuleError> {
        self.registry.persist_settings(handle).await?;
        handle
            .module
            .lock()
            .await
            .on_setting_modified(setting)
            .await;
        self.link.notify_renderer(
            &handle.id,
            EVENT_SETTING_MODIFIED,
            vec![json!({
                "accessID": setting.access_id(),
                "value": setting.value_json(),
            })],
        );
        Ok(())
    }
}

fn expect_str<'a>(data: &'a [Value], index: usize, event: &str) -> Result<&'a str, ModuleError> {
    data.get(index).and_then(Value::as_str).ok_or_else(|| {
        ModuleError::OperationError(format!("{event}: expected string at position {index}"))
    })
}
