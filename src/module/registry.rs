//! Module registry.
//!
//! Owns the live set of module instances and is the only place that knows
//! the full module set. Registration enforces routing-id uniqueness (first
//! registrant wins) and reconciles the module's persisted settings before
//! the module becomes routable. Shutdown calls `on_exit` for every module in
//! registration order and waits for each, bounded by a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::module::traits::{Module, ModuleError};
use crate::settings::{ModuleSettings, SettingsStore};

/// Upper bound on one module's `on_exit`.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to one registered module. The module itself sits behind a
/// fair async mutex: locking it is what serializes event delivery per
/// module while leaving other modules free to run.
#[derive(Clone)]
pub struct ModuleHandle {
    pub id: String,
    pub display_name: String,
    pub module: Arc<Mutex<Box<dyn Module>>>,
    pub settings: Arc<Mutex<ModuleSettings>>,
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<String, ModuleHandle>,
    /// Registration order; drives `on_exit` ordering at shutdown.
    order: Vec<String>,
}

/// The live module set.
pub struct ModuleRegistry {
    store: SettingsStore,
    inner: Mutex<RegistryInner>,
}

impl ModuleRegistry {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Register a module instance. A duplicate routing id rejects the new
    /// registrant (never the existing one); the warning names both display
    /// names. On success the module's settings are built, reconciled with
    /// storage, and written back before the module is routable.
    pub async fn register(&self, module: Box<dyn Module>) -> Result<(), ModuleError> {
        let id = module.id().to_string();
        let display_name = module.display_name().to_string();

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.by_id.get(&id) {
            warn!(
                id,
                existing = existing.display_name,
                rejected = display_name,
                "duplicate module id, rejecting the later registrant"
            );
            return Err(ModuleError::DuplicateId {
                id,
                existing: existing.display_name.clone(),
                rejected: display_name,
            });
        }

        let mut settings = ModuleSettings::from_entries(module.register_settings());
        self.store.reconcile(&display_name, &mut settings).await?;

        let handle = ModuleHandle {
            id: id.clone(),
            display_name,
            module: Arc::new(Mutex::new(module)),
            settings: Arc::new(Mutex::new(settings)),
        };

        info!(id, "registered module");
        inner.by_id.insert(id.clone(), handle);
        inner.order.push(id);
        Ok(())
    }

    /// Look up a module by routing id. Display names never address.
    pub async fn get(&self, id: &str) -> Option<ModuleHandle> {
        self.inner.lock().await.by_id.get(id).cloned()
    }

    /// Registered routing ids, in registration order.
    pub async fn ids(&self) -> Vec<String> {
        self.inner.lock().await.order.clone()
    }

    /// `(id, display_name)` pairs in registration order.
    pub async fn listing(&self) -> Vec<(String, String)> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .by_id
                    .get(id)
                    .map(|h| (h.id.clone(), h.display_name.clone()))
            })
            .collect()
    }

    /// First registered module id, shown by default at renderer init.
    pub async fn first_id(&self) -> Option<String> {
        self.inner.lock().await.order.first().cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.order.is_empty()
    }

    /// Persist a module's current settings.
    pub async fn persist_settings(&self, handle: &ModuleHandle) -> Result<(), ModuleError> {
        let settings = handle.settings.lock().await;
        self.store
            .write_settings(&handle.display_name, &settings)
            .await?;
        Ok(())
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Flush and stop every module, in registration order. Termination does
    /// not proceed until every `on_exit` has returned or timed out.
    pub async fn shutdown(&self) {
        let handles: Vec<ModuleHandle> = {
            let inner = self.inner.lock().await;
            inner
                .order
                .iter()
                .filter_map(|id| inner.by_id.get(id).cloned())
                .collect()
        };

        for handle in handles {
            let exited = tokio::time::timeout(EXIT_TIMEOUT, async {
                handle.module.lock().await.on_exit().await;
            })
            .await;

            match exited {
                Ok(()) => info!(id = handle.id, "module exited"),
                Err(_) => warn!(id = handle.id, "module on_exit timed out"),
            }
        }

        *self.inner.lock().await = RegistryInner::default();
    }
}
