//! Module loading.
//!
//! Walks the compiled-output root one level deep, locates each module's
//! entry artifact by a fixed marker token in the file name, reads the
//! adjacent manifest, and asks the pluggable [`ModuleFactory`] for exactly
//! one module instance. One module's failure never prevents the others from
//! loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::module::manifest::{ModuleManifest, MANIFEST_FILE_NAME};
use crate::module::traits::{HostLink, Module, ModuleError};

/// Token identifying a file as the module's entry artifact.
pub const ENTRY_MARKER: &str = "Process";

/// Discovery contract: turns one compiled entry artifact into one live
/// module instance. This is an explicit registration point; the host never
/// introspects artifact exports.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    async fn instantiate(
        &self,
        entry_path: &Path,
        manifest: Option<ModuleManifest>,
        link: HostLink,
    ) -> Result<Box<dyn Module>, ModuleError>;
}

/// Loads module instances from the compiled-output root.
pub struct ModuleLoader {
    compiled_dir: PathBuf,
    factory: Arc<dyn ModuleFactory>,
}

impl ModuleLoader {
    pub fn new(compiled_dir: impl Into<PathBuf>, factory: Arc<dyn ModuleFactory>) -> Self {
        Self {
            compiled_dir: compiled_dir.into(),
            factory,
        }
    }

    /// Instantiate every loadable module. Failures (missing entry artifact,
    /// factory errors) are logged; the affected module is simply absent from
    /// the returned set.
    pub async fn load_all(&self, link: &HostLink) -> Vec<Box<dyn Module>> {
        let mut modules = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.compiled_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.compiled_dir.display(), error = %e, "cannot read compiled modules directory");
                return modules;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry");
                    break;
                }
            };

            let dir = entry.path();
            match entry.file_type().await {
                Ok(t) if t.is_dir() => {}
                _ => continue,
            }

            match self.load_one(&dir, link).await {
                Ok(module) => {
                    debug!(id = module.id(), "loaded module");
                    modules.push(module);
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "failed to load module, skipping");
                }
            }
        }

        modules
    }

    async fn load_one(&self, dir: &Path, link: &HostLink) -> Result<Box<dyn Module>, ModuleError> {
        let entry_path = find_entry_artifact(dir).await?.ok_or_else(|| {
            ModuleError::LoadError(format!(
                "no entry artifact matching '{ENTRY_MARKER}' in {}",
                dir.display()
            ))
        })?;

        // A missing manifest is tolerated; the module just carries none.
        let manifest = match ModuleManifest::read(&dir.join(MANIFEST_FILE_NAME)).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable manifest, loading without one");
                None
            }
        };

        self.factory
            .instantiate(&entry_path, manifest, link.clone())
            .await
    }
}

async fn find_entry_artifact(dir: &Path) -> Result<Option<PathBuf>, ModuleError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| n.contains(ENTRY_MARKER)) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Default factory used by the host binary: wraps each compiled artifact in
/// a manifest-described shell. Deployments with richer module behavior
/// supply their own [`ModuleFactory`].
pub struct ManifestModuleFactory;

#[async_trait]
impl ModuleFactory for ManifestModuleFactory {
    async fn instantiate(
        &self,
        entry_path: &Path,
        manifest: Option<ModuleManifest>,
        link: HostLink,
    ) -> Result<Box<dyn Module>, ModuleError> {
        let manifest = manifest.ok_or_else(|| {
            ModuleError::LoadError(format!(
                "{} has no manifest to derive an identity from",
                entry_path.display()
            ))
        })?;

        Ok(Box::new(ShellModule {
            id: manifest.routing_id(),
            display_name: manifest.module_name.clone(),
            manifest,
            entry_path: entry_path.to_path_buf(),
            link,
        }))
    }
}

/// Minimal module wrapping a compiled artifact: carries identity, manifest,
/// and the entry-artifact path for the renderer to load.
struct ShellModule {
    id: String,
    display_name: String,
    manifest: ModuleManifest,
    entry_path: PathBuf,
    link: HostLink,
}

#[async_trait]
impl Module for ShellModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn manifest(&self) -> Option<&ModuleManifest> {
        Some(&self.manifest)
    }

    async fn handle_event(
        &mut self,
        event_type: &str,
        _data: &[Value],
    ) -> Result<Value, ModuleError> {
        match event_type {
            "init" => {
                self.link.notify_renderer(
                    &self.id,
                    "entry-artifact",
                    vec![Value::String(self.entry_path.display().to_string())],
                );
                Ok(Value::Null)
            }
            _ => {
                debug!(id = self.id, event_type, "unhandled event");
                Ok(Value::Null)
            }
        }
    }
}
