//! Host assembly.
//!
//! Wires the build pipeline, registry, router, and loader into one running
//! host: one build pass, then module loading and registration, then event
//! routing until shutdown. Loading never observes a build in flight.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::build::{BuildError, BuildPipeline, BuildReport, Transpiler};
use crate::config::HostConfig;
use crate::module::{
    EventRouter, ModuleFactory, ModuleLoader, ModuleRegistry, RendererPort,
};
use crate::settings::SettingsStore;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to prepare host directories: {0}")]
    Io(#[from] std::io::Error),

    #[error("build pass failed: {0}")]
    Build(#[from] BuildError),

    #[error("not a module archive: {0}")]
    NotAnArchive(String),
}

/// A running plugin host.
pub struct Host {
    config: HostConfig,
    registry: Arc<ModuleRegistry>,
    router: Arc<EventRouter>,
    router_task: Option<JoinHandle<()>>,
    /// Outcome of the startup build pass.
    pub build_report: BuildReport,
}

impl Host {
    /// Bring the host up: prepare directories, run one full build pass,
    /// then load and register every compiled module. A failed module build
    /// or registration leaves that module out for this run; only
    /// infrastructure failures abort startup.
    pub async fn start(
        config: HostConfig,
        renderer: Arc<dyn RendererPort>,
        factory: Arc<dyn ModuleFactory>,
        transpiler: Arc<dyn Transpiler>,
    ) -> Result<Self, HostError> {
        config.paths.ensure_directories().await?;

        let pipeline = BuildPipeline::new(&config.paths, config.force_reload, transpiler);
        let build_report = pipeline.build_all().await?;

        let store = SettingsStore::new(&config.paths.storage_dir);
        let registry = Arc::new(ModuleRegistry::new(store));
        let router = EventRouter::new(Arc::clone(&registry), renderer);
        let router_task = router.start();

        let loader = ModuleLoader::new(&config.paths.compiled_dir, factory);
        for module in loader.load_all(&router.link()).await {
            let id = module.id().to_string();
            if let Err(e) = registry.register(module).await {
                warn!(id, error = %e, "module registration failed, continuing");
            }
        }

        info!(modules = registry.len().await, "host started");
        Ok(Self {
            config,
            registry,
            router,
            router_task: Some(router_task),
            build_report,
        })
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Copy a module archive into the archive drop directory. Takes effect
    /// at the next build pass.
    pub async fn import_archive(&self, source: &Path) -> Result<(), HostError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| n.to_ascii_lowercase().ends_with(".zip"))
            .ok_or_else(|| HostError::NotAnArchive(source.display().to_string()))?;

        let dest = self.config.paths.archives_dir.join(file_name);
        tokio::fs::copy(source, &dest).await?;
        info!(archive = file_name, "imported module archive");
        Ok(())
    }

    /// Stop the host: every module's `on_exit` runs in registration order
    /// before the router is torn down.
    pub async fn stop(&mut self) {
        self.registry.shutdown().await;
        if let Some(task) = self.router_task.take() {
            task.abort();
        }
        info!("host stopped");
    }
}
