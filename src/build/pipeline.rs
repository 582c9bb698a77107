//! Build pipeline orchestration.
//!
//! Runs the full pass: extract archives, delete stale outputs, then one
//! independent unit of work per module (cache check, compile, asset copy)
//! with bounded concurrency. All units are joined before the report is
//! returned, so module loading never observes a build in flight.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::build::archive::{remove_dir_if_present, ArchiveExtractor};
use crate::build::cache::BuildCache;
use crate::build::compiler::{Compiler, Transpiler};
use crate::build::BuildError;
use crate::config::HostPaths;

/// Concurrent per-module build units; bounded to avoid file-descriptor
/// exhaustion.
const MAX_BUILD_WORKERS: usize = 8;

/// Outcome of one build pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Modules that were (re)compiled.
    pub built: Vec<String>,
    /// Modules skipped because their manifest was unchanged.
    pub skipped: Vec<String>,
    /// Modules whose build failed; they are unavailable this run.
    pub failed: Vec<(String, BuildError)>,
}

/// Orchestrates one extract-compare-compile pass over all module archives.
pub struct BuildPipeline {
    paths: HostPaths,
    force_reload: bool,
    compiler: Arc<Compiler>,
}

impl BuildPipeline {
    pub fn new(paths: &HostPaths, force_reload: bool, transpiler: Arc<dyn Transpiler>) -> Self {
        let shared_assets = paths.shared_asset_files();
        Self {
            paths: paths.clone(),
            force_reload,
            compiler: Arc::new(Compiler::new(transpiler, shared_assets)),
        }
    }

    /// Run the full pass. Only infrastructure failures (unreadable archive
    /// root, undeletable outputs) are returned as `Err`; per-module failures
    /// land in the report.
    pub async fn build_all(&self) -> Result<BuildReport, BuildError> {
        let pass =
            ArchiveExtractor::extract_all(&self.paths.archives_dir, &self.paths.temp_dir).await?;

        // Cleanup keys off the archives present on disk: an archive that
        // failed to extract this pass keeps its previous compiled output.
        Compiler::remove_stale_outputs(&self.paths.compiled_dir, &pass.archive_stems).await?;
        tokio::fs::create_dir_all(&self.paths.compiled_dir).await?;

        let semaphore = Arc::new(Semaphore::new(MAX_BUILD_WORKERS));
        let mut units = JoinSet::new();

        for module in pass.modules {
            let semaphore = Arc::clone(&semaphore);
            let compiler = Arc::clone(&self.compiler);
            let out_dir = self.paths.compiled_dir.join(&module.name);
            let force_reload = self.force_reload;

            units.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (module.name, Err(BuildError::WorkersClosed)),
                };

                if !force_reload && !BuildCache::should_rebuild(&module.dir, &out_dir).await {
                    info!(module = module.name, "no changes detected, skipping compile");
                    return (module.name, Ok(false));
                }

                let result = compiler
                    .compile_module(&module.dir, &out_dir, &module.name)
                    .await
                    .map(|()| true);
                (module.name, result)
            });
        }

        let mut report = BuildReport::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((name, Ok(true))) => report.built.push(name),
                Ok((name, Ok(false))) => report.skipped.push(name),
                Ok((name, Err(e))) => {
                    warn!(module = name, error = %e, "module build failed, continuing");
                    report.failed.push((name, e));
                }
                Err(e) => warn!(error = %e, "build unit panicked"),
            }
        }

        cleanup_temp(&self.paths.temp_dir).await;

        info!(
            built = report.built.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "build pass complete"
        );
        Ok(report)
    }
}

async fn cleanup_temp(temp_dir: &Path) {
    if let Err(e) = remove_dir_if_present(temp_dir).await {
        warn!(dir = %temp_dir.display(), error = %e, "failed to remove temp extraction root");
    }
}
