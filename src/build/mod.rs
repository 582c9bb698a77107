//! Module build pipeline.
//!
//! Turns module distribution archives into ready-to-load artifact trees:
//! extraction into a temp root, a manifest-comparison cache that skips
//! unchanged modules, a compiler that fully deletes and repopulates each
//! rebuilt output directory, and stale-output cleanup for archives that have
//! disappeared. Per-module units run concurrently under a worker bound and
//! are joined before module loading begins.

pub mod archive;
pub mod cache;
pub mod compiler;
pub mod pipeline;

pub use archive::{ArchiveExtractor, ExtractedModule, ExtractionPass};
pub use cache::BuildCache;
pub use compiler::{Compiler, Diagnostic, ScriptTranspiler, Transpiler, SHARED_ASSETS_DIR};
pub use pipeline::{BuildPipeline, BuildReport};

use std::path::PathBuf;
use thiserror::Error;

/// Build pipeline errors. Per-module failures are collected into the
/// [`BuildReport`] instead of aborting the run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error in {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("compile failed for '{module}': {}", format_diagnostics(.diagnostics))]
    Compile {
        module: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("build worker pool closed")]
    WorkersClosed,

    #[error("build task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
