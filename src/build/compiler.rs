//! Module compiler.
//!
//! Transforms one extracted module source tree into a loadable artifact
//! tree: source files go through the pluggable [`Transpiler`], markup files
//! get shared-asset path markers rewritten, everything else is copied
//! byte-for-byte. Output directories are fully deleted before repopulation
//! so stale files never survive a rebuild, and a failed compile removes its
//! partial output instead of leaving it looking valid.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::build::archive::remove_dir_if_present;
use crate::build::BuildError;

/// Subdirectory of every compiled module holding the shared host assets
/// (stylesheet, font), so modules reference them by a stable relative path.
pub const SHARED_ASSETS_DIR: &str = "assets";

/// Marker comment in module markup: the line following it has its relative
/// asset prefix rewritten to point at the module's shared-assets directory.
pub const HTML_ASSET_MARKER: &str = "<!-- @asset -->";

const HTML_ASSET_PREFIX: &str = "../../";

/// One compilation diagnostic (syntax or type error).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// Source-to-artifact transformation seam. One output artifact per input
/// file; diagnostics abort the owning module's build.
pub trait Transpiler: Send + Sync {
    /// Whether this file should be transpiled rather than copied.
    fn handles(&self, path: &Path) -> bool;

    /// Output artifact name for a handled input file name.
    fn output_name(&self, file_name: &str) -> String;

    fn transpile(&self, source: &str, file_name: &str) -> Result<String, Vec<Diagnostic>>;
}

/// Default transpiler: maps `.ts` sources to `.js` artifacts, rejecting
/// files with unbalanced delimiters. Declaration files are copied as-is.
pub struct ScriptTranspiler;

impl Transpiler for ScriptTranspiler {
    fn handles(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.ends_with(".ts") && !name.ends_with(".d.ts")
    }

    fn output_name(&self, file_name: &str) -> String {
        match file_name.strip_suffix(".ts") {
            Some(stem) => format!("{stem}.js"),
            None => file_name.to_string(),
        }
    }

    fn transpile(&self, source: &str, file_name: &str) -> Result<String, Vec<Diagnostic>> {
        check_balanced(source, file_name)?;
        Ok(source.to_string())
    }
}

/// Cheap structural check: every `()`, `[]`, `{}` must nest correctly.
fn check_balanced(source: &str, file_name: &str) -> Result<(), Vec<Diagnostic>> {
    let mut stack = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        for c in line.chars() {
            match c {
                '(' | '[' | '{' => stack.push((c, line_no + 1)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop().map(|(open, _)| open) != Some(expected) {
                        return Err(vec![Diagnostic {
                            file: file_name.to_string(),
                            message: format!("unbalanced '{c}' at line {}", line_no + 1),
                        }]);
                    }
                }
                _ => {}
            }
        }
    }

    if let Some((open, line)) = stack.pop() {
        return Err(vec![Diagnostic {
            file: file_name.to_string(),
            message: format!("unclosed '{open}' opened at line {line}"),
        }]);
    }
    Ok(())
}

/// Compiles one module source tree into one artifact tree.
pub struct Compiler {
    transpiler: Arc<dyn Transpiler>,
    /// Shared host asset files copied into every rebuilt module.
    shared_assets: Vec<PathBuf>,
}

impl Compiler {
    pub fn new(transpiler: Arc<dyn Transpiler>, shared_assets: Vec<PathBuf>) -> Self {
        Self {
            transpiler,
            shared_assets,
        }
    }

    /// Rebuild `out_dir` from `src_dir`: full delete, recursive
    /// compile-and-copy, then the shared-asset copy. Any failure while the
    /// output is being populated removes the partial tree, so the module is
    /// simply unavailable this run rather than half-built and cache-valid.
    pub async fn compile_module(
        &self,
        src_dir: &Path,
        out_dir: &Path,
        module_name: &str,
    ) -> Result<(), BuildError> {
        info!(module = module_name, "compiling");
        remove_dir_if_present(out_dir).await?;

        if let Err(e) = self.populate(src_dir, out_dir, module_name).await {
            if let Err(cleanup) = remove_dir_if_present(out_dir).await {
                warn!(
                    module = module_name,
                    error = %cleanup,
                    "failed to remove partial output after compile error"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    async fn populate(
        &self,
        src_dir: &Path,
        out_dir: &Path,
        module_name: &str,
    ) -> Result<(), BuildError> {
        self.compile_tree(src_dir, out_dir, module_name).await?;
        self.copy_shared_assets(out_dir).await
    }

    fn compile_tree<'a>(
        &'a self,
        src: &'a Path,
        out: &'a Path,
        module_name: &'a str,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        async move {
            tokio::fs::create_dir_all(out).await?;

            let mut entries = tokio::fs::read_dir(src).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from)
                else {
                    warn!(path = %path.display(), "file name is not valid UTF-8, skipping");
                    continue;
                };

                if entry.file_type().await?.is_dir() {
                    self.compile_tree(&path, &out.join(&file_name), module_name)
                        .await?;
                } else if self.transpiler.handles(&path) {
                    let source = tokio::fs::read_to_string(&path).await?;
                    let artifact = self
                        .transpiler
                        .transpile(&source, &file_name)
                        .map_err(|diagnostics| BuildError::Compile {
                            module: module_name.to_string(),
                            diagnostics,
                        })?;
                    let out_path = out.join(self.transpiler.output_name(&file_name));
                    tokio::fs::write(&out_path, artifact).await?;
                    debug!(artifact = %out_path.display(), "transpiled");
                } else if file_name.ends_with(".html") {
                    rewrite_asset_paths(&path, &out.join(&file_name)).await?;
                } else {
                    tokio::fs::copy(&path, out.join(&file_name)).await?;
                }
            }

            Ok(())
        }
        .boxed()
    }

    async fn copy_shared_assets(&self, out_dir: &Path) -> Result<(), BuildError> {
        let assets_dir = out_dir.join(SHARED_ASSETS_DIR);
        tokio::fs::create_dir_all(&assets_dir).await?;

        for asset in &self.shared_assets {
            let Some(name) = asset.file_name() else {
                continue;
            };
            match tokio::fs::copy(asset, assets_dir.join(name)).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(asset = %asset.display(), "shared asset missing, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Delete every previously compiled directory whose name has no matching
    /// archive. Zero archives means all outputs are removed: no input, no
    /// output.
    pub async fn remove_stale_outputs(
        compiled_dir: &Path,
        archive_stems: &[String],
    ) -> Result<(), BuildError> {
        let mut entries = match tokio::fs::read_dir(compiled_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let stale = name
                .to_str()
                .map_or(true, |n| !archive_stems.iter().any(|s| s == n));
            if stale {
                info!(dir = %entry.path().display(), "removing stale compiled output");
                tokio::fs::remove_dir_all(entry.path()).await?;
            }
        }
        Ok(())
    }
}

/// Copy a markup file, rewriting the line after each asset marker so its
/// relative reference points into the module's shared-assets directory.
async fn rewrite_asset_paths(src: &Path, dest: &Path) -> Result<(), BuildError> {
    let contents = tokio::fs::read_to_string(src).await?;
    let mut lines: Vec<String> = contents.lines().map(String::from).collect();

    let mut rewrite_next = false;
    for line in lines.iter_mut() {
        if rewrite_next {
            *line = line.replace(HTML_ASSET_PREFIX, &format!("./{SHARED_ASSETS_DIR}/"));
            rewrite_next = false;
        } else if line.trim() == HTML_ASSET_MARKER {
            rewrite_next = true;
        }
    }

    tokio::fs::write(dest, lines.join("\n")).await?;
    Ok(())
}
