//! Module archive extraction.
//!
//! Unpacks every supported archive in the archives directory into a
//! per-archive subdirectory of the temp extraction root. The temp root is
//! working state only; the pipeline deletes it after compilation.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::build::BuildError;

/// One extracted module source tree.
#[derive(Debug, Clone)]
pub struct ExtractedModule {
    /// Archive file stem; becomes the compiled output directory name.
    pub name: String,
    /// Extracted source tree root.
    pub dir: PathBuf,
}

/// Result of one extraction pass over the archives directory.
#[derive(Debug, Default)]
pub struct ExtractionPass {
    /// Successfully extracted module source trees.
    pub modules: Vec<ExtractedModule>,
    /// Stems of every archive present on disk, whether or not it
    /// extracted. Stale-output cleanup keys off presence, so a corrupt
    /// archive keeps its previously compiled output.
    pub archive_stems: Vec<String>,
}

/// Unpacks module distribution archives.
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Wipe and recreate `temp_dir`, then extract every `.zip` found in
    /// `archives_dir` into `temp_dir/<stem>/`. A failing archive is logged
    /// and skipped; it never aborts the other extractions.
    pub async fn extract_all(
        archives_dir: &Path,
        temp_dir: &Path,
    ) -> Result<ExtractionPass, BuildError> {
        remove_dir_if_present(temp_dir).await?;
        tokio::fs::create_dir_all(temp_dir).await?;

        let mut pass = ExtractionPass::default();
        let mut entries = tokio::fs::read_dir(archives_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let is_zip = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
            if !is_zip {
                debug!(path = %path.display(), "skipping non-archive file");
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                warn!(path = %path.display(), "archive name is not valid UTF-8, skipping");
                continue;
            };
            pass.archive_stems.push(stem.clone());

            let dest = temp_dir.join(&stem);
            tokio::fs::create_dir_all(&dest).await?;

            let archive_path = path.clone();
            let dest_clone = dest.clone();
            let result =
                tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest_clone))
                    .await?;

            match result {
                Ok(()) => pass.modules.push(ExtractedModule { name: stem, dir: dest }),
                Err(e) => warn!(archive = %path.display(), error = %e, "failed to extract archive, skipping"),
            }
        }

        Ok(pass)
    }
}

/// Extract one zip archive. Directory entries create directories; file
/// entries are streamed to disk rather than buffered whole.
fn extract_archive(archive: &Path, dest: &Path) -> Result<(), BuildError> {
    let archive_err = |message: String| BuildError::Archive {
        path: archive.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| archive_err(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(
                archive = %archive.display(),
                entry = entry.name(),
                "entry escapes the extraction root, skipping"
            );
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    Ok(())
}

pub(crate) async fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
