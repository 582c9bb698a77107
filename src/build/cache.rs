//! Build cache: decides whether a module needs recompiling.
//!
//! The decision compares the manifest extracted from the archive against the
//! manifest left behind by the previous build. Any missing or corrupt
//! manifest means "rebuild"; a cache hit requires every extracted field to
//! string-equal its built counterpart.

use std::path::Path;

use tracing::{debug, warn};

use crate::module::manifest::{ModuleManifest, MANIFEST_FILE_NAME};

pub struct BuildCache;

impl BuildCache {
    /// True when the module in `extracted_dir` must be recompiled into
    /// `built_dir`. Never fails: manifest problems are logged and treated as
    /// "rebuild required".
    pub async fn should_rebuild(extracted_dir: &Path, built_dir: &Path) -> bool {
        let Some(built) = Self::read_manifest(built_dir).await else {
            return true;
        };
        let Some(extracted) = Self::read_manifest(extracted_dir).await else {
            return true;
        };

        if extracted.differs_from(&built) {
            debug!(dir = %extracted_dir.display(), "manifest changed, rebuild required");
            return true;
        }
        false
    }

    async fn read_manifest(dir: &Path) -> Option<ModuleManifest> {
        let path = dir.join(MANIFEST_FILE_NAME);
        match ModuleManifest::read(&path).await {
            Ok(Some(manifest)) => Some(manifest),
            Ok(None) => {
                warn!(dir = %dir.display(), "no {MANIFEST_FILE_NAME} present");
                None
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable {MANIFEST_FILE_NAME}");
                None
            }
        }
    }
}
