//! Module manifest parsing and comparison.
//!
//! Every module distribution carries a `moduleinfo.json` describing its
//! identity and build. The manifest is parsed once and never mutated; the
//! build cache compares manifests field-wise across builds to decide whether
//! a recompile is needed.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::module::traits::ModuleError;

/// Manifest file name, at a fixed relative path inside every module.
pub const MANIFEST_FILE_NAME: &str = "moduleinfo.json";

/// Immutable module descriptor (`moduleinfo.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    /// Display name; the routing id is derived from it.
    pub module_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bumped by module authors to force a rebuild; compared as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_version: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl ModuleManifest {
    /// Read a manifest file. A missing file yields `Ok(None)`; corrupt JSON
    /// or an empty module name is an error, so the caller can distinguish
    /// "missing" from "corrupt".
    pub async fn read(path: &Path) -> Result<Option<Self>, ModuleError> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let manifest: ModuleManifest = serde_json::from_slice(&contents).map_err(|e| {
            ModuleError::InvalidManifest(format!("failed to parse {}: {}", path.display(), e))
        })?;

        if manifest.module_name.is_empty() {
            return Err(ModuleError::InvalidManifest(format!(
                "{}: moduleName cannot be empty",
                path.display()
            )));
        }

        Ok(Some(manifest))
    }

    /// Routing id derived from the module name.
    pub fn routing_id(&self) -> String {
        self.module_name.to_lowercase()
    }

    /// Present fields coerced to strings, for cache comparison.
    pub fn coerced_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("moduleName", self.module_name.clone())];
        if let Some(author) = &self.author {
            fields.push(("author", author.clone()));
        }
        if let Some(version) = &self.version {
            fields.push(("version", version.clone()));
        }
        if let Some(description) = &self.description {
            fields.push(("description", description.clone()));
        }
        if let Some(build_version) = &self.build_version {
            fields.push(("buildVersion", coerce_value(build_version)));
        }
        if !self.platforms.is_empty() {
            fields.push(("platforms", self.platforms.join(",")));
        }
        if let Some(link) = &self.link {
            fields.push(("link", link.clone()));
        }
        fields
    }

    /// True when any field present in `self` (the extracted manifest) does
    /// not string-equal the corresponding field in `built`.
    pub fn differs_from(&self, built: &ModuleManifest) -> bool {
        let built_fields: std::collections::HashMap<_, _> =
            built.coerced_fields().into_iter().collect();
        self.coerced_fields()
            .into_iter()
            .any(|(key, value)| built_fields.get(key) != Some(&value))
    }
}

fn coerce_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
