//! Loader tests: entry artifact discovery, manifest tolerance, and
//! per-module failure isolation.

mod common;

use std::sync::Arc;

use modhost::module::{
    EventRouter, ManifestModuleFactory, ModuleLoader, ModuleRegistry,
};
use modhost::settings::SettingsStore;

use common::{manifest_json, HostFixture, RecordingRenderer};

fn write_compiled_module(fixture: &HostFixture, stem: &str, files: &[(&str, &str)]) {
    let dir = fixture.compiled_dir(stem);
    std::fs::create_dir_all(&dir).unwrap();
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

fn loader_link(fixture: &HostFixture) -> modhost::module::HostLink {
    let registry = Arc::new(ModuleRegistry::new(SettingsStore::new(
        &fixture.paths.storage_dir,
    )));
    EventRouter::new(registry, Arc::new(RecordingRenderer::default())).link()
}

#[tokio::test]
async fn loads_module_with_entry_artifact_and_manifest() {
    let fixture = HostFixture::new();
    write_compiled_module(
        &fixture,
        "clock",
        &[
            ("ClockProcess.js", "// compiled"),
            ("moduleinfo.json", &manifest_json("Clock", 1)),
        ],
    );

    let loader = ModuleLoader::new(&fixture.paths.compiled_dir, Arc::new(ManifestModuleFactory));
    let modules = loader.load_all(&loader_link(&fixture)).await;

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].id(), "clock");
    assert_eq!(modules[0].display_name(), "Clock");
    assert!(modules[0].manifest().is_some());
}

#[tokio::test]
async fn directory_without_entry_artifact_is_skipped() {
    let fixture = HostFixture::new();
    write_compiled_module(
        &fixture,
        "broken",
        &[
            ("main.js", "// no marker in the name"),
            ("moduleinfo.json", &manifest_json("Broken", 1)),
        ],
    );
    write_compiled_module(
        &fixture,
        "clock",
        &[
            ("ClockProcess.js", "// compiled"),
            ("moduleinfo.json", &manifest_json("Clock", 1)),
        ],
    );

    let loader = ModuleLoader::new(&fixture.paths.compiled_dir, Arc::new(ManifestModuleFactory));
    let modules = loader.load_all(&loader_link(&fixture)).await;

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].id(), "clock");
}

#[tokio::test]
async fn manifest_factory_requires_a_manifest() {
    let fixture = HostFixture::new();
    write_compiled_module(&fixture, "anon", &[("AnonProcess.js", "// compiled")]);

    let loader = ModuleLoader::new(&fixture.paths.compiled_dir, Arc::new(ManifestModuleFactory));
    let modules = loader.load_all(&loader_link(&fixture)).await;
    assert!(modules.is_empty());
}

#[tokio::test]
async fn missing_compiled_directory_loads_nothing() {
    let fixture = HostFixture::new();
    let loader = ModuleLoader::new(&fixture.paths.compiled_dir, Arc::new(ManifestModuleFactory));
    assert!(loader.load_all(&loader_link(&fixture)).await.is_empty());
}
