//! End-to-end host tests: build, load, register, route, shut down.

mod common;

use std::sync::Arc;

use serde_json::json;

use modhost::build::ScriptTranspiler;
use modhost::config::HostConfig;
use modhost::host::{Host, HostError};
use modhost::module::{ManifestModuleFactory, EVENT_RENDERER_INIT, HOST_ID};

use common::{manifest_json, HostFixture, RecordingRenderer};

async fn start_host(fixture: &HostFixture, renderer: Arc<RecordingRenderer>) -> Host {
    let config = HostConfig {
        paths: fixture.paths.clone(),
        force_reload: false,
        log_filter: None,
    };
    Host::start(
        config,
        renderer,
        Arc::new(ManifestModuleFactory),
        Arc::new(ScriptTranspiler),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn archive_to_routable_module() {
    let fixture = HostFixture::new();
    fixture.write_archive(
        "gadget",
        &[
            ("moduleinfo.json", &manifest_json("Gadget", 1)),
            ("GadgetProcess.ts", "const x = 1;\n"),
        ],
    );

    let renderer = Arc::new(RecordingRenderer::default());
    let mut host = start_host(&fixture, Arc::clone(&renderer)).await;

    assert_eq!(host.build_report.built, vec!["gadget"]);
    assert_eq!(host.registry().ids().await, vec!["gadget"]);

    // Renderer init announces the module set and shows the first module.
    host.router()
        .dispatch(HOST_ID, EVENT_RENDERER_INIT, &[])
        .await
        .unwrap();
    let announced = renderer.of_type("load-modules");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].1[0]["gadget"], "Gadget");

    host.stop().await;
    assert!(host.registry().is_empty().await);
}

#[tokio::test]
async fn second_start_hits_the_build_cache() {
    let fixture = HostFixture::new();
    fixture.write_archive(
        "gadget",
        &[
            ("moduleinfo.json", &manifest_json("Gadget", 1)),
            ("GadgetProcess.ts", "const x = 1;\n"),
        ],
    );

    let renderer = Arc::new(RecordingRenderer::default());
    let mut first = start_host(&fixture, Arc::clone(&renderer)).await;
    first.stop().await;

    let mut second = start_host(&fixture, renderer).await;
    assert_eq!(second.build_report.skipped, vec!["gadget"]);
    assert!(second.build_report.built.is_empty());
    assert_eq!(second.registry().ids().await, vec!["gadget"]);
    second.stop().await;
}

#[tokio::test]
async fn failed_module_build_leaves_the_rest_running() {
    let fixture = HostFixture::new();
    fixture.write_archive(
        "fine",
        &[
            ("moduleinfo.json", &manifest_json("Fine", 1)),
            ("FineProcess.ts", "const ok = true;\n"),
        ],
    );
    fixture.write_archive(
        "broken",
        &[
            ("moduleinfo.json", &manifest_json("Broken", 1)),
            ("BrokenProcess.ts", "function f() {\n"),
        ],
    );

    let mut host = start_host(&fixture, Arc::new(RecordingRenderer::default())).await;
    assert_eq!(host.registry().ids().await, vec!["fine"]);
    assert_eq!(host.build_report.failed.len(), 1);
    host.stop().await;
}

#[tokio::test]
async fn import_archive_stages_for_next_build() {
    let fixture = HostFixture::new();
    let mut host = start_host(&fixture, Arc::new(RecordingRenderer::default())).await;
    assert!(host.registry().is_empty().await);

    // Author an archive outside the host root, then import it.
    let outside = tempfile::TempDir::new().unwrap();
    let staged = HostFixture::new();
    staged.write_archive(
        "gadget",
        &[("moduleinfo.json", &manifest_json("Gadget", 1))],
    );
    let source = staged.paths.archives_dir.join("gadget.zip");
    let outside_copy = outside.path().join("gadget.zip");
    std::fs::copy(&source, &outside_copy).unwrap();

    host.import_archive(&outside_copy).await.unwrap();
    assert!(fixture.paths.archives_dir.join("gadget.zip").exists());

    let err = host
        .import_archive(&outside.path().join("gadget.tar"))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::NotAnArchive(_)));
    host.stop().await;

    // The next host start picks the imported archive up. It builds, but
    // carries no entry artifact, so nothing loads.
    let mut next = start_host(&fixture, Arc::new(RecordingRenderer::default())).await;
    assert_eq!(next.build_report.built, vec!["gadget"]);
    assert!(next.registry().is_empty().await);
    next.stop().await;
}

#[tokio::test]
async fn swap_event_from_the_ui_switches_modules() {
    let fixture = HostFixture::new();
    for (stem, name) in [("alpha", "Alpha"), ("beta", "Beta")] {
        fixture.write_archive(
            stem,
            &[
                ("moduleinfo.json", &manifest_json(name, 1)),
                (&format!("{name}Process.ts"), "const x = 1;\n"),
            ],
        );
    }

    let renderer = Arc::new(RecordingRenderer::default());
    let mut host = start_host(&fixture, Arc::clone(&renderer)).await;

    host.router()
        .dispatch(HOST_ID, "swap-modules", &[json!("beta")])
        .await
        .unwrap();
    assert_eq!(host.router().visible_module().await.as_deref(), Some("beta"));
    host.stop().await;
}
