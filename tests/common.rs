//! Shared fixtures for the host integration tests.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use modhost::config::HostPaths;
use modhost::module::{Module, ModuleError, RendererPort};
use modhost::settings::{Setting, SettingsEntry};

/// Temp host root with the standard directory layout.
pub struct HostFixture {
    _temp: TempDir,
    pub paths: HostPaths,
}

impl HostFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = HostPaths::new(temp.path().join("host"));
        std::fs::create_dir_all(&paths.archives_dir).unwrap();
        std::fs::create_dir_all(&paths.storage_dir).unwrap();
        Self { _temp: temp, paths }
    }

    /// Author a module distribution archive in the archives directory.
    pub fn write_archive(&self, stem: &str, files: &[(&str, &str)]) {
        let path = self.paths.archives_dir.join(format!("{stem}.zip"));
        let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, contents) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    pub fn remove_archive(&self, stem: &str) {
        std::fs::remove_file(self.paths.archives_dir.join(format!("{stem}.zip"))).unwrap();
    }

    pub fn compiled_dir(&self, stem: &str) -> PathBuf {
        self.paths.compiled_dir.join(stem)
    }
}

pub fn manifest_json(name: &str, build_version: u64) -> String {
    json!({
        "moduleName": name,
        "author": "tester",
        "version": "1.0.0",
        "buildVersion": build_version,
    })
    .to_string()
}

/// Renderer port that records every notification.
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<(String, String, Vec<Value>)>>,
}

impl RecordingRenderer {
    pub fn of_type(&self, event_type: &str) -> Vec<(String, Vec<Value>)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| e == event_type)
            .map(|(s, _, d)| (s.clone(), d.clone()))
            .collect()
    }
}

impl RendererPort for RecordingRenderer {
    fn notify(&self, source: &str, event_type: &str, data: Vec<Value>) {
        self.events
            .lock()
            .unwrap()
            .push((source.to_string(), event_type.to_string(), data));
    }
}

/// Scripted module that records every lifecycle call into a shared log.
pub struct TestModule {
    id: String,
    display_name: String,
    settings: Vec<SettingsEntry>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl TestModule {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            settings: Vec::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_settings(mut self, settings: Vec<SettingsEntry>) -> Self {
        self.settings = settings;
        self
    }

    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Module for TestModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn register_settings(&self) -> Vec<SettingsEntry> {
        self.settings.clone()
    }

    async fn handle_event(
        &mut self,
        event_type: &str,
        data: &[Value],
    ) -> Result<Value, ModuleError> {
        self.record(format!("event:{event_type}"));
        Ok(json!({ "handled_by": self.id, "event": event_type, "data": data }))
    }

    async fn on_gui_shown(&mut self) {
        self.record("shown".to_string());
    }

    async fn on_gui_hidden(&mut self) {
        self.record("hidden".to_string());
    }

    async fn on_setting_modified(&mut self, setting: &Setting) {
        self.record(format!("setting:{}", setting.access_id()));
    }

    async fn on_exit(&mut self) {
        let id = self.id.clone();
        self.record(format!("exit:{id}"));
    }
}
