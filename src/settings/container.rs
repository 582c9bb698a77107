//! Per-module settings container.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::warn;

use crate::settings::setting::Setting;

/// Entry produced by a module's `register_settings`: either a setting or a
/// section header shown between settings on the settings page.
#[derive(Clone)]
pub enum SettingsEntry {
    Header(String),
    Setting(Setting),
}

impl From<Setting> for SettingsEntry {
    fn from(setting: Setting) -> Self {
        SettingsEntry::Setting(setting)
    }
}

impl From<&str> for SettingsEntry {
    fn from(header: &str) -> Self {
        SettingsEntry::Header(header.to_string())
    }
}

enum DisplayEntry {
    Header(String),
    Setting(usize),
}

/// Ordered settings collection for one module.
///
/// Keeps two views consistent: the display list (settings interleaved with
/// section headers, in registration order) and a lookup map keyed by both
/// name and access id. Every setting in the map appears exactly once in the
/// display list; headers appear only in the display list.
#[derive(Default)]
pub struct ModuleSettings {
    settings: Vec<Setting>,
    display: Vec<DisplayEntry>,
    lookup: HashMap<String, usize>,
}

impl ModuleSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<SettingsEntry>) -> Self {
        let mut settings = Self::new();
        for entry in entries {
            match entry {
                SettingsEntry::Header(text) => settings.add_header(text),
                SettingsEntry::Setting(setting) => settings.add(setting),
            }
        }
        settings
    }

    /// Add a setting, indexing it by name and, when distinct, by access id.
    /// A colliding key keeps the first registrant.
    pub fn add(&mut self, setting: Setting) {
        if self.lookup.contains_key(setting.name())
            || self.lookup.contains_key(setting.access_id())
        {
            warn!(
                name = setting.name(),
                "duplicate setting key, keeping the first registrant"
            );
            return;
        }

        let index = self.settings.len();
        self.lookup.insert(setting.name().to_string(), index);
        if setting.access_id() != setting.name() {
            self.lookup.insert(setting.access_id().to_string(), index);
        }
        self.settings.push(setting);
        self.display.push(DisplayEntry::Setting(index));
    }

    pub fn add_header(&mut self, text: impl Into<String>) {
        self.display.push(DisplayEntry::Header(text.into()));
    }

    /// Look up a setting by name or access id.
    pub fn find(&self, key: &str) -> Option<&Setting> {
        self.lookup.get(key).map(|&i| &self.settings[i])
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Setting> {
        self.lookup.get(key).map(|&i| &mut self.settings[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Setting> {
        self.settings.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Display-ordered JSON payload for the settings page.
    pub fn display_json(&self) -> Vec<Value> {
        self.display
            .iter()
            .map(|entry| match entry {
                DisplayEntry::Header(text) => json!({ "header": text }),
                DisplayEntry::Setting(i) => {
                    let s = &self.settings[*i];
                    json!({
                        "name": s.name(),
                        "accessID": s.access_id(),
                        "description": s.description(),
                        "kind": s.kind().label(),
                        "value": s.value_json(),
                        "default": s.default_value().to_json(),
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::setting::SettingValue;

    fn flag(name: &str) -> Setting {
        Setting::boolean()
            .name(name)
            .default(SettingValue::Bool(false))
            .build()
            .unwrap()
    }

    #[test]
    fn lookup_by_name_and_access_id() {
        let setting = Setting::boolean()
            .name("Show PID")
            .access_id("show_pid")
            .default(SettingValue::Bool(false))
            .build()
            .unwrap();

        let mut settings = ModuleSettings::new();
        settings.add(setting);

        assert!(settings.find("Show PID").is_some());
        assert!(settings.find("show_pid").is_some());
        assert!(settings.find("missing").is_none());
    }

    #[test]
    fn display_list_keeps_headers_and_order() {
        let settings = ModuleSettings::from_entries(vec![
            SettingsEntry::from("General"),
            SettingsEntry::from(flag("a")),
            SettingsEntry::from("Advanced"),
            SettingsEntry::from(flag("b")),
        ]);

        let display = settings.display_json();
        assert_eq!(display.len(), 4);
        assert_eq!(display[0]["header"], "General");
        assert_eq!(display[1]["name"], "a");
        assert_eq!(display[2]["header"], "Advanced");
        assert_eq!(display[3]["name"], "b");

        // Every mapped setting appears exactly once in the display list.
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn duplicate_key_keeps_first() {
        let mut settings = ModuleSettings::new();
        settings.add(flag("a"));
        settings.add(flag("a"));
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.display_json().len(), 1);
    }
}
