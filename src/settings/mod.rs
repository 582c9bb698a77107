//! Typed, validated, persisted per-module settings.
//!
//! A `Setting` is a tagged-variant value (boolean, number, text, choice,
//! color) whose validation rule travels with the variant. `ModuleSettings`
//! is the per-module container keeping the display order and the lookup map
//! consistent, and `SettingsStore` handles the JSON files on disk plus the
//! reconciliation of stored values into live settings at load time.

pub mod container;
pub mod setting;
pub mod store;

pub use container::{ModuleSettings, SettingsEntry};
pub use setting::{SetOutcome, Setting, SettingBuilder, SettingError, SettingKind, SettingValue};
pub use store::{SettingsStore, StorageError};
