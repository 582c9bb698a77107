//! The `Setting` type and its validation rules.
//!
//! A setting moves through a small state machine: unset, default assigned,
//! then valid values only. The builder enforces the first transition (a
//! setting without a name and default cannot be built), and `set_value`
//! enforces the rest: rejected input never touches the current value.

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Validator closure: returns the parsed value, or `None` to reject the input.
pub type Validator = Arc<dyn Fn(&Value) -> Option<SettingValue> + Send + Sync>;

/// Errors raised while constructing a setting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    #[error("setting '{name}' built before required fields were set (missing: {missing})")]
    MissingFields { name: String, missing: String },

    #[error("cannot reassign {field} for setting '{name}'")]
    Reassigned { name: String, field: &'static str },
}

/// A validated setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SettingValue {
    /// JSON representation used for persistence and renderer payloads.
    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Bool(b) => Value::Bool(*b),
            SettingValue::Number(n) => json!(n),
            SettingValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// The variant tag of a setting, carrying its validation rule as data.
///
/// Rendering is a separate concern owned by the UI shell; this type only
/// decides which inputs are valid.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    Boolean,
    /// Numeric setting clamped into `[min, max]`.
    Number { min: f64, max: f64 },
    Text,
    /// One of a fixed list of options.
    Choice { options: Vec<String> },
    /// Hex color string, `#rgb` or `#rrggbb`.
    Color,
}

impl SettingKind {
    /// Tag label used in renderer payloads.
    pub fn label(&self) -> &'static str {
        match self {
            SettingKind::Boolean => "boolean",
            SettingKind::Number { .. } => "number",
            SettingKind::Text => "text",
            SettingKind::Choice { .. } => "choice",
            SettingKind::Color => "color",
        }
    }

    /// Parse an arbitrary JSON input into a value of this kind.
    pub fn validate(&self, input: &Value) -> Option<SettingValue> {
        match self {
            SettingKind::Boolean => match input {
                Value::Bool(b) => Some(SettingValue::Bool(*b)),
                Value::String(s) => match s.as_str() {
                    "true" => Some(SettingValue::Bool(true)),
                    "false" => Some(SettingValue::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            SettingKind::Number { min, max } => {
                let n = match input {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    _ => return None,
                };
                if n.is_nan() {
                    return None;
                }
                Some(SettingValue::Number(n.clamp(*min, *max)))
            }
            SettingKind::Text => input.as_str().map(|s| SettingValue::Text(s.to_string())),
            SettingKind::Choice { options } => {
                let s = input.as_str()?;
                options
                    .iter()
                    .any(|o| o == s)
                    .then(|| SettingValue::Text(s.to_string()))
            }
            SettingKind::Color => {
                let s = input.as_str()?;
                is_hex_color(s).then(|| SettingValue::Text(s.to_string()))
            }
        }
    }
}

fn is_hex_color(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Result of a `set_value` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Input validated; the current value was updated.
    Accepted,
    /// Input rejected; the previous value is unchanged.
    Rejected,
}

/// A named, typed, validated value belonging to exactly one module.
#[derive(Clone)]
pub struct Setting {
    id: String,
    name: String,
    access_id: String,
    description: String,
    kind: SettingKind,
    default: SettingValue,
    current: SettingValue,
    validator: Option<Validator>,
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("name", &self.name)
            .field("access_id", &self.access_id)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("current", &self.current)
            .finish()
    }
}

impl Setting {
    pub fn boolean() -> SettingBuilder {
        SettingBuilder::new(SettingKind::Boolean)
    }

    pub fn number(min: f64, max: f64) -> SettingBuilder {
        SettingBuilder::new(SettingKind::Number { min, max })
    }

    pub fn text() -> SettingBuilder {
        SettingBuilder::new(SettingKind::Text)
    }

    pub fn choice(options: Vec<String>) -> SettingBuilder {
        SettingBuilder::new(SettingKind::Choice { options })
    }

    pub fn color() -> SettingBuilder {
        SettingBuilder::new(SettingKind::Color)
    }

    /// Generated internal id, distinct from the name and access id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup key used for persistence. Defaults to the name.
    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &SettingKind {
        &self.kind
    }

    pub fn value(&self) -> &SettingValue {
        &self.current
    }

    pub fn value_json(&self) -> Value {
        self.current.to_json()
    }

    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }

    /// Validate and apply an input. Rejected input leaves the current value
    /// untouched; the caller decides whether a rejection is worth a warning.
    pub fn set_value(&mut self, input: &Value) -> SetOutcome {
        let parsed = match &self.validator {
            Some(validator) => validator(input),
            None => self.kind.validate(input),
        };

        match parsed {
            Some(value) => {
                self.current = value;
                SetOutcome::Accepted
            }
            None => SetOutcome::Rejected,
        }
    }

    pub fn reset_to_default(&mut self) {
        self.current = self.default.clone();
    }
}

/// Builder for [`Setting`]. `name` and `default` are required; building
/// without them, or assigning either twice, is an error.
pub struct SettingBuilder {
    kind: SettingKind,
    name: Option<String>,
    access_id: Option<String>,
    description: Option<String>,
    default: Option<SettingValue>,
    validator: Option<Validator>,
    reassigned: Option<&'static str>,
}

impl SettingBuilder {
    fn new(kind: SettingKind) -> Self {
        Self {
            kind,
            name: None,
            access_id: None,
            description: None,
            default: None,
            validator: None,
            reassigned: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        if self.name.is_some() {
            self.reassigned.get_or_insert("name");
        }
        self.name = Some(name.into());
        self
    }

    pub fn access_id(mut self, access_id: impl Into<String>) -> Self {
        if self.access_id.is_some() {
            self.reassigned.get_or_insert("access id");
        }
        self.access_id = Some(access_id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default(mut self, default: SettingValue) -> Self {
        if self.default.is_some() {
            self.reassigned.get_or_insert("default value");
        }
        self.default = Some(default);
        self
    }

    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> Option<SettingValue> + Send + Sync + 'static,
    ) -> Self {
        if self.validator.is_some() {
            self.reassigned.get_or_insert("validator");
        }
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(self) -> Result<Setting, SettingError> {
        let display = self.name.clone().unwrap_or_default();

        if let Some(field) = self.reassigned {
            return Err(SettingError::Reassigned {
                name: display,
                field,
            });
        }

        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.default.is_none() {
            missing.push("default");
        }
        if !missing.is_empty() {
            return Err(SettingError::MissingFields {
                name: display,
                missing: missing.join(", "),
            });
        }

        let name = self.name.unwrap_or_default();
        let default = self.default.unwrap_or(SettingValue::Bool(false));
        Ok(Setting {
            id: format!("setting_{}", Uuid::new_v4()),
            access_id: self.access_id.unwrap_or_else(|| name.clone()),
            name,
            description: self.description.unwrap_or_default(),
            kind: self.kind,
            current: default.clone(),
            default,
            validator: self.validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_name_and_default() {
        let err = Setting::boolean().build().unwrap_err();
        assert!(matches!(err, SettingError::MissingFields { .. }));

        let err = Setting::boolean().name("only-name").build().unwrap_err();
        assert!(matches!(err, SettingError::MissingFields { .. }));
    }

    #[test]
    fn default_assignable_exactly_once() {
        let err = Setting::boolean()
            .name("dup")
            .default(SettingValue::Bool(true))
            .default(SettingValue::Bool(false))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SettingError::Reassigned {
                name: "dup".to_string(),
                field: "default value"
            }
        );
    }

    #[test]
    fn rejected_input_keeps_previous_value() {
        let mut setting = Setting::number(25.0, 300.0)
            .name("Zoom")
            .default(SettingValue::Number(100.0))
            .build()
            .unwrap();

        assert_eq!(setting.set_value(&json!(150)), SetOutcome::Accepted);
        assert_eq!(setting.set_value(&json!("not-a-number")), SetOutcome::Rejected);
        assert_eq!(setting.value(), &SettingValue::Number(150.0));
    }

    #[test]
    fn number_inputs_clamp_into_range() {
        let mut setting = Setting::number(25.0, 300.0)
            .name("Zoom")
            .default(SettingValue::Number(100.0))
            .build()
            .unwrap();

        setting.set_value(&json!(1000));
        assert_eq!(setting.value(), &SettingValue::Number(300.0));
        setting.set_value(&json!("10"));
        assert_eq!(setting.value(), &SettingValue::Number(25.0));
    }

    #[test]
    fn choice_accepts_only_listed_options() {
        let mut setting = Setting::choice(vec!["light".into(), "dark".into()])
            .name("Theme")
            .default(SettingValue::Text("dark".into()))
            .build()
            .unwrap();

        assert_eq!(setting.set_value(&json!("light")), SetOutcome::Accepted);
        assert_eq!(setting.set_value(&json!("sepia")), SetOutcome::Rejected);
        assert_eq!(setting.value(), &SettingValue::Text("light".into()));
    }

    #[test]
    fn color_validates_hex_syntax() {
        let mut setting = Setting::color()
            .name("Accent")
            .default(SettingValue::Text("#2290b5".into()))
            .build()
            .unwrap();

        assert_eq!(setting.set_value(&json!("#fff")), SetOutcome::Accepted);
        assert_eq!(setting.set_value(&json!("fff")), SetOutcome::Rejected);
        assert_eq!(setting.set_value(&json!("#ggg")), SetOutcome::Rejected);
    }

    #[test]
    fn custom_validator_overrides_kind_rule() {
        let mut setting = Setting::text()
            .name("Uppercase")
            .default(SettingValue::Text("A".into()))
            .validator(|input| {
                input
                    .as_str()
                    .map(|s| SettingValue::Text(s.to_uppercase()))
            })
            .build()
            .unwrap();

        setting.set_value(&json!("hello"));
        assert_eq!(setting.value(), &SettingValue::Text("HELLO".into()));
    }

    #[test]
    fn reset_restores_default() {
        let mut setting = Setting::boolean()
            .name("Flag")
            .default(SettingValue::Bool(false))
            .build()
            .unwrap();

        setting.set_value(&json!(true));
        setting.reset_to_default();
        assert_eq!(setting.value(), &SettingValue::Bool(false));
    }

    #[test]
    fn access_id_defaults_to_name() {
        let setting = Setting::boolean()
            .name("Show PID")
            .default(SettingValue::Bool(false))
            .build()
            .unwrap();
        assert_eq!(setting.access_id(), "Show PID");

        let setting = Setting::boolean()
            .name("Show PID")
            .access_id("show_pid")
            .default(SettingValue::Bool(false))
            .build()
            .unwrap();
        assert_eq!(setting.access_id(), "show_pid");
    }
}
