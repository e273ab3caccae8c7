//! Declarative configuration schemas for plugins.
//!
//! The runtime checks presence, JSON type, numeric range, length and
//! enumeration rules and fills in defaults. It never interprets what an
//! option means; that belongs to the plugin.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON type accepted by a configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    /// A JSON string.
    String,
    /// A JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// Any non-null value.
    Any,
}

impl OptionKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => !value.is_null(),
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any value",
        };
        f.write_str(name)
    }
}

/// A validation rule attached to an option.
///
/// `Min`/`Max` apply to numbers; `MinLength`/`MaxLength` to strings
/// (in characters) and arrays (in elements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Inclusive lower bound.
    Min(f64),
    /// Inclusive upper bound.
    Max(f64),
    /// Minimum length.
    MinLength(usize),
    /// Maximum length.
    MaxLength(usize),
    /// Value must equal one of these.
    OneOf(Vec<Value>),
}

impl Rule {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Min(min) => match value.as_f64() {
                Some(n) if n < *min => Err(format!("must be >= {min}")),
                _ => Ok(()),
            },
            Self::Max(max) => match value.as_f64() {
                Some(n) if n > *max => Err(format!("must be <= {max}")),
                _ => Ok(()),
            },
            Self::MinLength(min) => match length_of(value) {
                Some(len) if len < *min => Err(format!("must have length >= {min}")),
                _ => Ok(()),
            },
            Self::MaxLength(max) => match length_of(value) {
                Some(len) if len > *max => Err(format!("must have length <= {max}")),
                _ => Ok(()),
            },
            Self::OneOf(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let list: Vec<String> = allowed.iter().map(Value::to_string).collect();
                    Err(format!("must be one of [{}]", list.join(", ")))
                }
            }
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One accepted configuration option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption {
    /// Option key.
    pub name: String,
    /// Accepted JSON type.
    pub kind: OptionKind,
    /// Whether the option must be present when it has no default.
    #[serde(default)]
    pub required: bool,
    /// Value used when the option is absent.
    #[serde(default)]
    pub default: Option<Value>,
    /// Additional rules, checked in order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ConfigOption {
    /// Creates an optional option of the given kind.
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            rules: Vec::new(),
            description: String::new(),
        }
    }

    /// A string option.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::String)
    }

    /// An integer option.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Integer)
    }

    /// A number option.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Number)
    }

    /// A boolean option.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Boolean)
    }

    /// An array option.
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Array)
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Adds an inclusive lower bound.
    pub fn min(mut self, min: f64) -> Self {
        self.rules.push(Rule::Min(min));
        self
    }

    /// Adds an inclusive upper bound.
    pub fn max(mut self, max: f64) -> Self {
        self.rules.push(Rule::Max(max));
        self
    }

    /// Adds a minimum length.
    pub fn min_length(mut self, len: usize) -> Self {
        self.rules.push(Rule::MinLength(len));
        self
    }

    /// Adds a maximum length.
    pub fn max_length(mut self, len: usize) -> Self {
        self.rules.push(Rule::MaxLength(len));
        self
    }

    /// Restricts the value to an enumeration.
    pub fn one_of<I, V>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rules
            .push(Rule::OneOf(allowed.into_iter().map(Into::into).collect()));
        self
    }

    /// Sets the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn check(&self, value: &Value) -> Result<(), ConfigViolation> {
        if !self.kind.accepts(value) {
            return Err(ConfigViolation::new(
                &self.name,
                format!("expected {}, found {}", self.kind, json_type_name(value)),
            ));
        }
        for rule in &self.rules {
            rule.check(value)
                .map_err(|reason| ConfigViolation::new(&self.name, reason))?;
        }
        Ok(())
    }
}

/// The first rule a configuration object violated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("option '{option}' {rule}")]
pub struct ConfigViolation {
    /// The offending option (`"$"` for the configuration object itself).
    pub option: String,
    /// Description of the violated rule.
    pub rule: String,
}

impl ConfigViolation {
    /// Creates a violation for the given option.
    pub fn new(option: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            rule: rule.into(),
        }
    }
}

/// Accepted configuration options of a plugin.
///
/// Unknown keys are rejected unless the schema is built with
/// [`ConfigSchema::permissive`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Declared options, validated in declaration order.
    #[serde(default)]
    pub options: Vec<ConfigOption>,
    /// Whether keys without a declared option are accepted.
    #[serde(default)]
    pub allow_unknown: bool,
}

impl ConfigSchema {
    /// An empty schema that rejects unknown keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty schema that passes unknown keys through untouched.
    pub fn permissive() -> Self {
        Self {
            options: Vec::new(),
            allow_unknown: true,
        }
    }

    /// Adds an option.
    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    /// Looks up a declared option.
    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Validates a configuration object and returns it with defaults applied.
    ///
    /// `null` is treated as an empty object. An explicit `null` for an option
    /// counts as absent. Defaults are held to the same rules as given values.
    pub fn validate(&self, config: &Value) -> Result<Value, ConfigViolation> {
        let mut resolved = match config {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ConfigViolation::new(
                    "$",
                    format!("expected object, found {}", json_type_name(other)),
                ));
            }
        };

        if !self.allow_unknown {
            if let Some(key) = resolved.keys().find(|k| self.get(k).is_none()) {
                return Err(ConfigViolation::new(key.as_str(), "is not a recognized option"));
            }
        }

        for option in &self.options {
            match resolved.get(&option.name) {
                Some(value) if !value.is_null() => option.check(value)?,
                _ => match &option.default {
                    Some(default) => {
                        option.check(default)?;
                        resolved.insert(option.name.clone(), default.clone());
                    }
                    None if option.required => {
                        return Err(ConfigViolation::new(&option.name, "is required"));
                    }
                    None => {
                        resolved.remove(&option.name);
                    }
                },
            }
        }

        Ok(Value::Object(resolved))
    }
}
