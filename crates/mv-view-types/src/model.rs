use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Callback, ValidationError};

pub type Name = String;

/// How a view consumes its record sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    /// One aggregate result computed over the whole sequence.
    Collection,
    /// Each record is transformed in place; the records are the result.
    Record,
}

impl ViewType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ViewType::Collection => "collection",
            ViewType::Record => "record",
        }
    }

    /// Record views are parallel and out-of-order unless asked otherwise.
    pub const fn default_sequential(self) -> bool {
        matches!(self, ViewType::Collection)
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(ViewType::Collection),
            "record" => Ok(ViewType::Record),
            other => Err(ValidationError::InvalidType(other.to_string())),
        }
    }
}

/// Caller-supplied options; unset fields fall back to [`ViewOptions`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_override: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronous: Option<bool>,
}

impl ViewSettings {
    /// Merge the supplied settings over the defaults for `view_type`.
    pub fn resolve(&self, view_type: ViewType) -> ViewOptions {
        let defaults = ViewOptions::defaults_for(view_type);
        ViewOptions {
            allow_override: self.allow_override.unwrap_or(defaults.allow_override),
            cache: self.cache.unwrap_or(defaults.cache),
            immutable: self.immutable.unwrap_or(defaults.immutable),
            meta: self.meta.unwrap_or(defaults.meta),
            register: self.register.unwrap_or(defaults.register),
            sequential: self.sequential.unwrap_or(defaults.sequential),
            synchronous: self.synchronous.unwrap_or(defaults.synchronous),
        }
    }
}

/// Normalized execution and registration policy of a view definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    /// Permit replacing a same-named registry entry.
    pub allow_override: bool,
    /// Results may be cached externally, keyed by instance id.
    pub cache: bool,
    /// Callbacks are passed through the wrapping collaborator.
    pub immutable: bool,
    /// Records are handed to `each` with their metadata rather than bare data.
    pub meta: bool,
    /// Add the definition to the registry.
    pub register: bool,
    /// A single context threads through all records in order.
    pub sequential: bool,
    /// Callbacks complete immediately and never suspend.
    pub synchronous: bool,
}

impl ViewOptions {
    pub const fn defaults_for(view_type: ViewType) -> Self {
        Self {
            allow_override: false,
            cache: true,
            immutable: true,
            meta: false,
            register: true,
            sequential: view_type.default_sequential(),
            synchronous: true,
        }
    }
}

/// Raw construction input for a view definition.
///
/// `kind` stays a plain string until validation so that an unknown type is reported
/// as a [`ValidationError`] rather than rejected at parse time.
#[derive(Debug, Clone, Default)]
pub struct ViewConfig {
    pub name: Name,
    pub kind: String,
    pub settings: ViewSettings,
    pub each: Option<Callback>,
    pub pre: Option<Callback>,
    pub post: Option<Callback>,
}

#[derive(Deserialize)]
struct RawViewConfig {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(flatten)]
    settings: ViewSettings,
}

impl ViewConfig {
    pub fn new(name: impl Into<Name>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn collection(name: impl Into<Name>) -> Self {
        Self::new(name, ViewType::Collection.as_str())
    }

    pub fn record(name: impl Into<Name>) -> Self {
        Self::new(name, ViewType::Record.as_str())
    }

    /// Read `name`, `type` and the option flags from a JSON object.
    /// Callbacks are attached afterwards with the builder methods.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawViewConfig::deserialize(value)?;
        Ok(Self {
            name: raw.name,
            kind: raw.kind,
            settings: raw.settings,
            ..Self::default()
        })
    }

    pub fn each(mut self, callback: Callback) -> Self {
        self.each = Some(callback);
        self
    }

    pub fn pre(mut self, callback: Callback) -> Self {
        self.pre = Some(callback);
        self
    }

    pub fn post(mut self, callback: Callback) -> Self {
        self.post = Some(callback);
        self
    }

    pub fn allow_override(mut self, value: bool) -> Self {
        self.settings.allow_override = Some(value);
        self
    }

    pub fn cache(mut self, value: bool) -> Self {
        self.settings.cache = Some(value);
        self
    }

    pub fn immutable(mut self, value: bool) -> Self {
        self.settings.immutable = Some(value);
        self
    }

    pub fn meta(mut self, value: bool) -> Self {
        self.settings.meta = Some(value);
        self
    }

    pub fn register(mut self, value: bool) -> Self {
        self.settings.register = Some(value);
        self
    }

    pub fn sequential(mut self, value: bool) -> Self {
        self.settings.sequential = Some(value);
        self
    }

    pub fn synchronous(mut self, value: bool) -> Self {
        self.settings.synchronous = Some(value);
        self
    }
}
