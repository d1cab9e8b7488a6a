use serde_json::{Map, Value};
use thiserror::Error;

/// Arguments bound into a view instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewArgs {
    /// Free-form parameters, used verbatim.
    Config(Map<String, Value>),
    /// Ordered property names the computation should act on.
    Properties(Vec<String>),
}

impl Default for ViewArgs {
    fn default() -> Self {
        ViewArgs::Config(Map::new())
    }
}

impl ViewArgs {
    pub fn properties<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ViewArgs::Properties(names.into_iter().map(Into::into).collect())
    }

    /// The argument object handed to callbacks and folded into the instance id.
    pub fn to_value(&self) -> Value {
        match self {
            ViewArgs::Config(map) => Value::Object(map.clone()),
            ViewArgs::Properties(names) => {
                let mut map = Map::new();
                map.insert(
                    "properties".into(),
                    Value::Array(names.iter().cloned().map(Value::String).collect()),
                );
                Value::Object(map)
            }
        }
    }

    /// Classify a raw instance call.
    ///
    /// No arguments bind `{}`, a single object binds that object, and one or more
    /// strings bind `{properties: [...]}`. Anything else is rejected.
    pub fn from_call(args: Vec<CallArg>) -> Result<Self, ArgsError> {
        if let [CallArg::Object(value)] = args.as_slice() {
            return match value {
                Value::Object(map) => Ok(ViewArgs::Config(map.clone())),
                other => Err(ArgsError::NotAnObject(other.to_string())),
            };
        }
        if args.is_empty() {
            return Ok(ViewArgs::default());
        }
        let mut names = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                CallArg::Text(name) => names.push(name),
                CallArg::Object(value) => return Err(ArgsError::NotAString(value.to_string())),
            }
        }
        Ok(ViewArgs::Properties(names))
    }
}

/// One raw argument of an instance call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Text(String),
    Object(Value),
}

impl From<&str> for CallArg {
    fn from(value: &str) -> Self {
        CallArg::Text(value.to_owned())
    }
}

impl From<String> for CallArg {
    fn from(value: String) -> Self {
        CallArg::Text(value)
    }
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => CallArg::Text(text),
            other => CallArg::Object(other),
        }
    }
}

impl From<Map<String, Value>> for CallArg {
    fn from(value: Map<String, Value>) -> Self {
        CallArg::Object(Value::Object(value))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgsError {
    #[error("invalid argument {0}: positional arguments must be property names")]
    NotAString(String),
    #[error("invalid argument {0}: a single argument must be a string or an object")]
    NotAnObject(String),
}

/// Property names from an argument object, skipping anything that is not a string.
pub fn property_names(args: &Value) -> Vec<&str> {
    args.get("properties")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
