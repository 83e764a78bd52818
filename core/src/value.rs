//! Typed values and the decoders that produce them.
//!
//! Every leaf token that reaches the value extractor is converted through a
//! parameter's decoder: either one of the builtin [`ValueType`]s or a
//! caller-supplied [`CustomDecoder`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A decoded parameter value.
///
/// Values serialize without a tag so a resolved tree prints as plain JSON or
/// YAML.
///
/// # Examples
///
/// ```
/// use cligram_core::Value;
///
/// let v = Value::from(vec![Value::from("brown"), Value::from("black")]);
/// assert_eq!(v.as_list().map(|l| l.len()), Some(2));
/// assert_eq!(Value::from(21).as_i64(), Some(21));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a nested value by dotted path (`"db.host"`).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use cligram_core::Value;
    ///
    /// let mut db = BTreeMap::new();
    /// db.insert("host".to_string(), Value::from("example.com"));
    /// let mut root = BTreeMap::new();
    /// root.insert("db".to_string(), Value::Map(db));
    ///
    /// let root = Value::Map(root);
    /// assert_eq!(root.get_path("db.host").and_then(Value::as_str), Some("example.com"));
    /// assert!(root.get_path("db.port").is_none());
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.as_map()?.get(segment))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Builtin decoders for parameter values.
///
/// # Examples
///
/// ```
/// use cligram_core::{Value, ValueType};
///
/// assert_eq!(ValueType::Integer.decode("21"), Ok(Value::Integer(21)));
/// assert_eq!(ValueType::Bool.decode("yes"), Ok(Value::Bool(true)));
/// assert!(ValueType::Integer.decode("twenty").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Raw token text (the default).
    #[default]
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// `true/false`, `yes/no`, `on/off`, `1/0`, case-insensitive.
    Bool,
    /// Filesystem path, kept as text.
    Path,
}

impl ValueType {
    /// Decodes a raw token into a [`Value`].
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when `raw` is not a valid literal for
    /// this type.
    pub fn decode(self, raw: &str) -> Result<Value, String> {
        match self {
            ValueType::String | ValueType::Path => Ok(Value::String(raw.to_string())),
            ValueType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format!("expected an integer: {e}")),
            ValueType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format!("expected a number: {e}")),
            ValueType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err("expected a boolean".to_string()),
            },
        }
    }
}

type DecodeFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Caller-supplied decoder, shared between clones of a schema.
#[derive(Clone)]
pub struct CustomDecoder(Arc<DecodeFn>);

impl CustomDecoder {
    pub fn new<F>(decode: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(decode))
    }

    pub fn decode(&self, raw: &str) -> Result<Value, String> {
        (self.0)(raw)
    }
}

impl fmt::Debug for CustomDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomDecoder(..)")
    }
}

/// The full decoding recipe of one parameter: builtin type, allowed choices,
/// and an optional custom decoder that replaces the builtin type.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    pub value_type: ValueType,
    pub choices: Vec<String>,
    pub custom: Option<CustomDecoder>,
}

impl Decoder {
    pub fn decode(&self, raw: &str) -> Result<Value, String> {
        if !self.choices.is_empty() && !self.choices.iter().any(|c| c == raw) {
            return Err(format!(
                "expected one of: {}",
                self.choices.join(", ")
            ));
        }
        match &self.custom {
            Some(custom) => custom.decode(raw),
            None => self.value_type.decode(raw),
        }
    }

    /// Decodes a declared default: text goes through [`Decoder::decode`],
    /// lists item by item, anything else is kept as given.
    ///
    /// # Errors
    ///
    /// Same as [`Decoder::decode`].
    pub fn decode_default(&self, default: &Value) -> Result<Value, String> {
        match default {
            Value::String(raw) => self.decode(raw),
            Value::List(items) => items
                .iter()
                .map(|item| self.decode_default(item))
                .collect::<Result<_, _>>()
                .map(Value::List),
            other => Ok(other.clone()),
        }
    }
}
