//! TOML configuration file layer.
//!
//! The file's tables mirror the command tree. When the document has a table
//! named after the root command, that table is the root of the lookup;
//! otherwise the whole document is. Scalars are rendered back to text and
//! decoded through the parameter's decoder, so a TOML integer reaches a
//! float parameter as a float and a custom decoder sees the same text it
//! would see on the command line.

use std::path::{Path, PathBuf};

use cligram_core::{CommandModel, Node, Value};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::source::{Source, nest};

#[derive(Debug, Clone)]
pub struct TomlSource {
    path: PathBuf,
    required: bool,
}

impl TomlSource {
    /// An optional TOML file; a missing file reads as empty.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    /// Fails with [`SourceError::MissingFile`] when the file does not exist.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads values from TOML text already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::TomlError`] on syntax errors and
    /// [`SourceError::DecodeError`] when a value is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use cligram_core::{CommandModel, CommandSchema, ParamSchema, Value, ValueType};
    /// use cligram_sources::TomlSource;
    ///
    /// let schema = CommandSchema::new("dance")
    ///     .with_param(ParamSchema::option(["--priority"]).with_type(ValueType::Float));
    /// let model = CommandModel::build(&schema).unwrap();
    ///
    /// let value = TomlSource::read_str("[dance]\npriority = 3\n", &model).unwrap();
    /// assert_eq!(value.get_path("priority"), Some(&Value::Float(3.0)));
    /// ```
    pub fn read_str(text: &str, model: &CommandModel) -> Result<Value> {
        let document: toml::Table = toml::from_str(text)?;
        let root = match document.get(&model.root().name) {
            Some(toml::Value::Table(section)) => section,
            _ => &document,
        };

        let mut entries = Vec::new();
        for (path, id) in model.field_paths() {
            let Some(found) = lookup(root, &path) else {
                continue;
            };
            if let Some(value) = convert(&path, model.node(id), found)? {
                entries.push((path, value));
            }
        }
        Ok(nest(entries))
    }
}

fn lookup<'a>(table: &'a toml::Table, path: &str) -> Option<&'a toml::Value> {
    let mut segments = path.split('.');
    let first = table.get(segments.next()?)?;
    segments.try_fold(first, |current, segment| current.as_table()?.get(segment))
}

fn convert(path: &str, node: &Node, value: &toml::Value) -> Result<Option<Value>> {
    let scalar = |value: &toml::Value| match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(n) => Some(n.to_string()),
        toml::Value::Float(n) => Some(n.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    };

    match value {
        toml::Value::Array(items) => {
            let mut decoded = Vec::with_capacity(items.len());
            for item in items {
                let Some(raw) = scalar(item) else {
                    continue;
                };
                decoded.push(decode_one(path, node, &raw)?);
            }
            Ok(Some(Value::List(decoded)))
        }
        toml::Value::Table(_) => Ok(None),
        other => match scalar(other) {
            Some(raw) if node.collects_sequence() => Ok(Some(Value::List(vec![decode_one(path, node, &raw)?]))),
            Some(raw) => decode_one(path, node, &raw).map(Some),
            None => Ok(None),
        },
    }
}

fn decode_one(path: &str, node: &Node, raw: &str) -> Result<Value> {
    node.decode(raw).map_err(|reason| SourceError::DecodeError {
        source_name: "toml".to_string(),
        key: path.to_string(),
        raw: raw.to_string(),
        reason,
    })
}

impl Source for TomlSource {
    fn name(&self) -> &str {
        "toml"
    }

    fn read(&self, model: &CommandModel) -> Result<Value> {
        if !self.path.exists() {
            if self.required {
                return Err(SourceError::MissingFile(self.path.display().to_string()));
            }
            debug!(path = %self.path.display(), "No TOML file, skipping");
            return Ok(Value::Map(Default::default()));
        }
        let text = std::fs::read_to_string(&self.path)?;
        let value = Self::read_str(&text, model)?;
        debug!(path = %self.path.display(), "Read TOML file");
        Ok(value)
    }
}
