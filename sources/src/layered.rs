//! Priority-ordered configuration layers.
//!
//! [`Layered`] reads every configured [`Source`] against one command model
//! and folds them with [`MergeStrategy::PreferBase`]: the first-listed layer
//! wins on conflicting leaves and later layers fill the gaps. Declared
//! parameter defaults form an implicit last layer.
//!
//! # Example
//!
//! ```
//! use cligram_core::{CommandSchema, ParamSchema, Value, ValueType};
//! use cligram_sources::{CliSource, EnvSource, Layered};
//!
//! let schema = CommandSchema::new("myapp")
//!     .with_param(ParamSchema::switch(["--debug"]))
//!     .with_subcommand(
//!         CommandSchema::new("db")
//!             .with_param(ParamSchema::option(["--host"]))
//!             .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer).with_default(5432)),
//!     );
//!
//! let layered = Layered::builder()
//!     .with_source(CliSource::new(["myapp", "db", "--host", "cli.example"]))
//!     .with_source(EnvSource::from_vars("myapp", [("MYAPP_DB_HOST", "env.example"), ("MYAPP_DEBUG", "yes")]))
//!     .build(&schema)
//!     .unwrap();
//!
//! let resolution = layered.read().unwrap();
//! assert_eq!(resolution.value.get_path("db.host"), Some(&Value::from("cli.example")));
//! assert_eq!(resolution.value.get_path("debug"), Some(&Value::Bool(true)));
//! assert_eq!(resolution.value.get_path("db.port"), Some(&Value::Integer(5432)));
//! assert_eq!(resolution.origin("db.port").map(|o| o.source.as_str()), Some("defaults"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use cligram_core::{CommandModel, CommandSchema, Value};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::CliSource;
use crate::env::EnvSource;
use crate::env_file::EnvFileSource;
use crate::error::{Result, SourceError};
use crate::merge::{MergeStrategy, merge_values};
use crate::source::{Source, leaf_paths, nest};
use crate::toml_file::TomlSource;

/// Declared parameter defaults as a layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsSource;

impl Source for DefaultsSource {
    fn name(&self) -> &str {
        "defaults"
    }

    fn read(&self, model: &CommandModel) -> Result<Value> {
        let entries = model.field_paths().into_iter().filter_map(|(path, id)| {
            let node = model.node(id);
            match &node.default {
                Some(default) if !node.required => Some((path, default.clone())),
                _ => None,
            }
        });
        Ok(nest(entries))
    }
}

/// Which layer supplied a resolved leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerOrigin {
    /// The layer's [`Source::name`].
    pub source: String,
    /// Position of the layer, 0 being the highest priority.
    pub layer: usize,
}

/// Merged configuration together with per-leaf provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub value: Value,
    /// Dotted leaf path → layer that supplied it.
    pub origins: BTreeMap<String, LayerOrigin>,
}

impl Resolution {
    pub fn origin(&self, path: &str) -> Option<&LayerOrigin> {
        self.origins.get(path)
    }
}

/// A compiled command model with its ordered configuration layers.
pub struct Layered {
    model: CommandModel,
    sources: Vec<Box<dyn Source>>,
}

impl Layered {
    /// Returns a new [`LayeredBuilder`].
    pub fn builder() -> LayeredBuilder {
        LayeredBuilder::new()
    }

    pub fn model(&self) -> &CommandModel {
        &self.model
    }

    /// Names of the layers in priority order.
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name())
    }

    /// Reads every layer and merges them, first layer first.
    ///
    /// # Errors
    ///
    /// Returns the first [`SourceError`] raised by a layer.
    pub fn read(&self) -> Result<Resolution> {
        let mut value = Value::Map(BTreeMap::new());
        let mut origins = BTreeMap::new();

        for (layer, source) in self.sources.iter().enumerate() {
            let read = source.read(&self.model)?;
            let paths = leaf_paths(&read);
            debug!(source = source.name(), layer, leaves = paths.len(), "Merged configuration layer");
            for path in paths {
                origins.entry(path).or_insert_with(|| LayerOrigin {
                    source: source.name().to_string(),
                    layer,
                });
            }
            value = merge_values(&value, &read, MergeStrategy::PreferBase);
        }

        info!(
            command = %self.model.root().name,
            layers = self.sources.len(),
            leaves = origins.len(),
            "Resolved layered configuration"
        );
        Ok(Resolution { value, origins })
    }
}

impl fmt::Debug for Layered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layered")
            .field("command", &self.model.root().name)
            .field("layers", &self.layers().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for a [`Layered`] stack.
///
/// Layers are consulted in the order they are added; the first one that
/// sets a leaf wins.
pub struct LayeredBuilder {
    sources: Vec<Box<dyn Source>>,
    defaults: bool,
}

impl LayeredBuilder {
    /// Creates a new builder with no layers and defaults enabled.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            defaults: true,
        }
    }

    /// Adds any source as the next layer.
    pub fn with_source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Adds a command-line layer.
    pub fn with_cli<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_source(CliSource::new(args))
    }

    /// Adds the process environment under `prefix`.
    pub fn with_env(self, prefix: &str) -> Self {
        self.with_source(EnvSource::from_process(prefix))
    }

    /// Adds an optional `.env` file read under `prefix`.
    pub fn with_env_file(self, path: impl Into<PathBuf>, prefix: &str) -> Self {
        self.with_source(EnvFileSource::new(path, prefix))
    }

    /// Adds an optional TOML file.
    pub fn with_toml(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(TomlSource::new(path))
    }

    /// Leaves declared defaults out of the resolution.
    pub fn without_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    /// Builds the model of `schema` and fixes the layer order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::EngineError`] for a malformed schema and
    /// [`SourceError::NoSourcesAvailable`] when there is nothing to read.
    pub fn build(mut self, schema: &CommandSchema) -> Result<Layered> {
        let model = CommandModel::build(schema).map_err(cligram_core::Error::from)?;
        if self.defaults {
            self.sources.push(Box::new(DefaultsSource));
        }
        if self.sources.is_empty() {
            return Err(SourceError::NoSourcesAvailable);
        }
        Ok(Layered {
            model,
            sources: self.sources,
        })
    }
}

impl Default for LayeredBuilder {
    fn default() -> Self {
        Self::new()
    }
}
