//! `.env` file layer.
//!
//! The file is read with `dotenvy` (without touching the process
//! environment) and its variables are mapped exactly like [`EnvSource`].

use std::path::{Path, PathBuf};

use cligram_core::{CommandModel, Value};
use tracing::debug;

use crate::env::EnvSource;
use crate::error::{Result, SourceError};
use crate::source::Source;

#[derive(Debug, Clone)]
pub struct EnvFileSource {
    path: PathBuf,
    prefix: String,
    required: bool,
}

impl EnvFileSource {
    /// An optional `.env` file; a missing file reads as empty.
    pub fn new(path: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.to_string(),
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
}

impl Source for EnvFileSource {
    fn name(&self) -> &str {
        "env_file"
    }

    fn read(&self, model: &CommandModel) -> Result<Value> {
        if !self.path.exists() {
            if self.required {
                return Err(SourceError::MissingFile(self.path.display().to_string()));
            }
            debug!(path = %self.path.display(), "No .env file, skipping");
            return Ok(Value::Map(Default::default()));
        }

        let vars = dotenvy::from_path_iter(&self.path)?.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(path = %self.path.display(), vars = vars.len(), "Read .env file");
        EnvSource::from_vars(&self.prefix, vars)
            .labeled(self.name())
            .read(model)
    }
}
