//! Environment variable layer.
//!
//! Each parameter of the model is looked up under a variable named after its
//! field path: the prefix and the path segments joined with `_`, upper-cased,
//! with dashes mapped to underscores. `db.host` under prefix `myapp` is read
//! from `MYAPP_DB_HOST`.

use std::collections::HashMap;

use cligram_core::{CommandModel, Value};
use tracing::debug;

use crate::error::Result;
use crate::source::{Source, decode_raw, nest};

/// Builds the variable name for a field path.
///
/// # Examples
///
/// ```
/// use cligram_sources::env_var_name;
///
/// assert_eq!(env_var_name("myapp", &["db", "host"]), "MYAPP_DB_HOST");
/// assert_eq!(env_var_name("my-app", &["dry_run"]), "MY_APP_DRY_RUN");
/// assert_eq!(env_var_name("", &["debug"]), "DEBUG");
/// ```
pub fn env_var_name(prefix: &str, path: &[&str]) -> String {
    std::iter::once(prefix)
        .chain(path.iter().copied())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .replace('-', "_")
        .to_uppercase()
}

/// Reads parameters from a set of environment variables.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    vars: HashMap<String, String>,
    label: String,
}

impl EnvSource {
    /// Snapshot of the current process environment.
    pub fn from_process(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// An explicit set of variables.
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.to_string(),
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            label: "env".to_string(),
        }
    }

    /// Overrides the label reported by [`Source::name`].
    pub fn labeled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Source for EnvSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn read(&self, model: &CommandModel) -> Result<Value> {
        let mut entries = Vec::new();
        for (path, id) in model.field_paths() {
            let segments: Vec<&str> = path.split('.').collect();
            let var = env_var_name(&self.prefix, &segments);
            if let Some(raw) = self.vars.get(&var) {
                let value = decode_raw(&self.label, &var, model.node(id), raw)?;
                entries.push((path, value));
            }
        }
        debug!(source = %self.label, prefix = %self.prefix, found = entries.len(), "Read environment layer");
        Ok(nest(entries))
    }
}
