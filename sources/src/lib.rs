//! Configuration layers for cligram command trees.
//!
//! A command model doubles as a configuration schema: every parameter has a
//! dotted field path (`db.host`, `dance.priority`) and each [`Source`] reads
//! values for those paths from one place:
//!
//! - [`CliSource`]: the grammar engine run over an argument list
//! - [`EnvSource`]: process variables named `PREFIX_DB_HOST`
//! - [`EnvFileSource`]: the same variables read from a `.env` file
//! - [`TomlSource`]: tables that mirror the command tree
//! - [`DefaultsSource`]: declared parameter defaults
//!
//! [`Layered`] stacks them in priority order and records which layer
//! supplied each leaf.
//!
//! # Example
//!
//! ```
//! use cligram_core::{CommandSchema, ParamSchema, Value, ValueType};
//! use cligram_sources::{EnvSource, Layered, TomlSource};
//!
//! let schema = CommandSchema::new("myapp").with_subcommand(
//!     CommandSchema::new("db")
//!         .with_param(ParamSchema::option(["--host"]).with_default("localhost"))
//!         .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer)),
//! );
//!
//! let dir = std::env::temp_dir().join("cligram-sources-doc");
//! std::fs::create_dir_all(&dir).unwrap();
//! let config = dir.join("config.toml");
//! std::fs::write(&config, "[myapp.db]\nport = 9999\n").unwrap();
//!
//! let resolution = Layered::builder()
//!     .with_source(EnvSource::from_vars("myapp", [("MYAPP_DB_PORT", "6543")]))
//!     .with_source(TomlSource::new(&config))
//!     .build(&schema)
//!     .unwrap()
//!     .read()
//!     .unwrap();
//!
//! assert_eq!(resolution.value.get_path("db.port"), Some(&Value::Integer(6543)));
//! assert_eq!(resolution.value.get_path("db.host"), Some(&Value::from("localhost")));
//! ```

mod cli;
mod env;
mod env_file;
mod error;
mod layered;
mod merge;
mod source;
mod toml_file;

pub use cli::CliSource;
pub use env::{EnvSource, env_var_name};
pub use env_file::EnvFileSource;
pub use error::{Result, SourceError};
pub use layered::{DefaultsSource, LayerOrigin, Layered, LayeredBuilder, Resolution};
pub use merge::{MergeStrategy, merge_values};
pub use source::{Source, nest};
pub use toml_file::TomlSource;
