//! Error types for configuration sources.
//!
//! Covers every way a layer can fail: reading files, parsing TOML or `.env`
//! syntax, parsing the command line, and decoding a raw value through a
//! parameter's decoder.

use thiserror::Error;

/// Errors that can occur while reading configuration layers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML syntax error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// `.env` syntax or I/O error.
    #[error("dotenv error: {0}")]
    DotenvError(#[from] dotenvy::Error),

    /// The command line did not compile, parse, validate or decode.
    #[error("command line error: {0}")]
    EngineError(#[from] cligram_core::Error),

    /// A raw value from a file or variable was rejected by its parameter.
    #[error("cannot decode {key} = {raw:?} from {source_name}: {reason}")]
    DecodeError {
        source_name: String,
        /// Variable name or dotted path the value was found under.
        key: String,
        raw: String,
        reason: String,
    },

    /// A layer marked as required was not found.
    #[error("required configuration file not found: {0}")]
    MissingFile(String),

    /// No layers were configured.
    #[error("no configuration sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`SourceError`].
pub type Result<T> = std::result::Result<T, SourceError>;
