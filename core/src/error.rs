//! Error types for the grammar engine.
//!
//! Each stage of the pipeline has its own error: compiling a malformed model,
//! parsing text with no derivation, violating an occurrence constraint, and
//! failing to decode a leaf token. [`Error`] wraps all four for the
//! invocation driver.

use thiserror::Error;

use crate::model::NodeId;

/// Malformed command model, detected before any grammar is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarCompileError {
    /// Command name is empty or whitespace-only.
    #[error("command name cannot be empty")]
    EmptyCommandName,
    /// Parameter name is empty.
    #[error("parameter name cannot be empty in command '{0}'")]
    EmptyParamName(String),
    /// A command name contains whitespace and can never match a single token.
    #[error("invalid command name: {0:?}")]
    InvalidCommandName(String),
    /// A flag declares no trigger tokens.
    #[error("flag '{0}' must define at least one trigger")]
    MissingTrigger(String),
    /// Trigger does not look like `-x` or `--long-name`.
    #[error("invalid trigger format: {0:?}")]
    InvalidTrigger(String),
    /// Two flags of one command share a trigger.
    #[error("duplicate trigger in command '{command}': {trigger}")]
    DuplicateTrigger { command: String, trigger: String },
    /// Two parameters of one command share a field name.
    #[error("duplicate parameter in command '{command}': {name}")]
    DuplicateParam { command: String, name: String },
    /// Two subcommands of one group share a name.
    #[error("duplicate subcommand in group '{group}': {name}")]
    DuplicateSubcommand { group: String, name: String },
    /// A trigger is spelled like a sibling subcommand.
    #[error("trigger '{0}' collides with a subcommand name")]
    TriggerShadowsSubcommand(String),
    /// A parameter or subcommand declares an arity of zero.
    #[error("arity of '{0}' must be at least 1")]
    ZeroArity(String),
    /// A textual default does not decode with the parameter's type.
    #[error("invalid default for '{param}': {reason}")]
    InvalidDefault { param: String, reason: String },
}

/// Input text with no derivation under the compiled grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct GrammarParseError {
    /// The text that was parsed.
    pub input: String,
    /// Index of the furthest token the parser reached, if the failure is
    /// attributable to one.
    pub position: Option<usize>,
    /// Token found at `position` (`None` at end of input).
    pub found: Option<String>,
    /// Literal tokens that would have continued the parse at `position`.
    pub expected: Vec<String>,
    /// Lexer-level failure (e.g. an unterminated quote).
    pub reason: Option<String>,
}

impl GrammarParseError {
    pub(crate) fn lexical(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            position: None,
            found: None,
            expected: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    fn describe(&self) -> String {
        if let Some(reason) = &self.reason {
            return format!("cannot tokenize {:?}: {reason}", self.input);
        }
        let mut message = match (&self.found, self.position) {
            (Some(found), Some(pos)) => {
                format!("unexpected token {found:?} at position {pos} in {:?}", self.input)
            }
            _ => format!("unexpected end of input in {:?}", self.input),
        };
        if !self.expected.is_empty() {
            message.push_str(&format!("; expected one of: {}", self.expected.join(", ")));
        }
        message
    }
}

/// A declared required/arity constraint is violated by a parse tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid input for '{name}' ({node}): observed {observed} occurrence(s)")]
pub struct InvalidInput {
    /// The offending parameter or subcommand.
    pub node: NodeId,
    pub name: String,
    /// How many times it occurred under its command invocation.
    pub observed: usize,
}

/// A leaf token could not be converted to its parameter's typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode {raw:?} for '{parameter}': {reason}")]
pub struct DecodeError {
    pub node: NodeId,
    pub parameter: String,
    pub raw: String,
    pub reason: String,
}

/// Any failure of one invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("grammar compile error: {0}")]
    Compile(#[from] GrammarCompileError),

    #[error("parse error: {0}")]
    Parse(#[from] GrammarParseError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
