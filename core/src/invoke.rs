//! Invocation driver: text in, callback result out.
//!
//! An [`App`] compiles its command tree once and keeps the lowered chart
//! grammar, so any number of command lines (from any number of threads) can
//! be parsed against it. Each call runs tokenize → parse → validate →
//! extract and hands the root's fields to the callback.

use std::fmt;

use tracing::{debug, info};

use crate::error::{GrammarCompileError, Result};
use crate::extract::{Defaults, Fields, Resolved, extract_with};
use crate::grammar::Grammar;
use crate::lexer::join_args;
use crate::model::CommandModel;
use crate::parser::ChartParser;
use crate::types::CommandSchema;
use crate::validate::validate;

/// Per-app invocation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Run occurrence validation between parsing and extraction.
    pub validate: bool,
    pub defaults: Defaults,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            validate: true,
            defaults: Defaults::Fill,
        }
    }
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }
}

type Callback<R> = Box<dyn Fn(Fields) -> R + Send + Sync>;

/// A compiled command tree bound to its root callback.
///
/// # Examples
///
/// ```
/// use cligram_core::*;
///
/// let schema = CommandSchema::new("greet")
///     .with_param(ParamSchema::option(["--name"]))
///     .with_param(ParamSchema::option(["--times"]).with_type(ValueType::Integer).with_default(1));
/// let app = App::new(&schema, |fields: Fields| {
///     let name = fields["name"].to_value();
///     let times = fields["times"].to_value().as_i64().unwrap_or(1);
///     format!("hello {}", name.as_str().unwrap_or("?")).repeat(times as usize)
/// })
/// .unwrap();
///
/// assert_eq!(app.invoke_str("greet --name Ada").unwrap(), "hello Ada");
/// assert_eq!(app.invoke_args(["greet", "--times=2", "--name", "Bo"]).unwrap(), "hello Bohello Bo");
/// assert!(app.invoke_str("greet --nick Ada").is_err());
/// ```
pub struct App<R> {
    model: CommandModel,
    grammar: Grammar,
    parser: ChartParser,
    /// Parser over [`Grammar::with_required_deferred`], used when validating.
    validating_parser: ChartParser,
    callback: Callback<R>,
    options: InvokeOptions,
}

impl<R> App<R> {
    /// Builds the model of `schema`, compiles and lowers its grammar.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarCompileError`] when the schema is malformed.
    pub fn new<F>(schema: &CommandSchema, callback: F) -> std::result::Result<Self, GrammarCompileError>
    where
        F: Fn(Fields) -> R + Send + Sync + 'static,
    {
        let model = CommandModel::build(schema)?;
        let grammar = Grammar::from_model(&model);
        let parser = ChartParser::new(&grammar);
        let validating_parser = ChartParser::new(&Grammar::with_required_deferred(&model));
        info!(
            command = %model.root().name,
            rules = grammar.len(),
            "Compiled command grammar"
        );
        Ok(Self {
            model,
            grammar,
            parser,
            validating_parser,
            callback: Box::new(callback),
            options: InvokeOptions::default(),
        })
    }

    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> InvokeOptions {
        self.options
    }

    pub fn model(&self) -> &CommandModel {
        &self.model
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parses, validates (unless disabled) and extracts one command line.
    ///
    /// # Errors
    ///
    /// Returns the [`Error`](crate::Error) of the first failing stage.
    pub fn parse_str(&self, text: &str) -> Result<Resolved> {
        if !self.options.validate {
            let tree = self.parser.parse(text)?;
            debug!(input = text, "Parsed command line");
            return Ok(extract_with(&tree, &self.model, self.options.defaults)?);
        }
        let tree = self.validating_parser.parse(text)?;
        debug!(input = text, "Parsed command line");
        validate(&tree, &self.model)?;
        Ok(extract_with(&tree, &self.model, self.options.defaults)?)
    }

    /// Like [`App::parse_str`] over an argument list, joined with shell
    /// quoting first.
    ///
    /// # Errors
    ///
    /// Same as [`App::parse_str`].
    pub fn parse_args<I, S>(&self, args: I) -> Result<Resolved>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parse_str(&join_args(args))
    }

    /// Parses `text` and calls the root callback with its fields.
    ///
    /// # Errors
    ///
    /// Same as [`App::parse_str`]; the callback is not called on error.
    pub fn invoke_str(&self, text: &str) -> Result<R> {
        let resolved = self.parse_str(text)?;
        Ok((self.callback)(resolved.fields))
    }

    /// Parses an argument list and calls the root callback with its fields.
    ///
    /// # Errors
    ///
    /// Same as [`App::parse_str`]; the callback is not called on error.
    pub fn invoke_args<I, S>(&self, args: I) -> Result<R>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.invoke_str(&join_args(args))
    }
}

impl App<Fields> {
    /// An app whose callback returns the root fields unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarCompileError`] when the schema is malformed.
    pub fn passthrough(schema: &CommandSchema) -> std::result::Result<Self, GrammarCompileError> {
        Self::new(schema, |fields| fields)
    }
}

impl<R> fmt::Debug for App<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("command", &self.model.root().name)
            .field("rules", &self.grammar.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
