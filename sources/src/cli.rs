//! Command-line layer: the grammar engine run over an argument list.
//!
//! Only parameters that actually occur on the command line are reported;
//! declared defaults are left to the [`DefaultsSource`](crate::DefaultsSource)
//! at the bottom of a layered stack so they never shadow environment or file
//! values.

use cligram_core::{ChartParser, CommandModel, Defaults, Grammar, Value, extract_with, lexer, validate};
use tracing::debug;

use crate::error::Result;
use crate::source::Source;

#[derive(Debug, Clone)]
pub struct CliSource {
    args: Vec<String>,
    validate: bool,
}

impl CliSource {
    /// Arguments including the root command name as the first element.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            validate: true,
        }
    }

    /// Skips occurrence validation.
    pub fn lenient(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Source for CliSource {
    fn name(&self) -> &str {
        "cli"
    }

    fn read(&self, model: &CommandModel) -> Result<Value> {
        let grammar = if self.validate {
            Grammar::with_required_deferred(model)
        } else {
            Grammar::from_model(model)
        };
        let parser = ChartParser::new(&grammar);
        let tree = parser
            .parse(&lexer::join_args(&self.args))
            .map_err(cligram_core::Error::from)?;
        if self.validate {
            validate(&tree, model).map_err(cligram_core::Error::from)?;
        }
        let resolved = extract_with(&tree, model, Defaults::Omit).map_err(cligram_core::Error::from)?;
        debug!(args = self.args.len(), fields = resolved.fields.len(), "Parsed command-line layer");
        Ok(resolved.to_value())
    }
}
