//! Schema type definitions for the command model.
//!
//! These are the plain-data builders application code uses to describe a
//! command tree: [`ParamSchema`] for options and positional arguments and
//! [`CommandSchema`] for commands and groups. They serialize with [`serde`] so a
//! model can also be loaded from YAML or JSON.
//!
//! A schema is turned into an identity-keyed arena by
//! [`CommandModel::build`](crate::CommandModel::build) before it is compiled.

use serde::{Deserialize, Serialize};

use crate::value::{CustomDecoder, Decoder, Value, ValueType};

/// How many times a parameter (or subcommand) is expected per invocation.
///
/// Serialized as a plain integer or the string `"unbounded"`.
///
/// # Examples
///
/// ```
/// use cligram_core::Arity;
///
/// assert_eq!(Arity::default(), Arity::Exactly(1));
/// assert!(Arity::Unbounded.is_unbounded());
/// assert_eq!(Arity::Exactly(2).count(), Some(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArityRepr", into = "ArityRepr")]
pub enum Arity {
    Exactly(u32),
    Unbounded,
}

impl Arity {
    pub fn is_unbounded(self) -> bool {
        matches!(self, Arity::Unbounded)
    }

    pub fn count(self) -> Option<u32> {
        match self {
            Arity::Exactly(n) => Some(n),
            Arity::Unbounded => None,
        }
    }
}

impl Default for Arity {
    fn default() -> Self {
        Arity::Exactly(1)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ArityRepr {
    Count(u32),
    Keyword(String),
}

impl TryFrom<ArityRepr> for Arity {
    type Error = String;

    fn try_from(repr: ArityRepr) -> Result<Self, Self::Error> {
        match repr {
            ArityRepr::Count(n) => Ok(Arity::Exactly(n)),
            ArityRepr::Keyword(k) if k == "unbounded" || k == "*" => Ok(Arity::Unbounded),
            ArityRepr::Keyword(k) => Err(format!("invalid arity: {k}")),
        }
    }
}

impl From<Arity> for ArityRepr {
    fn from(arity: Arity) -> Self {
        match arity {
            Arity::Exactly(n) => ArityRepr::Count(n),
            Arity::Unbounded => ArityRepr::Keyword("unbounded".to_string()),
        }
    }
}

/// Whether a parameter is triggered by flag tokens or matched by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// An option with explicit trigger tokens (`-v`, `--verbose`). Without a
    /// value it is a switch; with a value it reads the next token, optionally
    /// after an `=` separator.
    Flag {
        triggers: Vec<String>,
        #[serde(default)]
        takes_value: bool,
    },
    /// A bare positional value.
    Positional,
}

/// Schema for a parameter (option or positional argument).
///
/// # Examples
///
/// ```
/// use cligram_core::{Arity, ParamSchema, Value, ValueType};
///
/// let color = ParamSchema::option(["--dog-color"]).allow_multiple();
/// assert_eq!(color.name, "dog_color");
/// assert!(color.multiple);
///
/// let age = ParamSchema::option(["--age"])
///     .with_type(ValueType::Integer)
///     .with_default(Value::from(9));
/// assert_eq!(age.default, Some(Value::Integer(9)));
///
/// let verbose = ParamSchema::switch(["-v", "--verbose"]);
/// assert_eq!(verbose.name, "verbose");
/// assert_eq!(verbose.default, Some(Value::Bool(false)));
///
/// let files = ParamSchema::argument("files").with_arity(Arity::Unbounded);
/// assert!(files.arity.is_unbounded());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Field name in the resolved value tree.
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub arity: Arity,
    #[serde(default)]
    pub required: bool,
    /// May appear more than once even when arity is 1.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub value_type: ValueType,
    /// Allowed raw values (empty = anything the decoder accepts).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip)]
    pub decoder: Option<CustomDecoder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSchema {
    fn new(name: String, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            arity: Arity::default(),
            required: false,
            multiple: false,
            default: None,
            value_type: ValueType::default(),
            choices: Vec::new(),
            decoder: None,
            description: None,
        }
    }

    /// Creates a boolean switch; its default is `false`.
    pub fn switch<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers: Vec<String> = triggers.into_iter().map(Into::into).collect();
        let mut param = Self::new(
            name_from_triggers(&triggers),
            ParamKind::Flag {
                triggers,
                takes_value: false,
            },
        );
        param.value_type = ValueType::Bool;
        param.default = Some(Value::Bool(false));
        param
    }

    /// Creates an option that takes a value.
    pub fn option<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers: Vec<String> = triggers.into_iter().map(Into::into).collect();
        Self::new(
            name_from_triggers(&triggers),
            ParamKind::Flag {
                triggers,
                takes_value: true,
            },
        )
    }

    /// Creates a positional argument.
    pub fn argument(name: &str) -> Self {
        Self::new(name.to_string(), ParamKind::Positional)
    }

    /// Overrides the field name derived from the triggers.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks as allowing multiple occurrences.
    pub fn allow_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the builtin decoder with a custom one.
    pub fn with_decoder<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.decoder = Some(CustomDecoder::new(decode));
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Returns the trigger tokens, empty for positional arguments.
    pub fn triggers(&self) -> &[String] {
        match &self.kind {
            ParamKind::Flag { triggers, .. } => triggers,
            ParamKind::Positional => &[],
        }
    }

    pub(crate) fn decoder(&self) -> Decoder {
        Decoder {
            value_type: self.value_type,
            choices: self.choices.clone(),
            custom: self.decoder.clone(),
        }
    }
}

/// Derives a field name from the longest trigger: `--dog-name` → `dog_name`.
fn name_from_triggers(triggers: &[String]) -> String {
    triggers
        .iter()
        .max_by_key(|t| t.len())
        .map(|t| t.trim_start_matches('-').replace('-', "_"))
        .unwrap_or_default()
}

/// Schema for a command or group.
///
/// A schema with subcommands is a group: its own parameters and its
/// subcommands may interleave and repeat on the command line. Without
/// subcommands it compiles exactly like a plain command.
///
/// # Examples
///
/// ```
/// use cligram_core::{CommandSchema, ParamSchema};
///
/// let cat = CommandSchema::new("cat")
///     .with_param(ParamSchema::option(["--cat-name"]))
///     .with_subcommand(
///         CommandSchema::new("owner").with_param(ParamSchema::option(["--owner-name"])),
///     );
///
/// assert!(cat.is_group());
/// assert!(cat.find_subcommand("owner").is_some());
/// assert!(cat.find_param("cat_name").is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSchema {
    /// Literal token that starts this command.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameters in declaration order.
    #[serde(default)]
    pub params: Vec<ParamSchema>,
    /// Nested subcommands (non-empty for groups).
    #[serde(default)]
    pub subcommands: Vec<CommandSchema>,
    /// Must be invoked at least once under its parent.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub arity: Arity,
    /// May be invoked more than once under its parent; every invocation is kept.
    #[serde(default)]
    pub multiple: bool,
}

impl CommandSchema {
    /// Creates a new command schema with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Adds a nested subcommand, turning this schema into a group.
    pub fn with_subcommand(mut self, sub: CommandSchema) -> Self {
        self.subcommands.push(sub);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn is_group(&self) -> bool {
        !self.subcommands.is_empty()
    }

    /// Finds a direct subcommand by name.
    pub fn find_subcommand(&self, name: &str) -> Option<&CommandSchema> {
        self.subcommands.iter().find(|s| s.name == name)
    }

    /// Finds a parameter by field name.
    pub fn find_param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }
}
