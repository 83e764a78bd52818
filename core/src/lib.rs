//! Command-line grammar engine.
//!
//! This crate turns a declarative command tree into a context-free grammar
//! and parses command lines against it:
//!
//! - [`CommandSchema`] / [`ParamSchema`]: the declarative tree (commands,
//!   groups with subcommands, options, switches, positional arguments).
//! - [`CommandModel`]: the tree registered into an arena; every node gets a
//!   [`NodeId`] that names its grammar rule.
//! - [`compile`] / [`Grammar`]: one production per node, rendered as
//!   lark-like text and fingerprinted with SHA-256.
//! - [`lexer`] and [`ChartParser`]: shell-style tokenizing and Earley
//!   parsing into a [`ParseTree`].
//! - [`validate`]: occurrence checks (required, fixed arity).
//! - [`extract`]: decoding into a [`Resolved`] value tree.
//! - [`App`]: the whole pipeline bound to a callback.
//!
//! Schema problems are caught by [`validate_schema`] before any grammar is
//! built.
//!
//! # Example
//!
//! ```
//! use cligram_core::*;
//!
//! let schema = CommandSchema::new("top")
//!     .with_subcommand(
//!         CommandSchema::new("dog")
//!             .with_param(ParamSchema::option(["--dog-name"]))
//!             .with_param(ParamSchema::option(["--dog-color"]).allow_multiple()),
//!     )
//!     .with_subcommand(CommandSchema::new("cat").with_param(ParamSchema::option(["--cat-name"])));
//! let app = App::passthrough(&schema).unwrap();
//!
//! let fields = app
//!     .invoke_str("top dog --dog-name fido --dog-color brown --dog-color black cat --cat-name felix")
//!     .unwrap();
//! let dog = fields["dog"].as_command().unwrap();
//! assert_eq!(dog.value("dog_name"), Some(&Value::from("fido")));
//! assert_eq!(dog.value("dog_color").and_then(Value::as_list).map(|c| c.len()), Some(2));
//! assert!(app.invoke_str("top fish --nonexistent x").is_err());
//! ```

mod error;
mod extract;
mod grammar;
mod invoke;
pub mod lexer;
mod model;
mod parser;
mod types;
mod validate;
mod value;

pub use error::{DecodeError, Error, GrammarCompileError, GrammarParseError, InvalidInput, Result};
pub use extract::{Defaults, Field, Fields, Resolved, extract, extract_with};
pub use grammar::{Expr, Grammar, Production, compile, max_params, min_params};
pub use invoke::{App, InvokeOptions};
pub use model::{CommandModel, Node, NodeId, NodeKind};
pub use parser::{ChartParser, Leaf, LeafKind, ParseNode, ParseTree, RuleNode, parse};
pub use types::*;
pub use validate::{validate, validate_schema};
pub use value::{CustomDecoder, Decoder, Value, ValueType};
