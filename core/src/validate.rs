//! Command schema and parse tree validation.
//!
//! [`validate_schema`] checks structural invariants of a [`CommandSchema`]
//! tree, catching errors such as duplicate subcommands, malformed triggers,
//! and zero arities before a grammar is built from it.
//!
//! [`validate`] checks a [`ParseTree`] against the occurrence constraints of
//! its [`CommandModel`]: required parameters and subcommands must appear, and
//! bounded ones must appear exactly as often as their arity says.
//!
//! # Examples
//!
//! ```
//! use cligram_core::*;
//!
//! let schema = CommandSchema::new("git")
//!     .with_param(ParamSchema::switch(["-v", "--verbose"]))
//!     .with_subcommand(CommandSchema::new("commit"));
//! assert!(validate_schema(&schema).is_empty());
//!
//! // Invalid: trigger missing its leading dash
//! let bad = CommandSchema::new("git").with_param(ParamSchema::switch(["verbose"]));
//! assert!(!validate_schema(&bad).is_empty());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use tracing::debug;

use crate::error::{GrammarCompileError, InvalidInput};
use crate::model::{CommandModel, NodeId};
use crate::parser::{ParseTree, RuleNode};
use crate::types::{Arity, CommandSchema, ParamKind, ParamSchema};

static TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--?[^\s=\-][^\s=]*$").expect("trigger pattern is valid")
});

/// Validates a command schema tree.
///
/// Returns the first problem found, or an empty list when the tree can be
/// compiled.
///
/// # Examples
///
/// ```
/// use cligram_core::*;
///
/// let schema = CommandSchema::new("top")
///     .with_subcommand(CommandSchema::new("dog"))
///     .with_subcommand(CommandSchema::new("dog"));
/// let errors = validate_schema(&schema);
/// assert!(matches!(errors[0], GrammarCompileError::DuplicateSubcommand { .. }));
/// ```
pub fn validate_schema(schema: &CommandSchema) -> Vec<GrammarCompileError> {
    let mut errors = Vec::new();

    let name = schema.name.trim();
    if name.is_empty() {
        errors.push(GrammarCompileError::EmptyCommandName);
        return errors;
    }
    if name.len() != schema.name.len() || name.chars().any(char::is_whitespace) {
        errors.push(GrammarCompileError::InvalidCommandName(schema.name.clone()));
        return errors;
    }
    if schema.arity == Arity::Exactly(0) {
        errors.push(GrammarCompileError::ZeroArity(schema.name.clone()));
        return errors;
    }

    errors.extend(validate_params(schema));
    if !errors.is_empty() {
        return errors;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for sub in &schema.subcommands {
        if schema.find_param(&sub.name).is_some() {
            errors.push(GrammarCompileError::DuplicateParam {
                command: schema.name.clone(),
                name: sub.name.clone(),
            });
            return errors;
        }
        if !seen.insert(sub.name.as_str()) {
            errors.push(GrammarCompileError::DuplicateSubcommand {
                group: schema.name.clone(),
                name: sub.name.clone(),
            });
            return errors;
        }
        errors.extend(validate_schema(sub));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

fn validate_params(schema: &CommandSchema) -> Vec<GrammarCompileError> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut triggers = HashSet::new();

    for param in &schema.params {
        if param.name.trim().is_empty() {
            errors.push(GrammarCompileError::EmptyParamName(schema.name.clone()));
            return errors;
        }
        if !names.insert(param.name.as_str()) {
            errors.push(GrammarCompileError::DuplicateParam {
                command: schema.name.clone(),
                name: param.name.clone(),
            });
            return errors;
        }
        if param.arity == Arity::Exactly(0) {
            errors.push(GrammarCompileError::ZeroArity(param.name.clone()));
            return errors;
        }
        if let Some(error) = validate_triggers(schema, param, &mut triggers) {
            errors.push(error);
            return errors;
        }
        if let Some(Err(reason)) = param.default.as_ref().map(|d| param.decoder().decode_default(d)) {
            errors.push(GrammarCompileError::InvalidDefault {
                param: param.name.clone(),
                reason,
            });
            return errors;
        }
    }

    errors
}

fn validate_triggers<'a>(
    schema: &CommandSchema,
    param: &'a ParamSchema,
    seen: &mut HashSet<&'a str>,
) -> Option<GrammarCompileError> {
    let ParamKind::Flag { triggers, .. } = &param.kind else {
        return None;
    };
    if triggers.is_empty() {
        return Some(GrammarCompileError::MissingTrigger(param.name.clone()));
    }
    for trigger in triggers {
        if !TRIGGER.is_match(trigger) {
            return Some(GrammarCompileError::InvalidTrigger(trigger.clone()));
        }
        if !seen.insert(trigger.as_str()) {
            return Some(GrammarCompileError::DuplicateTrigger {
                command: schema.name.clone(),
                trigger: trigger.clone(),
            });
        }
        if schema.find_subcommand(trigger).is_some() {
            return Some(GrammarCompileError::TriggerShadowsSubcommand(trigger.clone()));
        }
    }
    None
}

/// Checks occurrence counts of every command invocation in `tree`.
///
/// For each command or group node in the tree, the direct children are
/// counted per declared parameter and subcommand. A declaration fails when it
/// is required and absent, or when it is bounded, not `multiple`, present,
/// and its count differs from its arity.
///
/// # Errors
///
/// Returns the first [`InvalidInput`] found, in pre-order.
///
/// # Examples
///
/// ```
/// use cligram_core::*;
///
/// let schema = CommandSchema::new("deploy")
///     .with_param(ParamSchema::option(["--env"]).required())
///     .with_param(ParamSchema::switch(["--force"]));
/// let model = CommandModel::build(&schema).unwrap();
/// let parser = ChartParser::new(&Grammar::from_model(&model));
///
/// assert!(validate(&parser.parse("deploy --env prod").unwrap(), &model).is_ok());
/// let err = validate(&parser.parse("deploy --force").unwrap(), &model).unwrap_err();
/// assert_eq!((err.name.as_str(), err.observed), ("env", 0));
/// ```
pub fn validate(tree: &ParseTree, model: &CommandModel) -> Result<(), InvalidInput> {
    validate_invocation(&tree.root, model)
}

fn validate_invocation(invocation: &RuleNode, model: &CommandModel) -> Result<(), InvalidInput> {
    let Some(command) = model.get(invocation.rule) else {
        return Ok(());
    };
    if !command.is_command() {
        return Ok(());
    }

    let mut counts: HashMap<NodeId, usize> = HashMap::new();
    for child in invocation.child_rules() {
        *counts.entry(child.rule).or_default() += 1;
    }
    debug!(command = %command.name, children = counts.len(), "Validating invocation");

    for &id in command.params().iter().chain(command.subcommands()) {
        let declared = model.node(id);
        let observed = counts.get(&id).copied().unwrap_or(0);
        let missing = declared.required && observed == 0;
        let miscounted = match declared.arity {
            Arity::Exactly(n) => {
                !declared.multiple && observed != n as usize && (declared.required || observed > 0)
            }
            Arity::Unbounded => false,
        };
        if missing || miscounted {
            return Err(InvalidInput {
                node: id,
                name: declared.name.clone(),
                observed,
            });
        }
    }

    for child in invocation.child_rules() {
        validate_invocation(child, model)?;
    }
    Ok(())
}
