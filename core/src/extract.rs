//! Value extraction: parse tree → resolved value tree.
//!
//! Each command invocation in the tree becomes a [`Resolved`] holding one
//! [`Field`] per parameter or subcommand that occurred (or has a default).
//! Leaf tokens are decoded through their parameter's decoder; switches
//! resolve to `true`.
//!
//! Occurrences are aggregated by the same rule for parameters and
//! subcommands: a node that is `multiple` or whose arity is not exactly one
//! collects every occurrence in input order, any other node keeps the last
//! occurrence.

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::DecodeError;
use crate::model::{CommandModel, Node, NodeId, NodeKind};
use crate::parser::{ParseTree, RuleNode};
use crate::value::Value;

/// Resolved fields of one command invocation, keyed by field name.
pub type Fields = BTreeMap<String, Field>;

/// One resolved parameter or subcommand slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Value(Value),
    /// A subcommand invoked once (or last invocation of a single-valued one).
    Command(Box<Resolved>),
    /// Every invocation of a subcommand that collects a sequence.
    Commands(Vec<Resolved>),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            Field::Command(_) | Field::Commands(_) => None,
        }
    }

    pub fn as_command(&self) -> Option<&Resolved> {
        match self {
            Field::Command(resolved) => Some(resolved),
            Field::Value(_) | Field::Commands(_) => None,
        }
    }

    pub fn as_commands(&self) -> Option<&[Resolved]> {
        match self {
            Field::Commands(all) => Some(all),
            Field::Value(_) | Field::Command(_) => None,
        }
    }

    /// Plain-value view, subcommands becoming nested maps.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Value(value) => value.clone(),
            Field::Command(resolved) => resolved.to_value(),
            Field::Commands(all) => Value::List(all.iter().map(Resolved::to_value).collect()),
        }
    }
}

/// A command invocation with its resolved fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub node: NodeId,
    pub name: String,
    pub fields: Fields,
}

impl Resolved {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Shortcut for a plain value field.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_value)
    }

    /// Shortcut for a single-invocation subcommand.
    pub fn command(&self, name: &str) -> Option<&Resolved> {
        self.get(name).and_then(Field::as_command)
    }

    /// Converts to a nested [`Value::Map`] keyed like the field paths of the
    /// model, ready for path-based merging.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|(name, field)| (name.clone(), field.to_value()))
                .collect(),
        )
    }
}

impl Serialize for Resolved {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// What to do with parameters that did not occur on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Defaults {
    /// Absent, non-required parameters take their declared default.
    #[default]
    Fill,
    /// Only observed parameters appear, so lower-priority configuration
    /// layers can supply the rest.
    Omit,
}

/// Builds the resolved value tree of `tree`, filling in defaults.
///
/// # Errors
///
/// Returns a [`DecodeError`] for the first token, in input order, that its
/// parameter's decoder rejects.
///
/// # Examples
///
/// ```
/// use cligram_core::*;
///
/// let schema = CommandSchema::new("dog")
///     .with_param(ParamSchema::option(["--dog-color"]).allow_multiple())
///     .with_param(ParamSchema::option(["--age"]).with_type(ValueType::Integer).with_default(9));
/// let model = CommandModel::build(&schema).unwrap();
/// let parser = ChartParser::new(&Grammar::from_model(&model));
///
/// let tree = parser.parse("dog --dog-color brown --dog-color black").unwrap();
/// let dog = extract(&tree, &model).unwrap();
/// assert_eq!(dog.value("dog_color"), Some(&Value::from(vec!["brown".into(), "black".into()])));
/// assert_eq!(dog.value("age"), Some(&Value::from(9)));
/// ```
pub fn extract(tree: &ParseTree, model: &CommandModel) -> Result<Resolved, DecodeError> {
    extract_with(tree, model, Defaults::Fill)
}

/// Like [`extract`], with explicit handling of absent parameters.
///
/// # Errors
///
/// Same as [`extract`].
pub fn extract_with(tree: &ParseTree, model: &CommandModel, defaults: Defaults) -> Result<Resolved, DecodeError> {
    resolve(&tree.root, model, defaults)
}

fn resolve(invocation: &RuleNode, model: &CommandModel, defaults: Defaults) -> Result<Resolved, DecodeError> {
    let command = model.node(invocation.rule);

    let mut occurrences: HashMap<NodeId, Vec<Field>> = HashMap::new();
    for child in invocation.child_rules() {
        let field = occurrence(model.node(child.rule), child, model, defaults)?;
        occurrences.entry(child.rule).or_default().push(field);
    }

    let mut fields = Fields::new();
    for &id in command.params().iter().chain(command.subcommands()) {
        let declared = model.node(id);
        let resolved = match occurrences.remove(&id) {
            Some(found) => Some(aggregate(declared, found)),
            None if !declared.required && defaults == Defaults::Fill => {
                declared.default.clone().map(Field::Value)
            }
            None => None,
        };
        if let Some(field) = resolved {
            fields.insert(declared.name.clone(), field);
        }
    }

    debug!(command = %command.name, fields = fields.len(), "Resolved invocation");
    Ok(Resolved {
        node: command.id,
        name: command.name.clone(),
        fields,
    })
}

fn occurrence(
    node: &Node,
    matched: &RuleNode,
    model: &CommandModel,
    defaults: Defaults,
) -> Result<Field, DecodeError> {
    match &node.kind {
        NodeKind::Flag {
            takes_value: false, ..
        } => Ok(Field::Value(Value::Bool(true))),
        NodeKind::Flag {
            takes_value: true, ..
        }
        | NodeKind::Positional => {
            let raw = matched.value().map(|leaf| leaf.text.as_str()).unwrap_or_default();
            node.decode(raw)
                .map(Field::Value)
                .map_err(|reason| DecodeError {
                    node: node.id,
                    parameter: node.name.clone(),
                    raw: raw.to_string(),
                    reason,
                })
        }
        NodeKind::Command { .. } | NodeKind::Group { .. } => {
            resolve(matched, model, defaults).map(|resolved| Field::Command(Box::new(resolved)))
        }
    }
}

fn aggregate(declared: &Node, mut found: Vec<Field>) -> Field {
    if !declared.collects_sequence() {
        // non-empty: only called for observed nodes
        return found.pop().unwrap_or(Field::Value(Value::List(Vec::new())));
    }
    if declared.is_param() {
        let values = found
            .into_iter()
            .filter_map(|field| match field {
                Field::Value(value) => Some(value),
                Field::Command(_) | Field::Commands(_) => None,
            })
            .collect();
        return Field::Value(Value::List(values));
    }
    Field::Commands(
        found
            .into_iter()
            .filter_map(|field| match field {
                Field::Command(resolved) => Some(*resolved),
                Field::Value(_) | Field::Commands(_) => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::parser::ChartParser;
    use crate::types::{Arity, CommandSchema, ParamSchema};
    use crate::value::ValueType;

    fn run(schema: &CommandSchema, line: &str) -> Result<Resolved, DecodeError> {
        let model = CommandModel::build(schema).unwrap();
        let tree = ChartParser::new(&Grammar::from_model(&model)).parse(line).unwrap();
        extract(&tree, &model)
    }

    #[test]
    fn test_extract_decodes_through_value_type() {
        let schema = CommandSchema::new("serve")
            .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer))
            .with_param(ParamSchema::option(["--ratio"]).with_type(ValueType::Float).with_default(0.5))
            .with_param(ParamSchema::switch(["-q", "--quiet"]));
        let serve = run(&schema, "serve --port=8080 -q").unwrap();

        assert_eq!(serve.name, "serve");
        assert_eq!(serve.value("port"), Some(&Value::Integer(8080)));
        assert_eq!(serve.value("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(serve.value("quiet"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_extract_defaults_and_omissions() {
        let schema = CommandSchema::new("serve")
            .with_param(ParamSchema::option(["--host"]))
            .with_param(ParamSchema::option(["--tag"]).allow_multiple())
            .with_param(ParamSchema::switch(["--tls"]))
            .with_param(ParamSchema::argument("root"));
        let serve = run(&schema, "serve /srv").unwrap();

        assert_eq!(serve.value("tls"), Some(&Value::Bool(false)));
        assert_eq!(serve.value("root"), Some(&Value::from("/srv")));
        assert!(serve.get("host").is_none());
        assert!(serve.get("tag").is_none());
    }

    #[test]
    fn test_extract_fills_textual_defaults_with_their_type() {
        let schema = CommandSchema::new("serve")
            .with_param(ParamSchema::option(["--workers"]).with_type(ValueType::Integer).with_default("9"))
            .with_param(ParamSchema::option(["--tls"]).with_type(ValueType::Bool).with_default("off"))
            .with_param(ParamSchema::argument("root"));
        let serve = run(&schema, "serve /srv").unwrap();

        assert_eq!(serve.value("workers"), Some(&Value::Integer(9)));
        assert_eq!(serve.value("tls"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_extract_reports_decode_failure() {
        let schema = CommandSchema::new("serve")
            .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer));
        let err = run(&schema, "serve --port eighty").unwrap_err();
        assert_eq!(err.parameter, "port");
        assert_eq!(err.raw, "eighty");
        assert_eq!(err.node.index(), 1);
    }

    #[test]
    fn test_extract_uses_custom_decoder_and_choices() {
        let schema = CommandSchema::new("paint")
            .with_param(ParamSchema::option(["--color"]).with_choices(["red", "blue"]))
            .with_param(
                ParamSchema::option(["--size"])
                    .with_decoder(|raw| raw.strip_suffix("px").map(Value::from).ok_or_else(|| "missing px".to_string())),
            );
        let paint = run(&schema, "paint --color red --size 12px").unwrap();
        assert_eq!(paint.value("size"), Some(&Value::from("12")));

        let err = run(&schema, "paint --color green --size 1px").unwrap_err();
        assert_eq!(err.parameter, "color");
    }

    #[test]
    fn test_extract_collects_fixed_arity_above_one() {
        let schema = CommandSchema::new("move")
            .with_param(ParamSchema::argument("coords").with_type(ValueType::Integer).with_arity(Arity::Exactly(2)));
        let moved = run(&schema, "move 3 4").unwrap();
        assert_eq!(moved.value("coords"), Some(&Value::List(vec![Value::Integer(3), Value::Integer(4)])));
    }

    #[test]
    fn test_single_subcommand_last_invocation_wins() {
        let schema = CommandSchema::new("top").with_subcommand(
            CommandSchema::new("user").with_param(ParamSchema::option(["--name"])),
        );
        let top = run(&schema, "top user --name a user --name b").unwrap();
        let user = top.command("user").unwrap();
        assert_eq!(user.value("name"), Some(&Value::from("b")));
    }

    #[test]
    fn test_multiple_subcommand_collects_all_invocations() {
        let schema = CommandSchema::new("top").with_subcommand(
            CommandSchema::new("user")
                .allow_multiple()
                .with_param(ParamSchema::option(["--name"])),
        );
        let top = run(&schema, "top user --name a user --name b").unwrap();
        let users = top.get("user").and_then(Field::as_commands).unwrap();
        let names: Vec<_> = users.iter().map(|u| u.value("name").cloned()).collect();
        assert_eq!(names, vec![Some(Value::from("a")), Some(Value::from("b"))]);
    }

    #[test]
    fn test_extract_with_omitted_defaults() {
        let schema = CommandSchema::new("app")
            .with_param(ParamSchema::switch(["--debug"]))
            .with_param(ParamSchema::option(["--level"]).with_default("info"))
            .with_subcommand(CommandSchema::new("db").with_param(ParamSchema::option(["--host"])));
        let model = CommandModel::build(&schema).unwrap();
        let tree = ChartParser::new(&Grammar::from_model(&model))
            .parse("app db --host localhost")
            .unwrap();
        let app = extract_with(&tree, &model, Defaults::Omit).unwrap();

        assert_eq!(app.fields.len(), 1);
        assert_eq!(app.command("db").unwrap().value("host"), Some(&Value::from("localhost")));
    }

    #[test]
    fn test_to_value_nests_subcommands() {
        let schema = CommandSchema::new("app")
            .with_param(ParamSchema::switch(["--debug"]))
            .with_subcommand(CommandSchema::new("db").with_param(ParamSchema::option(["--host"])));
        let app = run(&schema, "app db --host localhost").unwrap();
        let value = app.to_value();

        assert_eq!(value.get_path("db.host"), Some(&Value::from("localhost")));
        assert_eq!(value.get_path("debug"), Some(&Value::Bool(false)));
        assert_eq!(
            serde_json::to_value(&app).unwrap(),
            serde_json::json!({"debug": false, "db": {"host": "localhost"}})
        );
    }
}
