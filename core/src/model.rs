//! Identity-keyed arena of command-model nodes.
//!
//! [`CommandModel::build`] walks a [`CommandSchema`] tree in pre-order and
//! gives every command, group and parameter its own [`NodeId`]. Grammar
//! rules, parse-tree labels and validation errors all refer to nodes by that
//! id, so two parameters that share a display name under different commands
//! can never be confused.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GrammarCompileError;
use crate::types::{Arity, CommandSchema, ParamKind, ParamSchema};
use crate::validate::validate_schema;
use crate::value::{Decoder, Value};

/// Stable identifier of a node in a [`CommandModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Option with trigger tokens; a switch when `takes_value` is false.
    Flag {
        triggers: Vec<String>,
        takes_value: bool,
    },
    /// Positional argument.
    Positional,
    /// Command without subcommands.
    Command { params: Vec<NodeId> },
    /// Command owning named subcommands.
    Group {
        params: Vec<NodeId>,
        subcommands: Vec<NodeId>,
    },
}

/// One registered parameter, command or group.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub arity: Arity,
    pub required: bool,
    pub multiple: bool,
    pub default: Option<Value>,
    decoder: Decoder,
}

impl Node {
    pub fn is_param(&self) -> bool {
        matches!(self.kind, NodeKind::Flag { .. } | NodeKind::Positional)
    }

    pub fn is_command(&self) -> bool {
        !self.is_param()
    }

    /// Declared parameters of a command or group (empty for parameters).
    pub fn params(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Command { params } | NodeKind::Group { params, .. } => params,
            NodeKind::Flag { .. } | NodeKind::Positional => &[],
        }
    }

    /// Declared subcommands of a group (empty otherwise).
    pub fn subcommands(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group { subcommands, .. } => subcommands,
            NodeKind::Flag { .. } | NodeKind::Positional | NodeKind::Command { .. } => &[],
        }
    }

    /// Whether occurrences are collected into a sequence rather than
    /// resolved to a single value.
    pub fn collects_sequence(&self) -> bool {
        self.multiple || self.arity != Arity::Exactly(1)
    }

    /// Whether the number of occurrences is not fixed by the arity.
    pub fn is_unbounded(&self) -> bool {
        self.multiple || self.arity.is_unbounded()
    }

    pub fn decode(&self, raw: &str) -> Result<Value, String> {
        self.decoder.decode(raw)
    }
}

/// Arena of nodes built from a [`CommandSchema`].
///
/// # Examples
///
/// ```
/// use cligram_core::{CommandModel, CommandSchema, ParamSchema};
///
/// let schema = CommandSchema::new("top")
///     .with_subcommand(CommandSchema::new("dog").with_param(ParamSchema::option(["--name"])))
///     .with_subcommand(CommandSchema::new("cat").with_param(ParamSchema::option(["--name"])));
/// let model = CommandModel::build(&schema).unwrap();
///
/// let names: Vec<_> = model.nodes().filter(|n| n.name == "name").map(|n| n.id).collect();
/// assert_eq!(names.len(), 2);
/// assert_ne!(names[0], names[1]);
/// ```
#[derive(Debug, Clone)]
pub struct CommandModel {
    nodes: Vec<Node>,
}

impl CommandModel {
    /// Validates `schema` and registers every node.
    ///
    /// # Errors
    ///
    /// Returns the first [`GrammarCompileError`] reported by
    /// [`validate_schema`].
    pub fn build(schema: &CommandSchema) -> Result<Self, GrammarCompileError> {
        if let Some(error) = validate_schema(schema).into_iter().next() {
            return Err(error);
        }
        let mut model = Self { nodes: Vec::new() };
        model.add_command(schema, None);
        Ok(model)
    }

    fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    fn add_command(&mut self, schema: &CommandSchema, parent: Option<NodeId>) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node {
            id,
            name: schema.name.clone(),
            parent,
            kind: NodeKind::Command { params: Vec::new() },
            arity: schema.arity,
            required: schema.required,
            multiple: schema.multiple,
            default: None,
            decoder: Decoder::default(),
        });

        let params: Vec<NodeId> = schema
            .params
            .iter()
            .map(|param| self.add_param(param, id))
            .collect();
        let subcommands: Vec<NodeId> = schema
            .subcommands
            .iter()
            .map(|sub| self.add_command(sub, Some(id)))
            .collect();

        self.nodes[id.index()].kind = if subcommands.is_empty() {
            NodeKind::Command { params }
        } else {
            NodeKind::Group {
                params,
                subcommands,
            }
        };
        id
    }

    fn add_param(&mut self, param: &ParamSchema, parent: NodeId) -> NodeId {
        let id = self.next_id();
        let kind = match &param.kind {
            ParamKind::Flag {
                triggers,
                takes_value,
            } => NodeKind::Flag {
                triggers: triggers.clone(),
                takes_value: *takes_value,
            },
            ParamKind::Positional => NodeKind::Positional,
        };
        // defaults were checked to decode by validate_schema
        let decoder = param.decoder();
        self.nodes.push(Node {
            id,
            name: param.name.clone(),
            parent: Some(parent),
            kind,
            arity: param.arity,
            required: param.required,
            multiple: param.multiple,
            default: param
                .default
                .as_ref()
                .map(|default| decoder.decode_default(default).unwrap_or_else(|_| default.clone())),
            decoder,
        });
        id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Looks up a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this model.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names from the root's first child down to `id` (the root itself is
    /// the application and is not part of field paths).
    pub fn field_path(&self, id: NodeId) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if node.parent.is_none() {
                break;
            }
            path.push(node.name.as_str());
            current = node.parent;
        }
        path.reverse();
        path
    }

    /// Every parameter with its dotted field path, in pre-order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cligram_core::{CommandModel, CommandSchema, ParamSchema};
    ///
    /// let schema = CommandSchema::new("app")
    ///     .with_param(ParamSchema::switch(["--debug"]))
    ///     .with_subcommand(CommandSchema::new("db").with_param(ParamSchema::option(["--host"])));
    /// let model = CommandModel::build(&schema).unwrap();
    ///
    /// let paths: Vec<String> = model.field_paths().into_iter().map(|(path, _)| path).collect();
    /// assert_eq!(paths, vec!["debug", "db.host"]);
    /// ```
    pub fn field_paths(&self) -> Vec<(String, NodeId)> {
        self.nodes
            .iter()
            .filter(|node| node.is_param())
            .map(|node| (self.field_path(node.id).join("."), node.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandSchema {
        CommandSchema::new("top")
            .with_param(ParamSchema::switch(["--debug"]))
            .with_subcommand(
                CommandSchema::new("dog")
                    .with_param(ParamSchema::option(["--dog-name"]))
                    .with_param(ParamSchema::option(["--dog-color"]).allow_multiple()),
            )
            .with_subcommand(
                CommandSchema::new("cat")
                    .with_param(ParamSchema::option(["--cat-name"]))
                    .with_subcommand(
                        CommandSchema::new("owner").with_param(ParamSchema::option(["--owner-name"])),
                    ),
            )
    }

    #[test]
    fn test_build_assigns_preorder_ids() {
        let model = CommandModel::build(&sample()).unwrap();
        let names: Vec<&str> = model.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["top", "debug", "dog", "dog_name", "dog_color", "cat", "cat_name", "owner", "owner_name"]
        );
        for (index, node) in model.nodes().enumerate() {
            assert_eq!(node.id.index(), index);
        }
    }

    #[test]
    fn test_build_distinguishes_groups_from_commands() {
        let model = CommandModel::build(&sample()).unwrap();
        assert!(matches!(model.root().kind, NodeKind::Group { .. }));
        let dog = model.nodes().find(|n| n.name == "dog").unwrap();
        assert!(matches!(dog.kind, NodeKind::Command { .. }));
        assert_eq!(dog.params().len(), 2);
        assert!(dog.subcommands().is_empty());
    }

    #[test]
    fn test_field_path_skips_root() {
        let model = CommandModel::build(&sample()).unwrap();
        let owner_name = model.nodes().find(|n| n.name == "owner_name").unwrap();
        assert_eq!(model.field_path(owner_name.id), vec!["cat", "owner", "owner_name"]);
        assert!(model.field_path(model.root().id).is_empty());
    }

    #[test]
    fn test_build_rejects_invalid_schema() {
        let schema = CommandSchema::new("top")
            .with_subcommand(CommandSchema::new("a"))
            .with_subcommand(CommandSchema::new("a"));
        assert!(matches!(
            CommandModel::build(&schema),
            Err(GrammarCompileError::DuplicateSubcommand { .. })
        ));
    }

    #[test]
    fn test_collects_sequence() {
        let model = CommandModel::build(&sample()).unwrap();
        let color = model.nodes().find(|n| n.name == "dog_color").unwrap();
        let name = model.nodes().find(|n| n.name == "dog_name").unwrap();
        assert!(color.collects_sequence());
        assert!(!name.collects_sequence());
    }
}
