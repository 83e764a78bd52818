//! Grammar compiler: command model → context-free grammar.
//!
//! Every node of a [`CommandModel`] becomes one named rule, keyed by its
//! [`NodeId`]. Options match one of their trigger tokens, optionally
//! followed by `=` and a value; positional arguments match a bare value;
//! commands match their name followed by a bounded repetition of their
//! parameters; groups match their name followed by one or more subcommands
//! or own parameters in any order.
//!
//! The rendering produced by [`Grammar`]'s `Display` impl is lark-like and
//! stable, which makes [`Grammar::fingerprint`] usable to compare grammars.
//!
//! # Example
//!
//! ```
//! use cligram_core::*;
//!
//! let schema = CommandSchema::new("dog")
//!     .with_param(ParamSchema::option(["--dog-name"]))
//!     .with_param(ParamSchema::option(["--age"]).with_default(9));
//! let grammar = compile(&schema).unwrap();
//!
//! let text = grammar.to_string();
//! assert!(text.contains(r#"dog_0 : "dog" (dog_name_1 | age_2) ~ 1..2"#));
//! assert!(text.contains(r#"dog_name_1 : "--dog-name" "="? value"#));
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use sha2::{Digest, Sha256};

use crate::error::GrammarCompileError;
use crate::model::{CommandModel, Node, NodeId, NodeKind};
use crate::types::{Arity, CommandSchema};

/// Production expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Exact token.
    Literal(String),
    /// Any single token.
    Value,
    /// Reference to a named rule.
    Rule(NodeId),
    Seq(Vec<Expr>),
    /// Ordered alternation; earlier alternatives are preferred.
    Alt(Vec<Expr>),
    Optional(Box<Expr>),
    /// `min` to `max` repetitions (`None` = unbounded).
    Repeat {
        expr: Box<Expr>,
        min: u32,
        max: Option<u32>,
    },
}

impl Expr {
    fn alt(mut items: Vec<Expr>) -> Expr {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Alt(items)
        }
    }
}

/// One named rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub id: NodeId,
    /// Unique spelling: sanitized node name plus node id.
    pub name: String,
    pub expr: Expr,
}

/// Compiled grammar of one command model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    rules: BTreeMap<NodeId, Production>,
    start: NodeId,
}

/// Builds the model for `schema` and compiles it.
///
/// # Errors
///
/// Returns a [`GrammarCompileError`] when the schema is malformed.
pub fn compile(schema: &CommandSchema) -> Result<Grammar, GrammarCompileError> {
    let model = CommandModel::build(schema)?;
    Ok(Grammar::from_model(&model))
}

/// Number of parameter occurrences a command needs at minimum: parameters that
/// are required or have no default count once when their count is open, and
/// by their arity otherwise.
pub fn min_params(model: &CommandModel, command: &Node) -> u32 {
    minimum(model, command, true)
}

fn minimum(model: &CommandModel, command: &Node, count_required: bool) -> u32 {
    command
        .params()
        .iter()
        .map(|id| model.node(*id))
        .filter(|param| if param.required { count_required } else { param.default.is_none() })
        .map(|param| match param.arity {
            Arity::Exactly(n) if !param.multiple => n,
            _ => 1,
        })
        .sum()
}

/// Number of parameter occurrences a command accepts at most, `None` when any
/// parameter is unbounded.
pub fn max_params(model: &CommandModel, command: &Node) -> Option<u32> {
    command
        .params()
        .iter()
        .map(|id| model.node(*id))
        .map(|param| match param.arity {
            Arity::Exactly(n) if !param.multiple => Some(n),
            _ => None,
        })
        .sum()
}

impl Grammar {
    /// Emits one rule per node of `model`; the root's rule is the start rule.
    pub fn from_model(model: &CommandModel) -> Self {
        Self::lower_bounded(model, true)
    }

    /// Like [`Grammar::from_model`], but required parameters do not count
    /// toward a command's minimum. A line that omits one still parses, and
    /// [`validate`](fn@crate::validate) reports the missing parameter by name.
    pub fn with_required_deferred(model: &CommandModel) -> Self {
        Self::lower_bounded(model, false)
    }

    fn lower_bounded(model: &CommandModel, count_required: bool) -> Self {
        let rules = model
            .nodes()
            .map(|node| {
                let production = Production {
                    id: node.id,
                    name: rule_name(node),
                    expr: node_expr(model, node, count_required),
                };
                (node.id, production)
            })
            .collect();
        Self {
            rules,
            start: model.root().id,
        }
    }

    /// Assembles a grammar from hand-written productions.
    ///
    /// Returns `None` when `start` or any rule referenced by an expression
    /// has no production.
    pub fn from_productions(
        start: NodeId,
        productions: impl IntoIterator<Item = Production>,
    ) -> Option<Self> {
        let rules: BTreeMap<NodeId, Production> = productions
            .into_iter()
            .map(|production| (production.id, production))
            .collect();
        let closed = rules.contains_key(&start)
            && rules
                .values()
                .all(|production| references_resolve(&production.expr, &rules));
        closed.then_some(Self { rules, start })
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn rule(&self, id: NodeId) -> Option<&Production> {
        self.rules.get(&id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Production> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// SHA-256 of the rendered grammar, hex encoded.
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.to_string().as_bytes());
        format!("{:x}", hash)
    }

    fn write_expr(&self, out: &mut String, expr: &Expr, nested: bool) {
        match expr {
            Expr::Literal(text) => {
                let _ = write!(out, "{text:?}");
            }
            Expr::Value => out.push_str("value"),
            Expr::Rule(id) => match self.rules.get(id) {
                Some(rule) => out.push_str(&rule.name),
                None => {
                    let _ = write!(out, "<missing {id}>");
                }
            },
            Expr::Seq(items) => {
                if nested {
                    out.push('(');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_expr(out, item, true);
                }
                if nested {
                    out.push(')');
                }
            }
            Expr::Alt(items) => {
                if nested {
                    out.push('(');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    self.write_expr(out, item, true);
                }
                if nested {
                    out.push(')');
                }
            }
            Expr::Optional(inner) => {
                self.write_expr(out, inner, true);
                out.push('?');
            }
            Expr::Repeat { expr, min, max } => {
                self.write_expr(out, expr, true);
                match (min, max) {
                    (0, None) => out.push('*'),
                    (1, None) => out.push('+'),
                    (min, None) => {
                        let _ = write!(out, " ~ {min}..");
                    }
                    (min, Some(max)) => {
                        let _ = write!(out, " ~ {min}..{max}");
                    }
                }
            }
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.rules.values() {
            let mut body = String::new();
            self.write_expr(&mut body, &rule.expr, false);
            writeln!(f, "{} : {}", rule.name, body)?;
        }
        writeln!(f, r"?value : /\S+/")?;
        match self.rules.get(&self.start) {
            Some(start) => writeln!(f, "?start : {}", start.name),
            None => Ok(()),
        }
    }
}

fn references_resolve(expr: &Expr, rules: &BTreeMap<NodeId, Production>) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Value => true,
        Expr::Rule(id) => rules.contains_key(id),
        Expr::Seq(items) | Expr::Alt(items) => items.iter().all(|item| references_resolve(item, rules)),
        Expr::Optional(inner) => references_resolve(inner, rules),
        Expr::Repeat { expr, .. } => references_resolve(expr, rules),
    }
}

fn rule_name(node: &Node) -> String {
    let sanitized: String = node
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{sanitized}_{}", node.id.index())
}

fn node_expr(model: &CommandModel, node: &Node, count_required: bool) -> Expr {
    match &node.kind {
        NodeKind::Flag {
            triggers,
            takes_value: false,
        } => Expr::alt(triggers.iter().cloned().map(Expr::Literal).collect()),
        NodeKind::Flag {
            triggers,
            takes_value: true,
        } => Expr::alt(
            triggers
                .iter()
                .map(|trigger| {
                    Expr::Seq(vec![
                        Expr::Literal(trigger.clone()),
                        Expr::Optional(Box::new(Expr::Literal("=".to_string()))),
                        Expr::Value,
                    ])
                })
                .collect(),
        ),
        NodeKind::Positional => Expr::Value,
        NodeKind::Command { params } => {
            let name = Expr::Literal(node.name.clone());
            if params.is_empty() {
                return name;
            }
            let alternatives = Expr::alt(params.iter().copied().map(Expr::Rule).collect());
            // An open upper bound drops the lower one so that commands whose
            // parameters are all unbounded accept an empty invocation.
            let (min, max) = match max_params(model, node) {
                Some(max) => (minimum(model, node, count_required), Some(max)),
                None => (0, None),
            };
            Expr::Seq(vec![
                name,
                Expr::Repeat {
                    expr: Box::new(alternatives),
                    min,
                    max,
                },
            ])
        }
        NodeKind::Group {
            params,
            subcommands,
        } => {
            let alternatives = Expr::alt(
                subcommands
                    .iter()
                    .chain(params.iter())
                    .copied()
                    .map(Expr::Rule)
                    .collect(),
            );
            Expr::Seq(vec![
                Expr::Literal(node.name.clone()),
                Expr::Repeat {
                    expr: Box::new(alternatives),
                    min: 1,
                    max: None,
                },
            ])
        }
    }
}
