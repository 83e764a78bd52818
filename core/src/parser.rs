//! Chart parser for compiled grammars.
//!
//! The [`Grammar`] is lowered once into plain BNF: every named rule keeps its
//! [`NodeId`] and repetitions, optionals and nested alternations become
//! auxiliary nonterminals. Unbounded repetitions are left-recursive, which
//! keeps the chart linear in the number of occurrences. Recognition is
//! Earley over tokens (with Aycock-Horspool handling of nullable
//! nonterminals), so any context-free grammar is accepted, ambiguous ones
//! included.
//!
//! One tree is then read back from the chart. Where the input is ambiguous,
//! the leftmost symbol of a production takes the longest span that still lets
//! the rest of the production match, and earlier alternatives win over later
//! ones. Unbounded repetitions are read back with a loop rather than by
//! recursion, so long argument lists do not deepen the stack. Auxiliary
//! nodes are spliced into their parent, so every internal node of a
//! [`ParseTree`] is a named rule of the command model.
//!
//! # Example
//!
//! ```
//! use cligram_core::*;
//!
//! let schema = CommandSchema::new("greet").with_param(ParamSchema::option(["--name"]));
//! let grammar = compile(&schema).unwrap();
//! let parser = ChartParser::new(&grammar);
//!
//! let tree = parser.parse("greet --name=Ada").unwrap();
//! assert_eq!(tree.root.children.len(), 2); // "greet" literal + the --name rule
//! assert!(parser.parse("greet --nick Ada").is_err());
//! ```

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::GrammarParseError;
use crate::grammar::{Expr, Grammar};
use crate::lexer::{Token, join_args, tokenize_with};
use crate::model::NodeId;

/// Whether a leaf matched a literal or a value terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafKind {
    Literal,
    Value,
}

/// A matched token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaf {
    pub kind: LeafKind,
    pub text: String,
    /// Index of the token in the tokenized input.
    pub index: usize,
}

/// An internal node labeled by the rule (model node) that derived it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleNode {
    pub rule: NodeId,
    pub children: Vec<ParseNode>,
}

impl RuleNode {
    /// Direct children that are rule nodes.
    pub fn child_rules(&self) -> impl Iterator<Item = &RuleNode> {
        self.children.iter().filter_map(|child| match child {
            ParseNode::Rule(node) => Some(node),
            ParseNode::Leaf(_) => None,
        })
    }

    /// First direct value leaf, if any.
    pub fn value(&self) -> Option<&Leaf> {
        self.children.iter().find_map(|child| match child {
            ParseNode::Leaf(leaf) if leaf.kind == LeafKind::Value => Some(leaf),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParseNode {
    Rule(RuleNode),
    Leaf(Leaf),
}

/// Concrete derivation of one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseTree {
    pub input: String,
    pub root: RuleNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Symbol {
    Literal(String),
    Value,
    Nonterminal(usize),
}

impl Symbol {
    fn matches(&self, token: &Token) -> Option<LeafKind> {
        match self {
            Symbol::Literal(text) if *text == token.text => Some(LeafKind::Literal),
            Symbol::Value => Some(LeafKind::Value),
            Symbol::Literal(_) | Symbol::Nonterminal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Named(NodeId),
    Aux,
    /// `star -> star item | ε`; the index points into `ChartParser::star_items`.
    Star(usize),
}

#[derive(Debug, Clone)]
struct BnfRule {
    lhs: usize,
    rhs: Vec<Symbol>,
}

/// A grammar lowered for chart parsing. Built once, shared read-only by any
/// number of parses.
#[derive(Debug, Clone)]
pub struct ChartParser {
    labels: Vec<Label>,
    rules: Vec<BnfRule>,
    by_lhs: Vec<Vec<usize>>,
    nullable: Vec<bool>,
    star_items: Vec<Symbol>,
    /// Literals that start with `-`; only these split on a joined `=`.
    triggers: HashSet<String>,
    start: usize,
}

struct Lowering {
    labels: Vec<Label>,
    rules: Vec<BnfRule>,
    star_items: Vec<Symbol>,
    named: HashMap<NodeId, usize>,
}

impl Lowering {
    fn aux(&mut self) -> usize {
        self.labels.push(Label::Aux);
        self.labels.len() - 1
    }

    fn push(&mut self, lhs: usize, rhs: Vec<Symbol>) {
        self.rules.push(BnfRule { lhs, rhs });
    }

    fn alternatives(&mut self, expr: &Expr) -> Vec<Vec<Symbol>> {
        match expr {
            Expr::Alt(items) => items.iter().map(|item| self.sequence(item)).collect(),
            Expr::Optional(inner) => {
                let mut alternatives = self.alternatives(inner);
                alternatives.push(Vec::new());
                alternatives
            }
            _ => vec![self.sequence(expr)],
        }
    }

    fn sequence(&mut self, expr: &Expr) -> Vec<Symbol> {
        match expr {
            Expr::Seq(items) => items.iter().flat_map(|item| self.sequence(item)).collect(),
            _ => vec![self.symbol(expr)],
        }
    }

    fn symbol(&mut self, expr: &Expr) -> Symbol {
        match expr {
            Expr::Literal(text) => Symbol::Literal(text.clone()),
            Expr::Value => Symbol::Value,
            Expr::Rule(id) => Symbol::Nonterminal(self.named[id]),
            Expr::Seq(_) | Expr::Alt(_) | Expr::Optional(_) => {
                let nt = self.aux();
                for rhs in self.alternatives(expr) {
                    self.push(nt, rhs);
                }
                Symbol::Nonterminal(nt)
            }
            Expr::Repeat { expr, min, max } => Symbol::Nonterminal(self.repeat(expr, *min, *max)),
        }
    }

    /// `item{min}` followed by a left-recursive tail `star -> star item | ε`
    /// when unbounded, or a chain of `max - min` optional items otherwise.
    fn repeat(&mut self, expr: &Expr, min: u32, max: Option<u32>) -> usize {
        let item = self.symbol(expr);
        let tail = match max {
            None => {
                self.labels.push(Label::Star(self.star_items.len()));
                self.star_items.push(item.clone());
                let star = self.labels.len() - 1;
                self.push(star, vec![Symbol::Nonterminal(star), item.clone()]);
                self.push(star, Vec::new());
                star
            }
            Some(max) => {
                let mut tail = self.aux();
                self.push(tail, Vec::new());
                for _ in min..max {
                    let next = self.aux();
                    self.push(next, vec![item.clone(), Symbol::Nonterminal(tail)]);
                    self.push(next, Vec::new());
                    tail = next;
                }
                tail
            }
        };
        let repeat = self.aux();
        let mut rhs: Vec<Symbol> = (0..min).map(|_| item.clone()).collect();
        rhs.push(Symbol::Nonterminal(tail));
        self.push(repeat, rhs);
        repeat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    rule: usize,
    dot: usize,
    origin: usize,
}

struct Chart {
    sets: Vec<Vec<Item>>,
    seen: Vec<HashSet<Item>>,
    /// `(nonterminal, start, end)` spans that some complete item covers.
    completed: HashSet<(usize, usize, usize)>,
}

impl Chart {
    fn new(len: usize) -> Self {
        Self {
            sets: vec![Vec::new(); len + 1],
            seen: vec![HashSet::new(); len + 1],
            completed: HashSet::new(),
        }
    }

    fn add(&mut self, set: usize, item: Item) {
        if self.seen[set].insert(item) {
            self.sets[set].push(item);
        }
    }
}

impl ChartParser {
    /// Lowers `grammar` for chart parsing.
    pub fn new(grammar: &Grammar) -> Self {
        let mut lowering = Lowering {
            labels: Vec::new(),
            rules: Vec::new(),
            star_items: Vec::new(),
            named: HashMap::new(),
        };
        for production in grammar.rules() {
            lowering.labels.push(Label::Named(production.id));
            lowering
                .named
                .insert(production.id, lowering.labels.len() - 1);
        }
        for production in grammar.rules() {
            let lhs = lowering.named[&production.id];
            for rhs in lowering.alternatives(&production.expr) {
                lowering.push(lhs, rhs);
            }
        }

        let Lowering {
            labels,
            rules,
            star_items,
            named,
        } = lowering;
        let mut by_lhs = vec![Vec::new(); labels.len()];
        for (index, rule) in rules.iter().enumerate() {
            by_lhs[rule.lhs].push(index);
        }
        let nullable = nullable_set(labels.len(), &rules);
        let triggers = rules
            .iter()
            .flat_map(|rule| &rule.rhs)
            .filter_map(|symbol| match symbol {
                Symbol::Literal(text) if text.starts_with('-') => Some(text.clone()),
                _ => None,
            })
            .collect();
        let start = named[&grammar.start()];

        Self {
            labels,
            rules,
            by_lhs,
            nullable,
            star_items,
            triggers,
            start,
        }
    }

    /// Tokenizes and parses a command line. A joined `--flag=value` word is
    /// split only when `--flag` is a trigger of this grammar.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarParseError`] when the text cannot be tokenized or
    /// has no derivation.
    pub fn parse(&self, text: &str) -> Result<ParseTree, GrammarParseError> {
        let tokens = tokenize_with(text, |flag| self.triggers.contains(flag))?;
        self.parse_tokens(text, &tokens)
    }

    /// Shell-quotes and joins `args`, then parses the result.
    ///
    /// # Errors
    ///
    /// Same as [`ChartParser::parse`].
    pub fn parse_args<I, S>(&self, args: I) -> Result<ParseTree, GrammarParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parse(&join_args(args))
    }

    /// Parses already tokenized input; `input` is only kept for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarParseError`] when the tokens have no derivation.
    pub fn parse_tokens(&self, input: &str, tokens: &[Token]) -> Result<ParseTree, GrammarParseError> {
        let chart = self.recognize(tokens);
        let n = tokens.len();
        debug!(
            tokens = n,
            items = chart.sets.iter().map(Vec::len).sum::<usize>(),
            "Chart filled"
        );

        if !chart.completed.contains(&(self.start, 0, n)) {
            return Err(self.failure(input, tokens, &chart));
        }

        let spans = span_index(&chart.completed);
        let mut builder = TreeBuilder {
            parser: self,
            tokens,
            spans: &spans,
            feasible: HashMap::new(),
            active: HashSet::new(),
        };
        let mut nodes = builder
            .build(self.start, 0, n)
            .ok_or_else(|| self.failure(input, tokens, &chart))?;
        match nodes.pop() {
            Some(ParseNode::Rule(root)) if nodes.is_empty() => Ok(ParseTree {
                input: input.to_string(),
                root,
            }),
            _ => Err(self.failure(input, tokens, &chart)),
        }
    }

    fn recognize(&self, tokens: &[Token]) -> Chart {
        let n = tokens.len();
        let mut chart = Chart::new(n);
        for &rule in &self.by_lhs[self.start] {
            chart.add(0, Item { rule, dot: 0, origin: 0 });
        }

        for k in 0..=n {
            let mut i = 0;
            while i < chart.sets[k].len() {
                let item = chart.sets[k][i];
                i += 1;
                let rule = &self.rules[item.rule];

                match rule.rhs.get(item.dot) {
                    None => {
                        chart.completed.insert((rule.lhs, item.origin, k));
                        let advanced: Vec<Item> = chart.sets[item.origin]
                            .iter()
                            .filter(|parent| {
                                self.rules[parent.rule].rhs.get(parent.dot)
                                    == Some(&Symbol::Nonterminal(rule.lhs))
                            })
                            .map(|parent| Item {
                                dot: parent.dot + 1,
                                ..*parent
                            })
                            .collect();
                        for next in advanced {
                            chart.add(k, next);
                        }
                    }
                    Some(Symbol::Nonterminal(nt)) => {
                        for &predicted in &self.by_lhs[*nt] {
                            chart.add(
                                k,
                                Item {
                                    rule: predicted,
                                    dot: 0,
                                    origin: k,
                                },
                            );
                        }
                        if self.nullable[*nt] {
                            chart.add(
                                k,
                                Item {
                                    dot: item.dot + 1,
                                    ..item
                                },
                            );
                        }
                    }
                    Some(terminal) => {
                        if k < n && terminal.matches(&tokens[k]).is_some() {
                            chart.add(
                                k + 1,
                                Item {
                                    dot: item.dot + 1,
                                    ..item
                                },
                            );
                        }
                    }
                }
            }
        }
        chart
    }

    fn failure(&self, input: &str, tokens: &[Token], chart: &Chart) -> GrammarParseError {
        let furthest = chart
            .sets
            .iter()
            .rposition(|set| !set.is_empty())
            .unwrap_or(0);

        let mut expected: Vec<String> = chart.sets[furthest]
            .iter()
            .filter_map(|item| match self.rules[item.rule].rhs.get(item.dot) {
                Some(Symbol::Literal(text)) => Some(text.clone()),
                Some(Symbol::Value) => Some("<value>".to_string()),
                _ => None,
            })
            .collect();
        expected.sort();
        expected.dedup();

        GrammarParseError {
            input: input.to_string(),
            position: Some(furthest),
            found: tokens.get(furthest).map(|t| t.text.clone()),
            expected,
            reason: None,
        }
    }
}

fn nullable_set(count: usize, rules: &[BnfRule]) -> Vec<bool> {
    let mut nullable = vec![false; count];
    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            if nullable[rule.lhs] {
                continue;
            }
            let empty = rule.rhs.iter().all(|symbol| match symbol {
                Symbol::Nonterminal(nt) => nullable[*nt],
                Symbol::Literal(_) | Symbol::Value => false,
            });
            if empty {
                nullable[rule.lhs] = true;
                changed = true;
            }
        }
    }
    nullable
}

/// Ends of the completed spans of each `(nonterminal, start)`, longest first.
fn span_index(completed: &HashSet<(usize, usize, usize)>) -> HashMap<(usize, usize), Vec<usize>> {
    let mut index: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for &(nt, start, end) in completed {
        index.entry((nt, start)).or_default().push(end);
    }
    for ends in index.values_mut() {
        ends.sort_unstable_by(|a, b| b.cmp(a));
    }
    index
}

/// Reads one derivation back out of a filled chart.
struct TreeBuilder<'a> {
    parser: &'a ChartParser,
    tokens: &'a [Token],
    spans: &'a HashMap<(usize, usize), Vec<usize>>,
    feasible: HashMap<(usize, usize, usize, usize), bool>,
    /// Nonterminal spans currently being built, to cut derivation cycles.
    active: HashSet<(usize, usize, usize)>,
}

impl TreeBuilder<'_> {
    /// Builds `nt` over `tokens[start..end]`: a single rule node for named
    /// rules, the spliced children for auxiliary ones.
    fn build(&mut self, nt: usize, start: usize, end: usize) -> Option<Vec<ParseNode>> {
        let parser = self.parser;
        if let Label::Star(index) = parser.labels[nt] {
            return self.build_star(&parser.star_items[index], start, end);
        }
        if !self.active.insert((nt, start, end)) {
            return None;
        }
        let mut result = None;
        for &rule in &parser.by_lhs[nt] {
            if !self.is_feasible(rule, 0, start, end) {
                continue;
            }
            if let Some(children) = self.build_rest(rule, 0, start, end) {
                result = Some(children);
                break;
            }
        }
        self.active.remove(&(nt, start, end));

        let children = result?;
        Some(match parser.labels[nt] {
            Label::Named(id) => vec![ParseNode::Rule(RuleNode { rule: id, children })],
            Label::Aux | Label::Star(_) => children,
        })
    }

    /// Builds a run of `item`s covering `tokens[start..end]`, each taking
    /// the longest span that still lets the remaining items match.
    fn build_star(&mut self, item: &Symbol, start: usize, end: usize) -> Option<Vec<ParseNode>> {
        // reachable[k - start]: tokens[k..end] splits into non-empty items
        let mut reachable = vec![false; end - start + 1];
        reachable[end - start] = true;
        for k in (start..end).rev() {
            reachable[k - start] = self
                .item_ends(item, k, end)
                .into_iter()
                .any(|split| reachable[split - start]);
        }
        if !reachable[0] {
            return None;
        }

        let mut nodes = Vec::new();
        let mut k = start;
        while k < end {
            let mut step = None;
            for split in self.item_ends(item, k, end) {
                if !reachable[split - start] {
                    continue;
                }
                if let Some(children) = self.build_symbol(item, k, split) {
                    step = Some((split, children));
                    break;
                }
            }
            let (split, children) = step?;
            nodes.extend(children);
            k = split;
        }
        Some(nodes)
    }

    /// Ends `> start` and `<= end` at which `symbol` can finish, longest first.
    fn item_ends(&self, symbol: &Symbol, start: usize, end: usize) -> Vec<usize> {
        match symbol {
            Symbol::Nonterminal(nt) => self
                .ends(*nt, start, end)
                .into_iter()
                .filter(|&split| split > start)
                .collect(),
            terminal => {
                let matched = start < end && terminal.matches(&self.tokens[start]).is_some();
                if matched { vec![start + 1] } else { Vec::new() }
            }
        }
    }

    fn build_symbol(&mut self, symbol: &Symbol, start: usize, end: usize) -> Option<Vec<ParseNode>> {
        match symbol {
            Symbol::Nonterminal(nt) => self.build(*nt, start, end),
            terminal => {
                let token = self.tokens.get(start).filter(|_| start + 1 == end)?;
                let kind = terminal.matches(token)?;
                Some(vec![ParseNode::Leaf(Leaf {
                    kind,
                    text: token.text.clone(),
                    index: start,
                })])
            }
        }
    }

    /// Completed ends of `nt` from `start`, no further than `end`, longest first.
    fn ends(&self, nt: usize, start: usize, end: usize) -> Vec<usize> {
        self.spans
            .get(&(nt, start))
            .map(|ends| ends.iter().copied().filter(|&split| split <= end).collect())
            .unwrap_or_default()
    }

    /// Builds symbols `dot..` of `rule` over `tokens[start..end]`, giving
    /// the current symbol the longest span that lets the rest match.
    fn build_rest(&mut self, rule: usize, dot: usize, start: usize, end: usize) -> Option<Vec<ParseNode>> {
        let parser = self.parser;
        let Some(symbol) = parser.rules[rule].rhs.get(dot) else {
            return (start == end).then(Vec::new);
        };

        match symbol {
            Symbol::Nonterminal(nt) => {
                for split in self.ends(*nt, start, end) {
                    if !self.is_feasible(rule, dot + 1, split, end) {
                        continue;
                    }
                    let Some(mut nodes) = self.build(*nt, start, split) else {
                        continue;
                    };
                    if let Some(rest) = self.build_rest(rule, dot + 1, split, end) {
                        nodes.extend(rest);
                        return Some(nodes);
                    }
                }
                None
            }
            terminal => {
                let token = self.tokens.get(start).filter(|_| start < end)?;
                let kind = terminal.matches(token)?;
                let mut nodes = vec![ParseNode::Leaf(Leaf {
                    kind,
                    text: token.text.clone(),
                    index: start,
                })];
                nodes.extend(self.build_rest(rule, dot + 1, start + 1, end)?);
                Some(nodes)
            }
        }
    }

    fn is_feasible(&mut self, rule: usize, dot: usize, start: usize, end: usize) -> bool {
        let key = (rule, dot, start, end);
        if let Some(&known) = self.feasible.get(&key) {
            return known;
        }
        let parser = self.parser;
        let result = match parser.rules[rule].rhs.get(dot) {
            None => start == end,
            Some(Symbol::Nonterminal(nt)) => self
                .ends(*nt, start, end)
                .into_iter()
                .any(|split| self.is_feasible(rule, dot + 1, split, end)),
            Some(terminal) => {
                start < end
                    && terminal.matches(&self.tokens[start]).is_some()
                    && self.is_feasible(rule, dot + 1, start + 1, end)
            }
        };
        self.feasible.insert(key, result);
        result
    }
}

/// Lowers `grammar` and parses `text` in one go. Prefer a shared
/// [`ChartParser`] when parsing repeatedly.
///
/// # Errors
///
/// Same as [`ChartParser::parse`].
pub fn parse(grammar: &Grammar, text: &str) -> Result<ParseTree, GrammarParseError> {
    ChartParser::new(grammar).parse(text)
}
