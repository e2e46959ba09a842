//! The grammar model: a tagged tree of parsing-expression nodes rooted at
//! a [`Grammar`], plus the FIRST/FOLLOW computation spec §4.2/§4.6 describe.
//!
//! `RuleRef` is the only cross-link in the tree and is resolved to a
//! [`RuleId`] — an arena index — at build time rather than kept as a raw
//! name, per Design Notes' "Cyclic grammar graph": the grammar owns a flat
//! `Vec<Rule>`, other nodes borrow by index instead of by name or pointer.

mod builder;
mod first_follow;

pub use builder::{Builder, RuleBuilder};
pub use first_follow::{FirstItem, FirstSet};
pub(crate) use first_follow::{compute_first, first_of_node};

use crate::error::GrammarError;
use regex::Regex;
use std::collections::HashMap;

/// An index into a [`Grammar`]'s rule arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

/// A parsing-expression tree node (spec §3 "Grammar node").
#[derive(Debug, Clone)]
pub enum Node {
    /// Matches nothing and always succeeds, consuming no input.
    Void,
    /// Always fails.
    Fail,
    /// Succeeds only at end of input.
    Eof,
    /// Commits the innermost choice frame (`~`).
    Cut,
    /// Fails if the last matched token is a configured reserved word
    /// (spec §4.3 `check_name`); otherwise matches nothing.
    CheckName,
    Token(String),
    Pattern(CompiledPattern),
    RuleRef {
        id: RuleId,
        name: String,
        args: Vec<Node>,
    },
    Group(Box<Node>),
    Optional(Box<Node>),
    Closure(Box<Node>),
    PositiveClosure(Box<Node>),
    Join {
        sep: Box<Node>,
        body: Box<Node>,
        positive: bool,
    },
    Lookahead(Box<Node>),
    NegativeLookahead(Box<Node>),
    Sequence(Vec<Node>),
    Choice(Vec<Node>),
    Named {
        name: String,
        body: Box<Node>,
        force_list: bool,
    },
    Override {
        body: Box<Node>,
        force_list: bool,
    },
}

/// A regex paired with the source text it was compiled from, so diagnostics
/// can name the pattern rather than its compiled form.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
}

impl Node {
    /// The `(name, force_list)` pairs this subtree introduces into the
    /// ambient AST frame (spec §4.2 `defines()`), used to pre-declare keys
    /// so every alternative of a rule exposes the same capture set. Content
    /// under a lookahead is excluded: its AST frame is discarded on exit
    /// regardless of outcome (spec §4.3 `if`/`ifnot`).
    pub fn defines(&self) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        self.collect_defines(&mut out);
        out
    }

    fn collect_defines(&self, out: &mut Vec<(String, bool)>) {
        match self {
            Node::Named {
                name, force_list, body,
            } => {
                out.push((name.clone(), *force_list));
                body.collect_defines(out);
            }
            Node::Group(b) | Node::Optional(b) | Node::Closure(b) | Node::PositiveClosure(b) => {
                b.collect_defines(out)
            }
            Node::Join { body, .. } => body.collect_defines(out),
            Node::Sequence(children) | Node::Choice(children) => {
                for c in children {
                    c.collect_defines(out);
                }
            }
            Node::Override { body, .. } => body.collect_defines(out),
            Node::Lookahead(_) | Node::NegativeLookahead(_) => {}
            Node::Void
            | Node::Fail
            | Node::Eof
            | Node::Cut
            | Node::CheckName
            | Node::Token(_)
            | Node::Pattern(_)
            | Node::RuleRef { .. } => {}
        }
    }
}

/// A rule: an optional base to extend (the "based rule" feature — the
/// base's body is prepended as a sequence element ahead of this rule's own
/// body), positional/keyword parameter names (threaded through to the
/// semantics bridge, not consumed by the engine itself), and a body.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub params: Vec<String>,
    pub kwparams: Vec<String>,
    pub base: Option<RuleId>,
    pub body: Node,
}

impl Rule {
    /// The effective body to parse: the base rule's body prepended as a
    /// sequence element when this rule extends another.
    pub fn effective_body<'a>(&'a self, grammar: &'a Grammar) -> Node {
        match self.base {
            None => self.body.clone(),
            Some(base_id) => {
                let base_body = grammar.rule(base_id).body.clone();
                Node::Sequence(vec![base_body, self.body.clone()])
            }
        }
    }
}

/// Grammar-source directives (`@@whitespace`, `@@keyword`, ...) as
/// surfaced by the out-of-scope bootstrap parser (spec §6). Stored
/// generically since no bootstrap grammar-surface parser ships with this
/// crate; a [`crate::external::GrammarSource`] implementation (or the
/// [`Builder`] API directly) is expected to populate these.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    values: HashMap<String, String>,
}

impl Directives {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// The grammar model: an arena of rules plus the directives that named it.
/// Immutable once built (spec §3 "Lifecycle"); a single `Grammar` may drive
/// any number of concurrent, independent parses.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: String,
    rules: Vec<Rule>,
    by_name: HashMap<String, RuleId>,
    pub directives: Directives,
    start: Option<RuleId>,
}

impl Grammar {
    pub(crate) fn new(name: impl Into<String>, rules: Vec<Rule>, directives: Directives) -> Result<Self, GrammarError> {
        let mut by_name = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            if by_name.insert(rule.name.clone(), RuleId(i as u32)).is_some() {
                return Err(GrammarError::DuplicateRule {
                    name: rule.name.clone(),
                });
            }
        }
        let start = rules.first().map(|_| RuleId(0));
        Ok(Self {
            name: name.into(),
            rules,
            by_name,
            directives,
            start,
        })
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> {
        (0..self.rules.len() as u32).map(RuleId)
    }

    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.by_name.get(name).copied()
    }

    /// The first rule defined, used as the default parse start (spec §6
    /// `GrammarModel.parse(text, start?, ...)`).
    pub fn start_rule(&self) -> Option<RuleId> {
        self.start
    }

    pub fn set_start_rule(&mut self, id: RuleId) {
        self.start = Some(id);
    }
}
