//! FIRST/FOLLOW computation over the grammar model (spec §4.2, §4.6), used
//! only to build "expecting one of ..." diagnostics at choice failures —
//! it never gates parsing itself.
//!
//! This implementation fixes k = 1 (single-token lookahead sets) rather
//! than the spec's general k-tuple formulation; a single token is already
//! what `apollo-parser`-style diagnostics show a user ("expected one of:
//! ..."), and the richer k>1 form is not exercised anywhere in spec §8's
//! testable properties. Recorded as a resolved Open Question in DESIGN.md.

use super::{Grammar, Node, RuleId};
use std::collections::{HashMap, HashSet};

/// One element of a FIRST or FOLLOW set: what token shape is expected next.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FirstItem {
    Literal(String),
    Pattern(String),
    Eof,
}

impl std::fmt::Display for FirstItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirstItem::Literal(s) => write!(f, "{s:?}"),
            FirstItem::Pattern(p) => write!(f, "/{p}/"),
            FirstItem::Eof => write!(f, "end of input"),
        }
    }
}

/// A FIRST (or FOLLOW) set: the tokens that may come next, plus whether
/// the subtree it was computed for can also match the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet {
    pub items: HashSet<FirstItem>,
    pub nullable: bool,
}

impl FirstSet {
    fn leaf(item: FirstItem) -> Self {
        let mut items = HashSet::new();
        items.insert(item);
        Self {
            items,
            nullable: false,
        }
    }

    fn nullable_empty() -> Self {
        Self {
            items: HashSet::new(),
            nullable: true,
        }
    }

    fn union(&self, other: &FirstSet) -> FirstSet {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        FirstSet {
            items,
            nullable: self.nullable || other.nullable,
        }
    }

    fn union_with(&mut self, other: &FirstSet) -> bool {
        let before = self.items.len();
        let before_nullable = self.nullable;
        self.items.extend(other.items.iter().cloned());
        self.nullable |= other.nullable;
        self.items.len() != before || self.nullable != before_nullable
    }
}

pub(crate) fn first_of_node(node: &Node, firsts: &HashMap<RuleId, FirstSet>) -> FirstSet {
    match node {
        Node::Void | Node::Cut | Node::CheckName => FirstSet::nullable_empty(),
        Node::Fail => FirstSet::default(),
        Node::Eof => FirstSet::leaf(FirstItem::Eof),
        Node::Token(lit) if lit.is_empty() => FirstSet::nullable_empty(),
        Node::Token(lit) => FirstSet::leaf(FirstItem::Literal(lit.clone())),
        Node::Pattern(p) => FirstSet::leaf(FirstItem::Pattern(p.source.clone())),
        Node::RuleRef { id, .. } => firsts.get(id).cloned().unwrap_or_default(),
        Node::Group(b) | Node::Named { body: b, .. } | Node::Override { body: b, .. } => {
            first_of_node(b, firsts)
        }
        Node::Optional(b) | Node::Closure(b) => {
            let mut set = first_of_node(b, firsts);
            set.nullable = true;
            set
        }
        Node::PositiveClosure(b) => first_of_node(b, firsts),
        Node::Join { sep: _, body, positive } => {
            let mut set = first_of_node(body, firsts);
            if !positive {
                set.nullable = true;
            }
            set
        }
        Node::Lookahead(b) => {
            let mut set = first_of_node(b, firsts);
            set.nullable = true;
            set
        }
        Node::NegativeLookahead(_) => FirstSet::nullable_empty(),
        Node::Sequence(children) => {
            let mut out = FirstSet::nullable_empty();
            for child in children {
                let child_set = first_of_node(child, firsts);
                out = out.union(&FirstSet {
                    items: child_set.items.clone(),
                    nullable: false,
                });
                if !child_set.nullable {
                    out.nullable = false;
                    return out;
                }
            }
            out.nullable = true;
            out
        }
        Node::Choice(children) => {
            let mut out = FirstSet::default();
            for child in children {
                out = out.union(&first_of_node(child, firsts));
            }
            out
        }
    }
}

/// Compute FIRST sets for every rule in `grammar`, iterating to a fixed
/// point over the (possibly mutually recursive) rule reference graph.
pub fn compute_first(grammar: &Grammar) -> HashMap<RuleId, FirstSet> {
    let mut firsts: HashMap<RuleId, FirstSet> = grammar
        .rule_ids()
        .map(|id| (id, FirstSet::default()))
        .collect();
    let max_iters = grammar.rule_count().saturating_mul(2) + 4;
    for _ in 0..max_iters {
        let mut changed = false;
        for id in grammar.rule_ids() {
            let computed = first_of_node(&grammar.rule(id).body, &firsts);
            let entry = firsts.get_mut(&id).unwrap();
            if entry.union_with(&computed) {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    firsts
}

fn propagate(
    node: &Node,
    tail: &FirstSet,
    firsts: &HashMap<RuleId, FirstSet>,
    follow: &mut HashMap<RuleId, FirstSet>,
) {
    match node {
        Node::RuleRef { id, .. } => {
            follow.entry(*id).or_default().union_with(tail);
        }
        // Sequence._follow traverses right-to-left (spec §3 invariants).
        Node::Sequence(children) => {
            let mut current_tail = tail.clone();
            for child in children.iter().rev() {
                propagate(child, &current_tail, firsts, follow);
                let child_first = first_of_node(child, firsts);
                current_tail = if child_first.nullable {
                    child_first.union(&current_tail)
                } else {
                    child_first
                };
            }
        }
        // Choice._follow unions: every alternative shares the same tail.
        Node::Choice(children) => {
            for child in children {
                propagate(child, tail, firsts, follow);
            }
        }
        Node::Group(b) | Node::Named { body: b, .. } | Node::Override { body: b, .. } => {
            propagate(b, tail, firsts, follow)
        }
        Node::Optional(b) | Node::Lookahead(b) | Node::NegativeLookahead(b) => {
            propagate(b, tail, firsts, follow)
        }
        Node::Closure(b) | Node::PositiveClosure(b) => {
            let inner_tail = first_of_node(b, firsts).union(tail);
            propagate(b, &inner_tail, firsts, follow);
        }
        Node::Join { sep, body, .. } => {
            let body_first = first_of_node(body, firsts);
            let sep_first = first_of_node(sep, firsts);
            let inner_tail = body_first.union(&sep_first).union(tail);
            propagate(body, &inner_tail, firsts, follow);
            propagate(sep, &inner_tail, firsts, follow);
        }
        Node::Void
        | Node::Fail
        | Node::Eof
        | Node::Cut
        | Node::CheckName
        | Node::Token(_)
        | Node::Pattern(_) => {}
    }
}

/// Compute FOLLOW sets for every rule, seeding the start rule's FOLLOW with
/// end-of-input and iterating to a fixed point.
pub fn compute_follow(
    grammar: &Grammar,
    firsts: &HashMap<RuleId, FirstSet>,
) -> HashMap<RuleId, FirstSet> {
    let mut follow: HashMap<RuleId, FirstSet> = grammar
        .rule_ids()
        .map(|id| (id, FirstSet::default()))
        .collect();
    if let Some(start) = grammar.start_rule() {
        follow.entry(start).or_default().union_with(&FirstSet::leaf(FirstItem::Eof));
    }
    let max_iters = grammar.rule_count().saturating_mul(2) + 4;
    for _ in 0..max_iters {
        let mut changed = false;
        for id in grammar.rule_ids() {
            let tail = follow.get(&id).cloned().unwrap_or_default();
            let before_len: usize = follow.values().map(|s| s.items.len()).sum();
            propagate(&grammar.rule(id).body, &tail, firsts, &mut follow);
            let after_len: usize = follow.values().map(|s| s.items.len()).sum();
            if after_len != before_len {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    follow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Builder;

    #[test]
    fn first_follow_reach_fixed_point_on_recursive_grammar() {
        // expr = expr '+' num | num ; num = /[0-9]+/ ; start = expr $
        let mut b = Builder::new("g");
        let expr = b.rule("expr");
        let num = b.rule("num");
        let start = b.rule("start");
        b.define(
            expr,
            Node::Choice(vec![
                Node::Sequence(vec![
                    Node::RuleRef {
                        id: expr,
                        name: "expr".into(),
                        args: vec![],
                    },
                    Node::Token("+".into()),
                    Node::RuleRef {
                        id: num,
                        name: "num".into(),
                        args: vec![],
                    },
                ]),
                Node::RuleRef {
                    id: num,
                    name: "num".into(),
                    args: vec![],
                },
            ]),
        );
        b.define(num, Node::Pattern(crate::grammar::CompiledPattern {
            source: "[0-9]+".into(),
            regex: regex::Regex::new("^[0-9]+").unwrap(),
        }));
        b.define(
            start,
            Node::Sequence(vec![
                Node::RuleRef {
                    id: expr,
                    name: "expr".into(),
                    args: vec![],
                },
                Node::Eof,
            ]),
        );
        let grammar = b.build().unwrap();
        let firsts = compute_first(&grammar);
        let follows = compute_follow(&grammar, &firsts);
        assert!(firsts.get(&num).unwrap().items.contains(&FirstItem::Pattern("[0-9]+".into())));
        // Running the computation again must yield the same sets.
        let firsts2 = compute_first(&grammar);
        assert_eq!(firsts, firsts2);
        assert!(follows.get(&expr).unwrap().items.contains(&FirstItem::Literal("+".into())));
    }
}
