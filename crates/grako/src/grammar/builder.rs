//! A fluent builder for constructing [`Grammar`] models directly, without
//! going through the out-of-scope bootstrap/grammar-surface parser (spec
//! §6). This is the primary, fully-implemented construction path this
//! crate ships — embedders either bring their own
//! [`crate::external::GrammarSource`] or build models through here, and
//! this crate's own tests (spec §8's scenarios) use it exclusively.

use super::{Directives, Grammar, Node, Rule, RuleId};
use crate::error::GrammarError;

/// Incrementally assembles a [`Grammar`]. Rules are declared up front with
/// [`Builder::rule`] (reserving a [`RuleId`] so forward/recursive
/// references can be built before the rule's own body is known), then
/// given a body with [`Builder::define`].
#[derive(Debug, Default)]
pub struct Builder {
    name: String,
    rules: Vec<Rule>,
    directives: Directives,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            directives: Directives::default(),
        }
    }

    /// Reserve a rule slot and return its [`RuleId`], so that
    /// [`Node::RuleRef`] nodes referring to it (including from within its
    /// own body, for left/right recursion) can be constructed immediately.
    pub fn rule(&mut self, name: impl Into<String>) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule {
            name: name.into(),
            params: Vec::new(),
            kwparams: Vec::new(),
            base: None,
            body: Node::Void,
        });
        id
    }

    /// Like [`Builder::rule`], but also records positional/keyword
    /// parameter names forwarded to the semantics bridge (spec §4.2).
    pub fn rule_with_params(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        kwparams: Vec<String>,
    ) -> RuleId {
        let id = self.rule(name);
        let rule = &mut self.rules[id.0 as usize];
        rule.params = params;
        rule.kwparams = kwparams;
        id
    }

    /// Set the body of a previously reserved rule.
    pub fn define(&mut self, id: RuleId, body: Node) {
        self.rules[id.0 as usize].body = body;
    }

    /// Mark `id` as a based/extension rule: `base`'s body is prepended as
    /// a sequence element ahead of `id`'s own body (spec §4.2).
    pub fn set_base(&mut self, id: RuleId, base: RuleId) {
        self.rules[id.0 as usize].base = Some(base);
    }

    pub fn set_directive(&mut self, key: &str, value: impl Into<String>) {
        self.directives.set(key, value);
    }

    /// Resolve a rule reference built from a name rather than a
    /// pre-reserved [`RuleId`] — convenience for callers that only learn
    /// the target's id after the fact (forward references still need
    /// `rule()` called ahead of time; this looks the id up by name).
    pub fn rule_ref(&self, name: &str) -> Result<Node, GrammarError> {
        let id = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .map(|i| RuleId(i as u32))
            .ok_or_else(|| GrammarError::UndefinedRule {
                name: name.to_string(),
            })?;
        Ok(Node::RuleRef {
            id,
            name: name.to_string(),
            args: Vec::new(),
        })
    }

    /// Finalize the grammar. Checks every `RuleRef` resolves and that no
    /// rule name was declared twice.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        for rule in &self.rules {
            check_refs_resolved(&rule.body, &self.rules)?;
        }
        Grammar::new(self.name, self.rules, self.directives)
    }
}

fn check_refs_resolved(node: &Node, rules: &[Rule]) -> Result<(), GrammarError> {
    match node {
        Node::RuleRef { id, name, args } => {
            if rules.get(id.0 as usize).is_none() {
                return Err(GrammarError::UndefinedRule { name: name.clone() });
            }
            for arg in args {
                check_refs_resolved(arg, rules)?;
            }
            Ok(())
        }
        Node::Group(b)
        | Node::Optional(b)
        | Node::Closure(b)
        | Node::PositiveClosure(b)
        | Node::Lookahead(b)
        | Node::NegativeLookahead(b)
        | Node::Named { body: b, .. }
        | Node::Override { body: b, .. } => check_refs_resolved(b, rules),
        Node::Join { sep, body, .. } => {
            check_refs_resolved(sep, rules)?;
            check_refs_resolved(body, rules)
        }
        Node::Sequence(children) | Node::Choice(children) => {
            for c in children {
                check_refs_resolved(c, rules)?;
            }
            Ok(())
        }
        Node::Void
        | Node::Fail
        | Node::Eof
        | Node::Cut
        | Node::CheckName
        | Node::Token(_)
        | Node::Pattern(_) => Ok(()),
    }
}

/// Handle returned by [`Builder::rule`], re-exported for callers that
/// prefer a named type over a bare `RuleId` in signatures.
pub type RuleBuilder = RuleId;
