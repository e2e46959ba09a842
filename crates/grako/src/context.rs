//! Per-parse mutable state and the PEG combinators that drive it (spec
//! §3 "Parse Context state", §4.3). Every combinator here is *scoped*:
//! whatever it pushes onto the ast/cst/cut stacks is popped on every exit
//! path, success or failure, matching spec §5's resource-acquisition
//! invariant and `grako/contexts.py`'s `@contextmanager`-based `_try`/
//! `_option`/`_group`/`_if` methods (ported to explicit push/match/pop
//! since Rust has no generator-based context managers).

use crate::config::ParseConfig;
use crate::error::{ErrorKind, ParseError, PResult, Signal};
use crate::grammar::{compute_first, first_of_node, FirstSet, Grammar, Node, RuleId};
use crate::scanner::Scanner;
use crate::semantics::{NoopSemantics, Semantics};
use crate::value::{Ast, Value, OVERRIDE_KEY};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// An entry in the packrat memoization table (spec §3 "Memoization
/// table", §4.4).
#[derive(Debug, Clone)]
pub(crate) enum MemoEntry<U> {
    Success(Value, usize, U),
    Failure(ParseError),
    /// Seeded at rule entry so a same-position re-entrance fails
    /// immediately — the seed-and-grow left-recursion strategy.
    LeftRecursionSeed,
}

/// Per-parse mutable state: the ast/cst/cut/rule stacks, the
/// memoization and left-recursion bookkeeping, and the scanner. Created
/// fresh for each [`crate::GrammarModel::parse`] call and discarded on
/// return (spec §3 "Lifecycle").
pub struct ParseContext<'g, U = ()> {
    pub(crate) grammar: &'g Grammar,
    pub(crate) config: ParseConfig,
    pub(crate) scanner: Scanner,

    pub(crate) ast_stack: Vec<Ast>,
    pub(crate) cst_stack: Vec<Option<Value>>,
    cut_stack: Vec<bool>,
    pub(crate) rule_stack: Vec<String>,
    lookahead_depth: usize,
    pub(crate) last_node: Option<Value>,
    pub(crate) user_state: U,
    pub(crate) farthest: Option<ParseError>,

    pub(crate) memo: HashMap<(usize, RuleId, U), MemoEntry<U>>,
    /// The growing seed's current best `(value, end_pos, state)` per
    /// recursive key — a self-reference hit during growth must replay
    /// this *and* advance the scanner to `end_pos`, not just hand back
    /// the value at the unchanged start position.
    pub(crate) recursive_results: HashMap<(usize, RuleId, U), (Value, usize, U)>,
    pub(crate) recursion_heads: Vec<RuleId>,
    pub(crate) growing: HashSet<RuleId>,

    /// Per-rule FIRST sets (spec §4.2), computed once on first use and
    /// reused for every subsequent choice failure — the grammar is
    /// immutable for the context's whole lifetime, so the fixed point
    /// never needs recomputing.
    first_sets: Option<HashMap<RuleId, FirstSet>>,

    pub(crate) semantics: Box<dyn Semantics>,
}

impl<'g, U: Clone + Eq + Hash + Default> ParseContext<'g, U> {
    pub fn new(grammar: &'g Grammar, scanner: Scanner, config: ParseConfig) -> Self {
        Self::with_semantics(grammar, scanner, config, Box::new(NoopSemantics))
    }

    pub fn with_semantics(
        grammar: &'g Grammar,
        scanner: Scanner,
        config: ParseConfig,
        semantics: Box<dyn Semantics>,
    ) -> Self {
        Self {
            grammar,
            config,
            scanner,
            ast_stack: Vec::new(),
            cst_stack: vec![None],
            cut_stack: Vec::new(),
            rule_stack: Vec::new(),
            lookahead_depth: 0,
            last_node: None,
            user_state: U::default(),
            farthest: None,
            memo: HashMap::new(),
            recursive_results: HashMap::new(),
            recursion_heads: Vec::new(),
            growing: HashSet::new(),
            first_sets: None,
            semantics,
        }
    }
}

impl<'g, U: Clone + Eq + Hash> ParseContext<'g, U> {
    pub fn pos(&self) -> usize {
        self.scanner.pos()
    }

    pub fn in_lookahead(&self) -> bool {
        self.lookahead_depth > 0
    }

    pub fn fail_here(&self, kind: ErrorKind) -> ParseError {
        ParseError::new(kind, self.scanner.pos(), self.rule_stack.clone())
    }

    pub(crate) fn record_farthest(&mut self, err: &ParseError) {
        if self.farthest.as_ref().is_none_or(|f| err.is_farther_than(f)) {
            self.farthest = Some(err.clone());
        }
    }

    /// Write `node` into the current CST slot as a single (possibly
    /// nested) element — `grako/contexts.py::_add_cst_node` — and record
    /// it as the last matched value.
    fn add_cst_node(&mut self, node: Value) {
        if let Some(slot) = self.cst_stack.last_mut() {
            *slot = Some(match slot.take() {
                None => node.clone(),
                Some(Value::List(mut items)) => {
                    items.push(node.clone());
                    Value::List(items)
                }
                Some(previous) => Value::List(vec![previous, node.clone()]),
            });
        }
        self.last_node = Some(node);
    }

    /// Merge `node` into the current CST slot, flattening list-into-list
    /// — `grako/contexts.py::_extend_cst`. Used when a scoped combinator
    /// (`try`, `group`) folds its local result back into its caller.
    fn extend_cst(&mut self, node: Option<Value>) {
        let Some(node) = node else { return };
        let Some(slot) = self.cst_stack.last_mut() else {
            return;
        };
        *slot = Some(match (slot.take(), node) {
            (None, n) => n,
            (Some(Value::List(mut p)), Value::List(n)) => {
                p.extend(n);
                Value::List(p)
            }
            (Some(p), Value::List(n)) => {
                let mut items = vec![p];
                items.extend(n);
                Value::List(items)
            }
            (Some(Value::List(mut p)), n) => {
                p.push(n);
                Value::List(p)
            }
            (Some(p), n) => Value::List(vec![p, n]),
        });
    }

    fn push_pair_cloned(&mut self) {
        self.cst_stack.push(None);
        let cloned = self.ast_stack.last().cloned().unwrap_or_default();
        self.ast_stack.push(cloned);
    }

    fn push_pair_empty(&mut self) {
        self.cst_stack.push(None);
        self.ast_stack.push(Ast::new());
    }

    fn pop_pair(&mut self) -> (Ast, Option<Value>) {
        let cst = self.cst_stack.pop().unwrap_or(None);
        let ast = self.ast_stack.pop().unwrap_or_default();
        (ast, cst)
    }

    // ---- §4.3 combinators --------------------------------------------

    /// Snapshot position/state/ast, run `f` against a fresh (cloned) ast
    /// frame; on success replace the outer frame with the (now-enriched)
    /// clone and fold the inner CST into the outer; on failure restore
    /// everything and propagate. `grako/contexts.py::_try`.
    pub fn try_scope<F>(&mut self, f: F) -> PResult<Value>
    where
        F: FnOnce(&mut Self) -> PResult<Value>,
    {
        let pos0 = self.scanner.pos();
        let state0 = self.user_state.clone();
        let last_node0 = self.last_node.clone();
        self.push_pair_cloned();
        match f(self) {
            Ok(v) => {
                let (ast, cst) = self.pop_pair();
                if let Some(outer) = self.ast_stack.last_mut() {
                    *outer = ast;
                }
                self.extend_cst(cst.clone());
                self.last_node = cst;
                Ok(v)
            }
            Err(sig) => {
                self.pop_pair();
                self.scanner.goto(pos0);
                self.user_state = state0;
                self.last_node = last_node0;
                self.record_farthest(sig.error());
                Err(sig)
            }
        }
    }

    /// One alternative of a [`ParseContext::choice`]: a fresh cut flag,
    /// a `try_scope`, and — on non-cut failure — a plain re-raise so the
    /// enclosing choice can try the next alternative. `_option`.
    pub fn option<F>(&mut self, f: F) -> PResult<Value>
    where
        F: FnOnce(&mut Self) -> PResult<Value>,
    {
        self.cut_stack.push(false);
        let result = self.try_scope(f);
        let cut_fired = self.cut_stack.pop().unwrap_or(false);
        match result {
            Ok(v) => Ok(v),
            Err(sig @ Signal::HardFail(_)) => Err(sig),
            Err(sig @ Signal::SoftFail(_)) => {
                if cut_fired {
                    Err(sig.into_hard())
                } else {
                    Err(sig)
                }
            }
        }
    }

    /// Ordered choice: the first alternative to succeed wins (PEG, not
    /// "longest match"). A hard failure stops the search but is
    /// unwrapped back to an ordinary failure as it leaves the choice —
    /// cut only ever suppresses sibling alternatives of the choice it
    /// fires in. `_choice`, which catches `FailedCut` and re-raises its
    /// `.nested` (unwrapped) cause.
    pub fn choice(&mut self, alternatives: &[Node]) -> PResult<Value> {
        let mut farthest: Option<ParseError> = None;
        for alt in alternatives {
            match self.option(|ctx| alt.parse(ctx)) {
                Ok(v) => return Ok(v),
                Err(Signal::HardFail(e)) => {
                    self.record_farthest(&e);
                    return Err(Signal::SoftFail(e));
                }
                Err(Signal::SoftFail(e)) => {
                    self.record_farthest(&e);
                    farthest = Some(e);
                }
            }
        }
        // Every alternative backtracked, so the scanner sits back at the
        // choice's entry position — report the FIRST set of the whole
        // choice there (spec §4.2) rather than just the last-tried
        // alternative's concrete error.
        let err = match self.expecting_one_of(alternatives) {
            Some(alternatives) => self.fail_here(ErrorKind::ExpectedOneOf { alternatives }),
            None => farthest.unwrap_or_else(|| {
                self.fail_here(ErrorKind::Other {
                    message: "no alternatives in choice".into(),
                })
            }),
        };
        self.record_farthest(&err);
        Err(Signal::SoftFail(err))
    }

    /// The sorted, FIRST-set-derived "expecting one of ..." labels for a
    /// failed choice, or `None` if the choice's alternatives carry no
    /// statically-known FIRST items (e.g. an all-`Void`/cut choice).
    fn expecting_one_of(&mut self, alternatives: &[Node]) -> Option<Vec<String>> {
        if self.first_sets.is_none() {
            self.first_sets = Some(compute_first(self.grammar));
        }
        let firsts = self.first_sets.as_ref().expect("just populated above");
        let mut items = HashSet::new();
        for alt in alternatives {
            items.extend(first_of_node(alt, firsts).items);
        }
        if items.is_empty() {
            return None;
        }
        let mut labels: Vec<String> = items.iter().map(ToString::to_string).collect();
        labels.sort();
        Some(labels)
    }

    /// `choice(option(body))`: never fails unless a cut inside `body`
    /// commits and then the alternative still fails.
    pub fn optional(&mut self, body: &Node) -> PResult<Value> {
        match self.option(|ctx| body.parse(ctx)) {
            Ok(v) => Ok(v),
            Err(Signal::HardFail(e)) => Err(Signal::SoftFail(e)),
            Err(Signal::SoftFail(_)) => Ok(Value::Null),
        }
    }

    /// Push a CST-only frame, run `body`, then flatten the result back
    /// into the caller — grouping affects precedence, not CST shape.
    /// `_group`.
    pub fn group(&mut self, body: &Node) -> PResult<Value> {
        self.cst_stack.push(None);
        let result = body.parse(self);
        match result {
            Ok(_) => {
                let inner = self.cst_stack.pop().unwrap_or(None);
                self.extend_cst(inner.clone());
                let value = inner.unwrap_or(Value::Null);
                self.last_node = Some(value.clone());
                Ok(value)
            }
            Err(e) => {
                self.cst_stack.pop();
                Err(e)
            }
        }
    }

    /// Positive lookahead: run `body`, always rewind position/state and
    /// discard its ast/cst frame, regardless of outcome. `_if`.
    pub fn lookahead(&mut self, body: &Node) -> PResult<Value> {
        let pos0 = self.scanner.pos();
        let state0 = self.user_state.clone();
        self.lookahead_depth += 1;
        self.push_pair_empty();
        let result = body.parse(self);
        self.pop_pair();
        self.lookahead_depth -= 1;
        self.scanner.goto(pos0);
        self.user_state = state0;
        self.last_node = None;
        result.map(|_| Value::Null)
    }

    /// Negative lookahead: succeeds iff `body` would fail. `_ifnot`.
    pub fn negative_lookahead(&mut self, body: &Node) -> PResult<Value> {
        match self.lookahead(body) {
            Ok(_) => Err(Signal::SoftFail(self.fail_here(ErrorKind::Other {
                message: "unexpected input".into(),
            }))),
            Err(_) => Ok(Value::Null),
        }
    }

    /// A CST frame whose contents are discarded on exit — used to keep
    /// join separators out of the matched tree.
    pub fn ignore<F>(&mut self, f: F) -> PResult<Value>
    where
        F: FnOnce(&mut Self) -> PResult<Value>,
    {
        self.cst_stack.push(None);
        let result = f(self);
        self.cst_stack.pop();
        result
    }

    fn repeat<F>(&mut self, mut iteration: F, require_one: bool) -> PResult<Value>
    where
        F: FnMut(&mut Self, bool) -> PResult<Value>,
    {
        self.cst_stack.push(Some(Value::List(Vec::new())));
        let mut count = 0usize;
        loop {
            self.cut_stack.push(false);
            let before = self.scanner.pos();
            let attempt = self.try_scope(|ctx| iteration(ctx, count == 0));
            let cut_fired = self.cut_stack.pop().unwrap_or(false);
            match attempt {
                Ok(_) => {
                    if self.scanner.pos() == before {
                        self.cst_stack.pop();
                        return Err(Signal::SoftFail(self.fail_here(ErrorKind::EmptyClosure)));
                    }
                    count += 1;
                }
                Err(Signal::HardFail(e)) => {
                    self.cst_stack.pop();
                    return Err(Signal::HardFail(e));
                }
                Err(sig @ Signal::SoftFail(_)) => {
                    if cut_fired {
                        self.cst_stack.pop();
                        return Err(sig.into_hard());
                    }
                    break;
                }
            }
        }
        let list = self.cst_stack.pop().unwrap_or(Some(Value::List(Vec::new())));
        if require_one && count == 0 {
            return Err(Signal::SoftFail(self.fail_here(ErrorKind::Other {
                message: "expected at least one repetition".into(),
            })));
        }
        let value = list.unwrap_or(Value::List(Vec::new()));
        self.add_cst_node(value.clone());
        Ok(value)
    }

    /// Zero-or-more repetition; an iteration consuming no input is a
    /// grammar-bug failure (`EmptyClosure`), never silently tolerated.
    pub fn closure(&mut self, body: &Node) -> PResult<Value> {
        self.repeat(|ctx, _| body.parse(ctx), false)
    }

    /// One-or-more repetition.
    pub fn positive_closure(&mut self, body: &Node) -> PResult<Value> {
        self.repeat(|ctx, _| body.parse(ctx), true)
    }

    /// Repetition with a separator pattern consumed (and discarded)
    /// between elements.
    pub fn join(&mut self, sep: &Node, body: &Node, positive: bool) -> PResult<Value> {
        self.repeat(
            |ctx, is_first| {
                if !is_first {
                    ctx.ignore(|ctx| sep.parse(ctx))?;
                }
                body.parse(ctx)
            },
            positive,
        )
    }

    /// Match a literal token, skipping leading whitespace/comments
    /// first.
    pub fn token(&mut self, literal: &str) -> PResult<Value> {
        self.scanner.next_token();
        match self.scanner.match_literal(Some(literal)) {
            Some(matched) => {
                let value = Value::Token(matched);
                self.add_cst_node(value.clone());
                Ok(value)
            }
            None => Err(Signal::SoftFail(self.fail_here(ErrorKind::ExpectedToken {
                literal: literal.to_string(),
            }))),
        }
    }

    /// Match a regex pattern, anchored at the current position without
    /// a leading whitespace skip (spec §4.3: `pattern` calls
    /// `scanner.match_regex` directly, unlike `token`).
    pub fn pattern(&mut self, compiled: &crate::grammar::CompiledPattern) -> PResult<Value> {
        match self.scanner.match_regex(&compiled.regex) {
            Some(matched) => {
                let value = Value::Token(matched);
                self.add_cst_node(value.clone());
                Ok(value)
            }
            None => Err(Signal::SoftFail(self.fail_here(ErrorKind::ExpectedPattern {
                pattern: compiled.source.clone(),
            }))),
        }
    }

    /// Set the innermost (per-alternative) cut flag and evict
    /// memoization/left-recursion entries behind the cut position.
    pub fn cut(&mut self) -> PResult<Value> {
        if let Some(top) = self.cut_stack.last_mut() {
            *top = true;
        }
        let pos = self.scanner.pos();
        self.memo.retain(|k, _| k.0 >= pos);
        self.recursive_results.retain(|k, _| k.0 >= pos);
        Ok(Value::Null)
    }

    pub fn check_eof(&mut self) -> PResult<Value> {
        self.scanner.next_token();
        if self.scanner.at_end() {
            Ok(Value::Null)
        } else {
            Err(Signal::SoftFail(self.fail_here(ErrorKind::ExpectedEof)))
        }
    }

    /// If the last matched token is a configured reserved word, fail
    /// (spec §4.3 `check_name`).
    pub fn check_name(&mut self) -> PResult<Value> {
        let Some(Value::Token(text)) = self.last_node.clone() else {
            return Ok(Value::Null);
        };
        let is_reserved = self.config.keywords.iter().any(|kw| {
            if self.config.ignorecase {
                kw.eq_ignore_ascii_case(&text)
            } else {
                kw == &text
            }
        });
        if is_reserved {
            Err(Signal::SoftFail(self.fail_here(ErrorKind::ReservedWord {
                word: text,
            })))
        } else {
            Ok(Value::Null)
        }
    }

    pub(crate) fn add_named(&mut self, name: &str, value: Value, force_list: bool) {
        let key = Ast::sanitize_name(name);
        if let Some(frame) = self.ast_stack.last_mut() {
            frame.add(&key, value, force_list);
        }
    }

    pub(crate) fn add_override(&mut self, value: Value, force_list: bool) {
        if let Some(frame) = self.ast_stack.last_mut() {
            frame.add(OVERRIDE_KEY, value, force_list);
        }
    }

    /// Rule-invocation scope: a fresh, *empty* (not cloned — a callee's
    /// captures never bleed into its caller's frame) ast/cst pair, spec
    /// §4.4 step 3's "push a fresh AST frame". On success applies
    /// `defines()` and the override/empty-CST rules of spec §4.3; the
    /// rule's own frame is always discarded afterwards — only the
    /// resulting [`Value`] crosses the rule boundary.
    pub(crate) fn rule_scope<F>(&mut self, rule_defines: &[(String, bool)], f: F) -> PResult<Value>
    where
        F: FnOnce(&mut Self) -> PResult<Value>,
    {
        let pos0 = self.scanner.pos();
        let state0 = self.user_state.clone();
        self.push_pair_empty();
        match f(self) {
            Ok(_) => {
                let (scalar_keys, list_keys): (Vec<String>, Vec<String>) = {
                    let mut scalars = Vec::new();
                    let mut lists = Vec::new();
                    for (name, force_list) in rule_defines {
                        if *force_list {
                            lists.push(name.clone());
                        } else {
                            scalars.push(name.clone());
                        }
                    }
                    (scalars, lists)
                };
                if let Some(frame) = self.ast_stack.last_mut() {
                    frame.define(&scalar_keys, &list_keys);
                }
                let (ast, cst) = self.pop_pair();
                let value = if let Some(over) = ast.get(OVERRIDE_KEY) {
                    over.clone()
                } else if ast.is_empty() {
                    cst.unwrap_or(Value::Null)
                } else {
                    Value::Map(ast)
                };
                Ok(value)
            }
            Err(sig) => {
                self.pop_pair();
                self.scanner.goto(pos0);
                self.user_state = state0;
                Err(sig)
            }
        }
    }

    /// Record a rule call's result into the caller's CST, the same way
    /// a token match does — a rule reference is a single matched "thing"
    /// from the perspective of whatever referenced it.
    pub(crate) fn record_rule_result(&mut self, value: Value) {
        self.add_cst_node(value);
    }

    /// When [`crate::config::ParseConfig::parseinfo`] is enabled, tag an
    /// AST-map rule result with `buffer`/`rule`/`pos`/`endpos`/`line`/
    /// `endline` (spec §6). A scalar or list result (override, or a rule
    /// with no named captures) is left untouched — parseinfo only ever
    /// attaches to the mapping a rule's named captures produced.
    pub(crate) fn attach_parseinfo(
        &self,
        value: Value,
        rule_name: &str,
        start_pos: usize,
        end_pos: usize,
    ) -> Value {
        if !self.config.parseinfo {
            return value;
        }
        let Value::Map(mut ast) = value else {
            return value;
        };
        let start = self.scanner.line_info(start_pos);
        let end = self.scanner.line_info(end_pos);
        let mut info = Ast::new();
        info.add("buffer", Value::Token(start.filename.clone()), false);
        info.add("rule", Value::Token(rule_name.to_string()), false);
        info.add("pos", Value::Token(start_pos.to_string()), false);
        info.add("endpos", Value::Token(end_pos.to_string()), false);
        info.add("line", Value::Token(start.line.to_string()), false);
        info.add("endline", Value::Token(end.line.to_string()), false);
        ast.add("parseinfo", Value::Map(info), false);
        Value::Map(ast)
    }
}
