//! Rule invocation: packrat memoization keyed on `(position, rule, user
//! state)`, and the seed-and-grow left-recursion strategy built on top of
//! it (spec §4.4). Also hosts [`Node::parse`], the dispatch from a
//! grammar-tree node to the [`ParseContext`] combinator that implements
//! it.

use crate::context::{MemoEntry, ParseContext};
use crate::error::{ErrorKind, PResult, Signal};
use crate::grammar::{Node, RuleId};
use crate::value::Value;
use std::hash::Hash;

impl Node {
    /// Parse this node against `ctx`, dispatching to the matching
    /// combinator. `RuleRef` is the only variant that leaves this module
    /// (via [`invoke_rule`]); everything else is a direct
    /// [`ParseContext`] method call.
    pub fn parse<U: Clone + Eq + Hash>(&self, ctx: &mut ParseContext<U>) -> PResult<Value> {
        match self {
            Node::Void => Ok(Value::Null),
            Node::Fail => Err(Signal::SoftFail(ctx.fail_here(ErrorKind::Other {
                message: "unconditional failure".into(),
            }))),
            Node::Eof => ctx.check_eof(),
            Node::Cut => ctx.cut(),
            Node::CheckName => ctx.check_name(),
            Node::Token(literal) => ctx.token(literal),
            Node::Pattern(compiled) => ctx.pattern(compiled),
            Node::RuleRef { id, args, .. } => {
                for arg in args {
                    arg.parse(ctx)?;
                }
                let value = invoke_rule(*id, ctx)?;
                ctx.record_rule_result(value.clone());
                Ok(value)
            }
            Node::Group(body) => ctx.group(body),
            Node::Optional(body) => ctx.optional(body),
            Node::Closure(body) => ctx.closure(body),
            Node::PositiveClosure(body) => ctx.positive_closure(body),
            Node::Join { sep, body, positive } => ctx.join(sep, body, *positive),
            Node::Lookahead(body) => ctx.lookahead(body),
            Node::NegativeLookahead(body) => ctx.negative_lookahead(body),
            Node::Sequence(children) => {
                let mut last = Value::Null;
                for child in children {
                    last = child.parse(ctx)?;
                }
                Ok(last)
            }
            Node::Choice(alternatives) => ctx.choice(alternatives),
            Node::Named {
                name,
                body,
                force_list,
            } => {
                let value = body.parse(ctx)?;
                ctx.add_named(name, value.clone(), *force_list);
                Ok(value)
            }
            Node::Override { body, force_list } => {
                let value = body.parse(ctx)?;
                ctx.add_override(value.clone(), *force_list);
                Ok(value)
            }
        }
    }
}

/// Invoke rule `id` with packrat memoization and, when
/// [`crate::config::ParseConfig::left_recursion`] is enabled, the
/// seed-and-grow strategy (spec §4.4):
///
/// 1. A cache hit at `(pos, id, state)` replays its stored outcome
///    without re-running the rule body.
/// 2. A cache miss seeds the slot with [`MemoEntry::LeftRecursionSeed`]
///    so a same-position re-entrance (direct or indirect left recursion)
///    fails immediately rather than looping, then runs the body.
/// 3. If the rule is its own recursion head and the first ("seed")
///    parse succeeded, repeatedly re-run the body from the same start
///    position with the best-known result installed as the recursive
///    call's answer, keeping each attempt that consumes strictly more
///    input than the last. Stop when an attempt fails or makes no
///    further progress; the last successful attempt wins.
pub fn invoke_rule<U: Clone + Eq + Hash>(id: RuleId, ctx: &mut ParseContext<U>) -> PResult<Value> {
    let pos = ctx.pos();
    let key = (pos, id, ctx.user_state.clone());

    if let Some(entry) = ctx.memo.get(&key).cloned() {
        return match entry {
            MemoEntry::Success(value, new_pos, new_state) => {
                ctx.scanner.goto(new_pos);
                ctx.user_state = new_state;
                Ok(value)
            }
            MemoEntry::Failure(err) => Err(Signal::SoftFail(err)),
            MemoEntry::LeftRecursionSeed => {
                if !ctx.config.left_recursion {
                    return Err(Signal::SoftFail(ctx.fail_here(ErrorKind::Other {
                        message: format!(
                            "left recursion detected in rule {:?} (left_recursion is disabled)",
                            ctx.grammar.rule(id).name
                        ),
                    })));
                }
                if let Some((value, end_pos, state)) = ctx.recursive_results.get(&key).cloned() {
                    // Replay the growing seed's current-best outcome *and*
                    // its end position/state — otherwise every recursive
                    // self-reference during growth would read the right
                    // value but stay parked at the start position, so the
                    // surrounding sequence could never consume anything
                    // past the seed and growth would halt after one step.
                    ctx.scanner.goto(end_pos);
                    ctx.user_state = state;
                    Ok(value)
                } else {
                    if !ctx.recursion_heads.contains(&id) {
                        ctx.recursion_heads.push(id);
                    }
                    Err(Signal::SoftFail(ctx.fail_here(ErrorKind::Other {
                        message: format!("left recursion into rule {:?}", ctx.grammar.rule(id).name),
                    })))
                }
            }
        };
    }

    guard_recursion_limit(ctx)?;
    // A seed is always needed to terminate left-recursive descent even
    // inside a lookahead; whether the *final* result is kept past this
    // call is the only thing `memoize_lookaheads` gates (spec §4.4 step 5).
    let memoize = !ctx.in_lookahead() || ctx.config.memoize_lookaheads;
    ctx.memo.insert(key.clone(), MemoEntry::LeftRecursionSeed);
    let outcome = run_rule_body(id, ctx);

    match outcome {
        Ok(value) => {
            let new_pos = ctx.pos();
            let new_state = ctx.user_state.clone();
            let (final_value, final_pos, final_state) =
                if ctx.recursion_heads.last() == Some(&id) && !ctx.growing.contains(&id) {
                    ctx.growing.insert(id);
                    let grown = grow_left_recursion(id, ctx, pos, value, new_pos, new_state);
                    ctx.growing.remove(&id);
                    ctx.recursion_heads.retain(|h| h != &id);
                    ctx.recursive_results.retain(|k, _| k.1 != id);
                    grown
                } else {
                    (value, new_pos, new_state)
                };
            let rule_name = ctx.grammar.rule(id).name.clone();
            let semantic = ctx
                .semantics
                .dispatch(&rule_name, final_value)
                .map_err(|message| {
                    Signal::SoftFail(ctx.fail_here(ErrorKind::Semantic { message }))
                })?;
            let semantic = ctx.attach_parseinfo(semantic, &rule_name, pos, final_pos);
            if memoize {
                ctx.memo.insert(
                    key,
                    MemoEntry::Success(semantic.clone(), final_pos, final_state.clone()),
                );
            } else {
                ctx.memo.remove(&key);
            }
            ctx.scanner.goto(final_pos);
            ctx.user_state = final_state;
            Ok(semantic)
        }
        Err(sig) => {
            let err = sig.error().clone();
            if memoize {
                ctx.memo.insert(key, MemoEntry::Failure(err.clone()));
            } else {
                ctx.memo.remove(&key);
            }
            ctx.record_farthest(&err);
            Err(Signal::SoftFail(err))
        }
    }
}

fn run_rule_body<U: Clone + Eq + Hash>(id: RuleId, ctx: &mut ParseContext<U>) -> PResult<Value> {
    let body = ctx.grammar.rule(id).effective_body(ctx.grammar);
    let defines = body.defines();
    ctx.rule_stack.push(ctx.grammar.rule(id).name.clone());
    let result = ctx.rule_scope(&defines, |ctx| body.parse(ctx));
    ctx.rule_stack.pop();
    result
}

fn guard_recursion_limit<U: Clone + Eq + Hash>(ctx: &mut ParseContext<U>) -> PResult<()> {
    if ctx.rule_stack.len() >= ctx.config.recursion_limit {
        return Err(Signal::HardFail(ctx.fail_here(ErrorKind::Other {
            message: format!(
                "recursion limit of {} exceeded",
                ctx.config.recursion_limit
            ),
        })));
    }
    Ok(())
}

/// Re-run `id`'s body at `start_pos`, seeding the recursive call's answer
/// with the current best result each iteration, for as long as the
/// attempt consumes strictly more input than the previous best. The last
/// improving attempt (or the original seed, if none improve) wins.
fn grow_left_recursion<U: Clone + Eq + Hash>(
    id: RuleId,
    ctx: &mut ParseContext<U>,
    start_pos: usize,
    mut best_value: Value,
    mut best_pos: usize,
    mut best_state: U,
) -> (Value, usize, U) {
    loop {
        let key = (start_pos, id, best_state.clone());
        ctx.recursive_results
            .insert(key.clone(), (best_value.clone(), best_pos, best_state.clone()));
        // Keep the seed installed rather than removing it: every
        // self-reference encountered while re-running the body must hit
        // this same memo slot and read `recursive_results` in O(1). If we
        // instead evicted the slot, the first self-reference would miss
        // the cache and kick off an entirely independent nested
        // invocation of the rule, which reinstalls its own seed and
        // re-derives the *base* case from scratch, capping growth at one
        // step no matter how many iterations run.
        ctx.memo.insert(key.clone(), MemoEntry::LeftRecursionSeed);
        ctx.scanner.goto(start_pos);
        let saved_state = std::mem::replace(&mut ctx.user_state, best_state.clone());

        let attempt = run_rule_body(id, ctx);

        match attempt {
            Ok(value) => {
                let new_pos = ctx.pos();
                if new_pos > best_pos {
                    best_value = value;
                    best_pos = new_pos;
                    best_state = ctx.user_state.clone();
                    continue;
                } else {
                    ctx.user_state = saved_state;
                    break;
                }
            }
            Err(_) => {
                ctx.user_state = saved_state;
                break;
            }
        }
    }
    ctx.recursive_results.remove(&(start_pos, id, best_state.clone()));
    (best_value, best_pos, best_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::grammar::{Builder, CompiledPattern};
    use crate::scanner::Scanner;

    /// num = /[0-9]+/ ; left = left '+' num | num ; start = left $
    fn left_recursive_sum_grammar() -> crate::grammar::Grammar {
        let mut b = Builder::new("sum");
        let left = b.rule("left");
        let num = b.rule("num");
        let start = b.rule("start");
        b.define(
            num,
            Node::Pattern(CompiledPattern {
                source: "[0-9]+".into(),
                regex: regex::Regex::new("^[0-9]+").unwrap(),
            }),
        );
        b.define(
            left,
            Node::Choice(vec![
                Node::Sequence(vec![
                    Node::RuleRef {
                        id: left,
                        name: "left".into(),
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
        b.define(
            start,
            Node::Sequence(vec![
                Node::RuleRef {
                    id: left,
                    name: "left".into(),
                    args: vec![],
                },
                Node::Eof,
            ]),
        );
        b.build().unwrap()
    }

    #[test]
    fn seed_and_grow_handles_direct_left_recursion() {
        let grammar = left_recursive_sum_grammar();
        let scanner = Scanner::new("1+2+3", "t");
        let mut ctx: ParseContext<()> =
            ParseContext::new(&grammar, scanner, ParseConfig::new());
        let start = grammar.rule_by_name("start").unwrap();
        let value = invoke_rule(start, &mut ctx).expect("grammar should parse 1+2+3");
        assert!(ctx.scanner.at_end());
        // left grows to consume the whole "1+2+3", so the top rule's CST
        // should nest three levels deep rather than stopping at "1".
        match value {
            Value::List(_) => {}
            other => panic!("expected a structured sequence result, got {other:?}"),
        }
    }

    #[test]
    fn left_recursion_disabled_fails_fast_without_looping() {
        let grammar = left_recursive_sum_grammar();
        let scanner = Scanner::new("1+2", "t");
        let mut ctx: ParseContext<()> =
            ParseContext::new(&grammar, scanner, ParseConfig::new().no_left_recursion());
        let start = grammar.rule_by_name("start").unwrap();
        assert!(invoke_rule(start, &mut ctx).is_err());
    }

    #[test]
    fn memoization_replays_success_without_reparsing() {
        let grammar = left_recursive_sum_grammar();
        let scanner = Scanner::new("1+2", "t");
        let mut ctx: ParseContext<()> =
            ParseContext::new(&grammar, scanner, ParseConfig::new());
        let num = grammar.rule_by_name("num").unwrap();
        let first = invoke_rule(num, &mut ctx).unwrap();
        ctx.scanner.goto(0);
        let second = invoke_rule(num, &mut ctx).unwrap();
        assert_eq!(first, second);
    }
}
