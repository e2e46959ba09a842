//! Integration tests for the six concrete scenarios and the keyword /
//! left-recursion / cut properties they exercise, building each grammar
//! directly through [`grako::grammar::Builder`] rather than through any
//! grammar-surface syntax (out of scope for this crate).

use grako::config::ParseConfig;
use grako::error::{Error, ErrorKind};
use grako::grammar::{Builder, CompiledPattern, Node};
use grako::value::Value;
use grako::GrammarModel;

fn pattern(source: &str) -> Node {
    Node::Pattern(CompiledPattern {
        regex: regex::Regex::new(&format!("^{source}")).unwrap(),
        source: source.to_string(),
    })
}

fn token(lit: &str) -> Node {
    Node::Token(lit.to_string())
}

/// Recursively collect every [`Value::Token`] leaf in left-to-right
/// match order, the way a reader would read the raw CST back as a token
/// stream regardless of how deeply a left-recursive or nested rule call
/// structured it.
fn flatten_tokens(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Token(s) => out.push(s.clone()),
        Value::List(items) => items.iter().for_each(|v| flatten_tokens(v, out)),
        Value::Map(ast) => ast.iter().for_each(|(_, v)| flatten_tokens(v, out)),
        Value::Null => {}
    }
}

/// Scenario 1 — right-associative arithmetic with ordered choice and cut.
#[test]
fn right_associative_arithmetic_with_cut() {
    let mut b = Builder::new("arith");
    let expr = b.rule("expr");
    let term = b.rule("term");
    let factor = b.rule("factor");
    let start = b.rule("start");

    b.define(
        expr,
        Node::Choice(vec![
            Node::Sequence(vec![
                b.rule_ref("term").unwrap(),
                token("+"),
                Node::Cut,
                b.rule_ref("expr").unwrap(),
            ]),
            Node::Sequence(vec![
                b.rule_ref("term").unwrap(),
                token("-"),
                Node::Cut,
                b.rule_ref("expr").unwrap(),
            ]),
            b.rule_ref("term").unwrap(),
        ]),
    );
    b.define(
        term,
        Node::Choice(vec![
            Node::Sequence(vec![
                b.rule_ref("factor").unwrap(),
                token("*"),
                Node::Cut,
                b.rule_ref("term").unwrap(),
            ]),
            Node::Sequence(vec![
                b.rule_ref("factor").unwrap(),
                token("/"),
                Node::Cut,
                b.rule_ref("term").unwrap(),
            ]),
            b.rule_ref("factor").unwrap(),
        ]),
    );
    b.define(
        factor,
        Node::Choice(vec![
            Node::Sequence(vec![
                token("("),
                Node::Cut,
                b.rule_ref("expr").unwrap(),
                token(")"),
            ]),
            pattern(r"\d+"),
        ]),
    );
    b.define(start, Node::Sequence(vec![b.rule_ref("expr").unwrap(), Node::Eof]));
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let value = model
        .parse("3 + 5 * ( 10 - 20 )", ParseConfig::new())
        .expect("well-formed arithmetic expression should parse");

    let mut tokens = Vec::new();
    flatten_tokens(&value, &mut tokens);
    assert_eq!(
        tokens,
        vec!["3", "+", "5", "*", "(", "10", "-", "20", ")"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

/// Scenario 2 — direct left recursion, seed-and-grow.
#[test]
fn direct_left_recursion_grows_to_consume_whole_input() {
    let mut b = Builder::new("leftrec");
    let expr = b.rule("expr");
    let num = b.rule("num");
    let start = b.rule("start");

    b.define(
        expr,
        Node::Choice(vec![
            Node::Sequence(vec![b.rule_ref("expr").unwrap(), token("+"), b.rule_ref("num").unwrap()]),
            Node::Sequence(vec![b.rule_ref("expr").unwrap(), token("*"), b.rule_ref("num").unwrap()]),
            b.rule_ref("num").unwrap(),
        ]),
    );
    b.define(num, pattern(r"[0-9]+"));
    b.define(start, Node::Sequence(vec![b.rule_ref("expr").unwrap(), Node::Eof]));
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let value = model
        .parse("1*2+3*5", ParseConfig::new())
        .expect("left-recursive expr grammar should accept 1*2+3*5");

    let mut tokens = Vec::new();
    flatten_tokens(&value, &mut tokens);
    assert_eq!(
        tokens,
        vec!["1", "*", "2", "+", "3", "*", "5"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );

    // Disabling left recursion turns the same grammar into an immediate,
    // non-looping failure rather than a silent wrong answer.
    let model_no_lr = &model;
    let err = model_no_lr
        .parse_rule("1*2+3*5", None, ParseConfig::new().no_left_recursion())
        .expect_err("left recursion must be rejected when disabled, not looped forever");
    assert!(matches!(err, Error::Parse(_)));
}

/// Scenario 3 — a keyword guard via an override capture and `check_name`.
#[test]
fn keyword_guard_rejects_reserved_identifier() {
    let mut b = Builder::new("keywords");
    let id = b.rule("id");
    let start = b.rule("start");
    b.define(
        id,
        Node::Sequence(vec![
            Node::Override {
                body: Box::new(pattern(r"\w+")),
                force_list: false,
            },
            Node::CheckName,
        ]),
    );
    b.define(
        start,
        Node::Sequence(vec![
            Node::PositiveClosure(Box::new(b.rule_ref("id").unwrap())),
            Node::Eof,
        ]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);
    let config = ParseConfig::new().keywords(["A"]);

    let value = model
        .parse("hello world", config.clone())
        .expect("two non-reserved words should parse");
    assert_eq!(
        value,
        Value::List(vec![Value::Token("hello".into()), Value::Token("world".into())])
    );

    let err = model
        .parse("hello A world", config)
        .expect_err("a reserved word in the stream must fail the parse");
    match err {
        Error::Parse(parse_err) => {
            assert!(matches!(
                parse_err.kind,
                ErrorKind::ReservedWord { ref word } if word == "A"
            ));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

/// Scenario 4 — cut prunes the remaining alternatives of its own choice.
#[test]
fn cut_bypasses_sibling_alternative_on_failure() {
    let mut b = Builder::new("cutprune");
    let start = b.rule("start");
    b.define(
        start,
        Node::Choice(vec![
            Node::Sequence(vec![token("a"), Node::Cut, token("b")]),
            Node::Sequence(vec![token("a"), token("c")]),
        ]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let err = model
        .parse_rule("ac", None, ParseConfig::new())
        .expect_err("cut after 'a' must prevent the 'a' 'c' alternative from ever running");
    match err {
        Error::Parse(parse_err) => {
            assert!(matches!(
                parse_err.kind,
                ErrorKind::ExpectedToken { ref literal } if literal == "b"
            ));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

/// Scenario 5 — positive lookahead never consumes input.
#[test]
fn positive_lookahead_restores_position() {
    let mut b = Builder::new("lookahead");
    let start = b.rule("start");
    b.define(
        start,
        Node::Sequence(vec![
            Node::Lookahead(Box::new(token("a"))),
            token("a"),
            token("b"),
            Node::Eof,
        ]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    // If `&'a'` had failed to restore position, the following `'a'`
    // would be matched against `"b"` and the whole parse would fail.
    model
        .parse_rule("ab", None, ParseConfig::new())
        .expect("lookahead must not consume the 'a' it peeked at");
}

/// Scenario 6 — an optional second write promotes a scalar capture to a
/// list, matching `grako/ast.py`'s `AST._add`.
#[test]
fn optional_named_capture_promotes_to_list_on_second_write() {
    let mut b = Builder::new("optcapture");
    let start = b.rule("start");
    b.define(
        start,
        Node::Sequence(vec![
            Node::Named {
                name: "n".into(),
                body: Box::new(token("x")),
                force_list: false,
            },
            Node::Optional(Box::new(Node::Named {
                name: "n".into(),
                body: Box::new(token("y")),
                force_list: false,
            })),
            Node::Eof,
        ]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let both = model.parse_rule("xy", None, ParseConfig::new()).unwrap();
    match both {
        Value::Map(ast) => assert_eq!(
            ast.get("n"),
            Some(&Value::List(vec![Value::Token("x".into()), Value::Token("y".into())]))
        ),
        other => panic!("expected an AST map, got {other:?}"),
    }

    let one = model.parse_rule("x", None, ParseConfig::new()).unwrap();
    match one {
        Value::Map(ast) => assert_eq!(ast.get("n"), Some(&Value::Token("x".into()))),
        other => panic!("expected an AST map, got {other:?}"),
    }
}

/// Determinism (spec §8 universal invariant): identical input parsed
/// twice against the same grammar/config produces structurally equal
/// values.
#[test]
fn identical_parses_are_deterministic() {
    let mut b = Builder::new("determinism");
    let start = b.rule("start");
    b.define(
        start,
        Node::Sequence(vec![Node::PositiveClosure(Box::new(pattern(r"[a-z]+"))), Node::Eof]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let first = model.parse_rule("abc def", None, ParseConfig::new()).unwrap();
    let second = model.parse_rule("abc def", None, ParseConfig::new()).unwrap();
    assert_eq!(first, second);
}

/// Name-guard safety (spec §8 universal invariant): a keyword literal
/// does not match the prefix of a longer identifier.
#[test]
fn name_guard_rejects_identifier_prefix_match() {
    let mut b = Builder::new("nameguard");
    let start = b.rule("start");
    b.define(start, Node::Sequence(vec![token("if"), Node::Eof]));
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    assert!(model.parse_rule("ifelse", None, ParseConfig::new()).is_err());
    assert!(model.parse_rule("if", None, ParseConfig::new()).is_ok());
}

/// `parseinfo` (spec §6) tags a rule's AST map with its source span.
#[test]
fn parseinfo_attaches_rule_span_to_ast_maps() {
    use pretty_assertions::assert_eq;

    let mut b = Builder::new("parseinfo");
    let start = b.rule("start");
    b.define(
        start,
        Node::Sequence(vec![
            Node::Named {
                name: "n".into(),
                body: Box::new(token("x")),
                force_list: false,
            },
            Node::Eof,
        ]),
    );
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let value = model
        .parse_rule("x", None, ParseConfig::new().parseinfo(true))
        .unwrap();
    match value {
        Value::Map(ast) => {
            let info = ast.get("parseinfo").expect("parseinfo key must be present");
            match info {
                Value::Map(info) => {
                    assert_eq!(info.get("rule"), Some(&Value::Token("start".into())));
                    assert_eq!(info.get("pos"), Some(&Value::Token("0".into())));
                    assert_eq!(info.get("endpos"), Some(&Value::Token("1".into())));
                }
                other => panic!("expected parseinfo to be a map, got {other:?}"),
            }
        }
        other => panic!("expected an AST map, got {other:?}"),
    }
}

/// `trace` (spec §6) only gates whether rule entry is logged; it must
/// never change what the parse accepts or produces.
#[test]
fn trace_enabled_does_not_change_parse_outcome() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut b = Builder::new("trace");
    let start = b.rule("start");
    b.define(start, Node::Sequence(vec![token("x"), Node::Eof]));
    let grammar = b.build().unwrap();
    let model = GrammarModel::new(grammar);

    let traced = model.parse_rule("x", None, ParseConfig::new().trace(true)).unwrap();
    let untraced = model.parse_rule("x", None, ParseConfig::new()).unwrap();
    assert_eq!(traced, untraced);
}
