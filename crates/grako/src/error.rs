//! Error taxonomy (spec §7) and the internal control-flow signals a
//! combinator tree threads during a single rule's evaluation.
//!
//! Grounded on `apollo_parser::Error` / `apollo-compiler`'s error types: one
//! `thiserror`-derived enum, one variant per failure cause, each carrying
//! enough to render a [`crate::diagnostics::Diagnostic`] without re-deriving
//! position information after the fact.

use thiserror::Error;

/// A failure raised while parsing, carrying everything spec §7's last
/// paragraph requires for rendering: the offending position, the rule stack
/// active at that point, and a cause-specific message.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ErrorKind,
    /// Code-point offset of the failure.
    pub pos: usize,
    /// Innermost-first stack of rule names active when the failure fired.
    pub rule_stack: Vec<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, pos: usize, rule_stack: Vec<String>) -> Self {
        Self {
            kind,
            pos,
            rule_stack,
        }
    }

    /// Farthest-failure comparison (spec §7 propagation policy): prefer the
    /// error that reached further into the input.
    pub fn is_farther_than(&self, other: &ParseError) -> bool {
        self.pos > other.pos
    }
}

/// Cause of a [`ParseError`], one variant per row of spec §7's taxonomy
/// table (excluding the two rows — left-recursion sentinel, hard failure —
/// that are pure control flow and never escape as a caller-visible error).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ErrorKind {
    #[error("expected {literal:?}")]
    ExpectedToken { literal: String },
    #[error("expected match for /{pattern}/")]
    ExpectedPattern { pattern: String },
    #[error("unknown rule {name:?}")]
    UnknownRule { name: String },
    #[error("closure body matched the empty string")]
    EmptyClosure,
    #[error("{word:?} is a reserved word")]
    ReservedWord { word: String },
    #[error("semantic action failed: {message}")]
    Semantic { message: String },
    #[error("expecting end of text")]
    ExpectedEof,
    #[error("expecting one of: {}", .alternatives.join(", "))]
    ExpectedOneOf { alternatives: Vec<String> },
    #[error("{message}")]
    Other { message: String },
}

/// Errors raised while *building* a grammar model rather than while
/// parsing with one (spec §7's "grammar error" row: "detected at
/// grammar-model construction ... never at parse time").
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GrammarError {
    #[error("rule {name:?} is referenced but never defined")]
    UndefinedRule { name: String },
    #[error("rule {name:?} is defined more than once")]
    DuplicateRule { name: String },
    #[error("rule {name:?}'s body can match the empty string inside a closure")]
    PossiblyEmptyClosure { name: String },
    #[error("invalid regular expression in rule {rule:?}: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Internal control transfer threaded through [`crate::context::ParseContext`]
/// combinators within a single rule body. Design Notes ("Control-flow
/// signals") call for modelling Grako's exception-based `SoftFail`/
/// `HardFail`/`OptionDone` as result variants; `OptionDone` needs no
/// variant here because a successful `Ok` already short-circuits a Rust
/// `choice` loop without an extra signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// An ordinary, backtrackable failure: the nearest enclosing
    /// `choice`/`optional`/`closure` may try the next alternative.
    SoftFail(ParseError),
    /// A failure committed by a prior cut (`~`) in the same choice frame:
    /// bypasses the remaining alternatives of that choice.
    HardFail(ParseError),
}

impl Signal {
    pub fn error(&self) -> &ParseError {
        match self {
            Signal::SoftFail(e) | Signal::HardFail(e) => e,
        }
    }

    pub fn into_error(self) -> ParseError {
        match self {
            Signal::SoftFail(e) | Signal::HardFail(e) => e,
        }
    }

    pub fn into_hard(self) -> Signal {
        Signal::HardFail(self.into_error())
    }
}

pub type PResult<T> = Result<T, Signal>;

/// The crate's public, caller-facing error type: everything internal to a
/// parse attempt (signals, grammar-construction errors) converts into this
/// before crossing the [`crate::GrammarModel::parse`] boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}
