//! A PEG/packrat parsing engine for grammar models built from an
//! EBNF-like notation (spec §1 OVERVIEW): given a [`grammar::Grammar`]
//! (built directly through [`grammar::Builder`], or compiled from some
//! external notation via [`external::GrammarSource`]), [`GrammarModel::parse`]
//! drives ordered-choice, cut-pruned, memoized, left-recursion-capable
//! parsing over an input string and returns a [`value::Value`] tree.
//!
//! ```
//! use grako::grammar::{Builder, CompiledPattern, Node};
//! use grako::config::ParseConfig;
//!
//! let mut b = Builder::new("greeting");
//! let word = b.rule("word");
//! let start = b.rule("start");
//! b.define(word, Node::Pattern(CompiledPattern {
//!     source: "[a-zA-Z]+".into(),
//!     regex: regex::Regex::new("^[a-zA-Z]+").unwrap(),
//! }));
//! b.define(start, Node::Sequence(vec![
//!     b.rule_ref("word").unwrap(),
//!     Node::Eof,
//! ]));
//! let model = grako::GrammarModel::new(b.build().unwrap());
//! let value = model.parse("hello", ParseConfig::new()).unwrap();
//! assert_eq!(value.as_str(), Some("hello"));
//! ```

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod external;
pub mod grammar;
pub mod limit;
pub mod scanner;
pub mod semantics;
pub mod value;

use config::ParseConfig;
use context::ParseContext;
use error::{Error, ErrorKind};
use external::GrammarSource;
use grammar::{Grammar, RuleId};
use log::trace;
use scanner::Scanner;
use semantics::{NoopSemantics, Semantics};
use value::Value;

/// An immutable, compiled grammar plus the entry points to parse with it
/// (spec §3 "Lifecycle": "A single grammar model may drive any number of
/// independent, concurrent parses").
#[derive(Debug, Clone)]
pub struct GrammarModel {
    grammar: Grammar,
}

impl GrammarModel {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    /// Invoke an external grammar-surface compiler to build a model
    /// (spec §6 `compile(grammar_source, name)`). No bundled
    /// implementation ships with this crate; callers supply one via
    /// [`GrammarSource`], or build a [`Grammar`] directly with
    /// [`grammar::Builder`].
    pub fn compile_with<S: GrammarSource>(
        source: &S,
        text: &str,
        name: Option<&str>,
    ) -> Result<Self, error::GrammarError> {
        let mut grammar = source.compile(text)?;
        if let Some(name) = name {
            grammar.name = name.to_string();
        }
        Ok(Self { grammar })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parse `text` against this grammar's default (first-defined) start
    /// rule, with the identity [`NoopSemantics`] bridge and no custom
    /// user state. The common case; see [`GrammarModel::parse_rule`] and
    /// [`GrammarModel::parse_with`] for the fuller `(text, start?,
    /// filename?, semantics?, config)` surface spec §6 describes.
    pub fn parse(&self, text: &str, config: ParseConfig) -> Result<Value, Error> {
        self.parse_rule(text, None, config)
    }

    /// Parse starting from `rule_name`, or the grammar's default start
    /// rule when `None`.
    pub fn parse_rule(
        &self,
        text: &str,
        rule_name: Option<&str>,
        config: ParseConfig,
    ) -> Result<Value, Error> {
        self.parse_with::<()>(text, rule_name, config, Box::new(NoopSemantics))
    }

    /// The fully general entry point: a caller-chosen user-state type
    /// `U` (threaded through memoization keys and left-recursion
    /// bookkeeping, spec §3/§4.4) and an explicit [`Semantics`] bridge.
    pub fn parse_with<U>(
        &self,
        text: &str,
        rule_name: Option<&str>,
        config: ParseConfig,
        semantics: Box<dyn Semantics>,
    ) -> Result<Value, Error>
    where
        U: Clone + Eq + std::hash::Hash + Default,
    {
        let start = match rule_name {
            Some(name) => self
                .grammar
                .rule_by_name(name)
                .ok_or_else(|| ErrorKind::UnknownRule { name: name.to_string() }),
            None => self.grammar.start_rule().ok_or_else(|| ErrorKind::Other {
                message: "grammar defines no rules".into(),
            }),
        };
        let start: RuleId = match start {
            Ok(id) => id,
            Err(kind) => return Err(Error::Parse(error::ParseError::new(kind, 0, Vec::new()))),
        };

        let filename = "<input>";
        let scanner = Scanner::with_config(
            text,
            filename,
            config.whitespace.clone(),
            config.comments.clone(),
            config.eol_comments.clone(),
            config.nameguard,
            config.ignorecase,
            config.tabwidth,
            &config.namechars,
        );
        let trace_enabled = config.trace;
        let mut ctx: ParseContext<U> =
            ParseContext::with_semantics(&self.grammar, scanner, config, semantics);

        if trace_enabled {
            trace!("parse start: rule={:?}", self.grammar.rule(start).name);
        }

        let result = evaluator::invoke_rule(start, &mut ctx).and_then(|value| {
            ctx.check_eof()?;
            Ok(value)
        });

        match result {
            Ok(value) => Ok(value),
            Err(sig) => {
                let err = ctx.farthest.clone().unwrap_or_else(|| sig.into_error());
                Err(Error::Parse(err))
            }
        }
    }
}
