//! The parse configuration surface (spec §4.7/§6): a chained builder in
//! the style of `apollo_parser::Parser::new(..).recursion_limit(..)`,
//! collecting every option a grammar-independent parse run can be tuned
//! with before [`crate::GrammarModel::parse`] consumes it.

use crate::scanner::Whitespace;
use regex::Regex;

const DEFAULT_RECURSION_LIMIT: usize = 2_000;

/// Options governing a single [`crate::GrammarModel::parse`] call:
/// whitespace/comment skipping, name-guarding, case sensitivity, the
/// keyword set `check_name` rejects, and the ambient ["recursion
/// limit"](LimitTracker) this crate carries regardless of spec §9's
/// Non-goals (every production parser in this lineage has one).
#[derive(Debug, Clone)]
pub struct ParseConfig {
    pub whitespace: Whitespace,
    pub comments: Option<Regex>,
    pub eol_comments: Option<Regex>,
    pub nameguard: bool,
    pub ignorecase: bool,
    pub tabwidth: Option<usize>,
    pub namechars: String,
    pub keywords: Vec<String>,
    pub left_recursion: bool,
    /// Whether a rule result reached from inside a positive lookahead may
    /// be committed to the packrat cache (spec §4.4 step 5: "except ...
    /// inside a positive lookahead where memoization is configurable").
    pub memoize_lookaheads: bool,
    /// When set, every rule's [`crate::value::Value::Map`] result gains
    /// `buffer`/`rule`/`pos`/`endpos`/`line`/`endline` entries (spec §6).
    pub parseinfo: bool,
    pub recursion_limit: usize,
    pub trace: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            whitespace: Whitespace::Default,
            comments: None,
            eol_comments: None,
            nameguard: true,
            ignorecase: false,
            tabwidth: None,
            namechars: String::new(),
            keywords: Vec::new(),
            left_recursion: true,
            memoize_lookaheads: true,
            parseinfo: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            trace: false,
        }
    }
}

impl ParseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn whitespace(mut self, whitespace: Whitespace) -> Self {
        self.whitespace = whitespace;
        self
    }

    /// Disable whitespace skipping entirely — every code point is
    /// significant (spec §4.1's `whitespace = None`).
    pub fn no_whitespace_skipping(mut self) -> Self {
        self.whitespace = Whitespace::None;
        self
    }

    pub fn comments(mut self, pattern: &str) -> Self {
        self.comments = Regex::new(pattern).ok();
        self
    }

    pub fn eol_comments(mut self, pattern: &str) -> Self {
        self.eol_comments = Regex::new(pattern).ok();
        self
    }

    pub fn nameguard(mut self, enabled: bool) -> Self {
        self.nameguard = enabled;
        self
    }

    pub fn ignorecase(mut self, enabled: bool) -> Self {
        self.ignorecase = enabled;
        self
    }

    pub fn tabwidth(mut self, width: usize) -> Self {
        self.tabwidth = Some(width);
        self
    }

    pub fn namechars(mut self, chars: impl Into<String>) -> Self {
        self.namechars = chars.into();
        self
    }

    pub fn keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Disable the seed-and-grow left-recursion strategy; a left-recursive
    /// rule then fails outright the way a naive packrat parser would.
    pub fn no_left_recursion(mut self) -> Self {
        self.left_recursion = false;
        self
    }

    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Disable caching packrat results reached from inside a positive
    /// lookahead. A lookahead already discards its AST/CST frame and
    /// rewinds the scanner on every exit, so the only effect of disabling
    /// this is memory: a grammar that probes the same rule repeatedly from
    /// inside `&rule` re-parses it each time instead of hitting the cache.
    pub fn no_memoize_lookaheads(mut self) -> Self {
        self.memoize_lookaheads = false;
        self
    }

    /// Attach `buffer`/`rule`/`pos`/`endpos`/`line`/`endline` to every
    /// rule's AST-map result (spec §6 `parseinfo`).
    pub fn parseinfo(mut self, enabled: bool) -> Self {
        self.parseinfo = enabled;
        self
    }

    /// Emit a `log::trace!` line per rule entry/exit (spec §4.9).
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains_override_defaults() {
        let cfg = ParseConfig::new()
            .nameguard(false)
            .recursion_limit(50)
            .keywords(["if", "else"]);
        assert!(!cfg.nameguard);
        assert_eq!(cfg.recursion_limit, 50);
        assert_eq!(cfg.keywords, vec!["if".to_string(), "else".to_string()]);
    }

    #[test]
    fn no_whitespace_skipping_sets_none_variant() {
        let cfg = ParseConfig::new().no_whitespace_skipping();
        assert!(matches!(cfg.whitespace, Whitespace::None));
    }
}
