//! The result type produced by a parse, and the ordered capture map
//! ("AST frame") rules accumulate named elements into.
//!
//! Grounded on `grako/ast.py`'s `AST(dict)`: an insertion-ordered mapping
//! where a second write to an existing scalar key silently promotes it to a
//! list, and a write under the reserved key `"@"` marks the whole frame for
//! override. `indexmap::IndexMap` gives us the insertion order for free
//! instead of the hand-rolled `_order` list the Python class carries.

use indexmap::IndexMap;
use std::fmt;

/// The reserved key that triggers AST override: when present in a rule's
/// capture frame, its value is returned from the rule in place of the frame.
pub const OVERRIDE_KEY: &str = "@";

/// Names an AST frame may not use as capture names without being rewritten,
/// because the engine itself would otherwise read them back as state.
const RESERVED_NAMES: &[&str] = &["parseinfo", "buffer", "line", "endline", "pos", "endpos"];

/// A value produced by a parse: a matched span of text, the absence of a
/// value, an ordered list (closures, joins, CST groups), or a named capture
/// map (a rule's AST frame once it resolves to something other than override
/// or bare CST).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value was captured (e.g. a declared-but-unmatched named capture).
    Null,
    /// A span of source text matched by a token or pattern.
    Token(String),
    /// An ordered sequence: closures, positive closures, joins, and explicit
    /// groups all produce this, as does the squashed CST of a rule with more
    /// than one unnamed element.
    List(Vec<Value>),
    /// A named-capture map, i.e. an AST frame.
    Map(Ast),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Collapse a CST-style list the way `grako` does when building a rule's
    /// result: a single element stands for itself, zero or many stay a list.
    pub fn squash(mut items: Vec<Value>) -> Value {
        if items.len() == 1 {
            items.pop().unwrap()
        } else {
            Value::List(items)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Token(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(ast) => write!(f, "{ast}"),
        }
    }
}

/// An insertion-ordered capture map built up over the lifetime of a single
/// rule (or sub-)frame. Mirrors `grako/ast.py::AST._define`/`_add`/`_append`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    entries: IndexMap<String, Value>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// `AST._add`: set `key` to `value`. A first write stores a scalar
    /// unless `force_list`, in which case it always becomes a one-element
    /// list. A second write to a scalar promotes it to a two-element list;
    /// further writes append.
    pub fn add(&mut self, key: &str, value: Value, force_list: bool) {
        match self.entries.get_mut(key) {
            None => {
                let stored = if force_list {
                    Value::List(vec![value])
                } else {
                    value
                };
                self.entries.insert(key.to_string(), stored);
            }
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let previous = std::mem::replace(existing, Value::Null);
                *existing = Value::List(vec![previous, value]);
            }
        }
    }

    /// `AST._append`: always-list form of [`Ast::add`].
    pub fn append(&mut self, key: &str, value: Value) {
        self.add(key, value, true);
    }

    /// `AST._define`: pre-declare keys so that a rule's capture set is
    /// stable even when a particular alternative never wrote to them —
    /// list-captures default to `[]`, scalar captures default to `Null`.
    pub fn define(&mut self, scalar_keys: &[String], list_keys: &[String]) {
        for key in list_keys {
            self.entries
                .entry(key.clone())
                .or_insert_with(|| Value::List(Vec::new()));
        }
        for key in scalar_keys {
            self.entries.entry(key.clone()).or_insert(Value::Null);
        }
    }

    /// Rewrite a requested capture name so it can never collide with an
    /// engine-reserved attribute, suffixing `_` until it is safe. Applied to
    /// every `Named`/`Override` capture name and to semantic-method lookups.
    pub fn sanitize_name(name: &str) -> String {
        let mut candidate = name.to_string();
        while RESERVED_NAMES.contains(&candidate.as_str()) {
            candidate.push('_');
        }
        candidate
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_promotes_to_list_on_second_write() {
        let mut ast = Ast::new();
        ast.add("n", Value::Token("x".into()), false);
        assert_eq!(ast.get("n"), Some(&Value::Token("x".into())));
        ast.add("n", Value::Token("y".into()), false);
        assert_eq!(
            ast.get("n"),
            Some(&Value::List(vec![
                Value::Token("x".into()),
                Value::Token("y".into())
            ]))
        );
    }

    #[test]
    fn append_always_lists() {
        let mut ast = Ast::new();
        ast.append("n", Value::Token("x".into()));
        assert_eq!(ast.get("n"), Some(&Value::List(vec![Value::Token("x".into())])));
    }

    #[test]
    fn define_fills_defaults_without_clobbering() {
        let mut ast = Ast::new();
        ast.add("seen", Value::Token("z".into()), false);
        ast.define(
            &["seen".to_string(), "missing".to_string()],
            &["items".to_string()],
        );
        assert_eq!(ast.get("seen"), Some(&Value::Token("z".into())));
        assert_eq!(ast.get("missing"), Some(&Value::Null));
        assert_eq!(ast.get("items"), Some(&Value::List(vec![])));
    }

    #[test]
    fn sanitize_name_suffixes_reserved_words() {
        assert_eq!(Ast::sanitize_name("line"), "line_");
        assert_eq!(Ast::sanitize_name("widget"), "widget");
    }
}
