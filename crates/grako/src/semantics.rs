//! The semantics bridge (spec §4.5): a trait embedders implement to turn
//! raw [`Value`] results into their own domain types, one method dispatch
//! per completed rule.

use crate::value::Value;

/// Dispatched once per rule after it successfully parses, with the raw
/// [`Value`] the engine produced (the rule's CST/AST, already squashed or
/// overridden per spec §4.3). Returning `Err` aborts the parse with
/// [`crate::error::ErrorKind::Semantic`] at the position the rule started.
///
/// Implementations only need to override [`Semantics::dispatch`] for the
/// rules they care about and fall through to the default identity pass for
/// everything else.
pub trait Semantics {
    /// `rule_name` is the sanitized rule name (spec §3's `sanitize_name`),
    /// matching the name a grammar-source method-name convention would use.
    fn dispatch(&mut self, rule_name: &str, value: Value) -> Result<Value, String> {
        let _ = rule_name;
        Ok(value)
    }
}

/// The default bridge: every rule's raw value passes through unchanged.
/// Used whenever a parse is driven without an explicit [`Semantics`]
/// implementation.
#[derive(Debug, Default)]
pub struct NoopSemantics;

impl Semantics for NoopSemantics {}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseTokens;

    impl Semantics for UppercaseTokens {
        fn dispatch(&mut self, _rule_name: &str, value: Value) -> Result<Value, String> {
            match value {
                Value::Token(s) => Ok(Value::Token(s.to_uppercase())),
                other => Ok(other),
            }
        }
    }

    #[test]
    fn noop_semantics_passes_values_through() {
        let mut s = NoopSemantics;
        let v = Value::Token("x".into());
        assert_eq!(s.dispatch("anything", v.clone()).unwrap(), v);
    }

    #[test]
    fn custom_semantics_can_transform_values() {
        let mut s = UppercaseTokens;
        let v = s.dispatch("word", Value::Token("hi".into())).unwrap();
        assert_eq!(v, Value::Token("HI".into()));
    }
}
