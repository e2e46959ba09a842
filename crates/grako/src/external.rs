//! Narrow seams for the collaborators spec §9 explicitly places out of
//! scope: a bootstrap/grammar-surface parser, code emission, grammar
//! diagramming, model (de)serialization ("pickling"), a CLI/file-I/O
//! front end, and colourised trace output. This crate implements none of
//! them; it only commits to the trait/function shape an embedder would
//! plug one in at, so the engine itself never has to know which (if any)
//! exists.

use crate::error::GrammarError;
use crate::grammar::Grammar;

/// Produces a [`Grammar`] from some textual grammar notation. The
/// notation itself — EBNF-like grammar-surface syntax, a bootstrap
/// self-hosted grammar, or anything else — is entirely the implementor's
/// concern; this crate only consumes the resulting model (normally built
/// directly with [`crate::grammar::Builder`] instead).
pub trait GrammarSource {
    fn compile(&self, source: &str) -> Result<Grammar, GrammarError>;
}

/// Serializes a [`Grammar`] to some external representation (spec §9's
/// "pickling"/model persistence). Left unimplemented by this crate: a
/// [`Grammar`] is already `Clone + Debug` and cheap to reconstruct from a
/// [`crate::grammar::Builder`] call, which covers this crate's own needs.
pub trait GrammarCodec {
    type Error;
    fn encode(&self, grammar: &Grammar) -> Result<Vec<u8>, Self::Error>;
    fn decode(&self, bytes: &[u8]) -> Result<Grammar, Self::Error>;
}

/// Emits generated target-language parser code from a [`Grammar`] (spec
/// §9's code-generation Non-goal). A pure function signature so an
/// embedder's code generator can be swapped without this crate knowing
/// anything about the target language.
pub trait CodeEmitter {
    fn emit(&self, grammar: &Grammar) -> String;
}

/// Renders a [`Grammar`] as a railroad/syntax diagram (spec §9's
/// diagramming Non-goal), e.g. to Graphviz `dot` or an SVG.
pub trait GrammarDiagram {
    fn render(&self, grammar: &Grammar) -> String;
}
