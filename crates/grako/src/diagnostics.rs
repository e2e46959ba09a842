//! Human-readable error rendering (spec §4.8), built on `ariadne` the way
//! `apollo-compiler`'s diagnostic layer renders parser/validation errors:
//! a `Report` anchored at a byte span over a `Source`, with one primary
//! label and, where available, an "expecting one of ..." hint.

use crate::error::{ErrorKind, ParseError};
use crate::grammar::{FirstItem, FirstSet};
use ariadne::{Label, Report, ReportKind, Source};

/// A rendering-ready view of a [`ParseError`]: everything
/// [`Diagnostic::render`] needs, computed once so repeated renders don't
/// re-walk the rule stack or re-derive the byte offset.
pub struct Diagnostic<'a> {
    error: &'a ParseError,
    filename: String,
    byte_offset: usize,
}

impl<'a> Diagnostic<'a> {
    pub fn new(error: &'a ParseError, filename: impl Into<String>, byte_offset: usize) -> Self {
        Self {
            error,
            filename: filename.into(),
            byte_offset,
        }
    }

    /// Augment an [`ErrorKind::ExpectedOneOf`]-shaped message with a
    /// computed FIRST set, as spec §4.8 calls for at choice failures.
    pub fn expecting_label(first: &FirstSet) -> String {
        if first.items.is_empty() {
            return "expecting more input".to_string();
        }
        let mut names: Vec<String> = first.items.iter().map(FirstItem::to_string).collect();
        names.sort();
        format!("expecting one of: {}", names.join(", "))
    }

    /// Render this error as plain text through `ariadne`, suitable for a
    /// terminal or captured into a string for a test assertion.
    pub fn render(&self, source_text: &str) -> String {
        let mut out = Vec::new();
        let span = self.byte_offset..self.byte_offset.max(1).min(source_text.len().max(1));
        let report = Report::build(ReportKind::Error, (self.filename.clone(), span.clone()))
            .with_message(self.error.kind.to_string())
            .with_label(
                Label::new((self.filename.clone(), span))
                    .with_message(label_message(&self.error.kind)),
            )
            .with_note(rule_stack_note(&self.error.rule_stack))
            .finish();
        report
            .write((self.filename.clone(), Source::from(source_text)), &mut out)
            .expect("ariadne report writes to an in-memory buffer");
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn label_message(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::ExpectedToken { literal } => format!("expected {literal:?} here"),
        ErrorKind::ExpectedPattern { pattern } => format!("no match for /{pattern}/ here"),
        ErrorKind::ExpectedOneOf { alternatives } => {
            format!("expected one of: {}", alternatives.join(", "))
        }
        other => other.to_string(),
    }
}

fn rule_stack_note(rule_stack: &[String]) -> String {
    if rule_stack.is_empty() {
        "while parsing the grammar's start rule".to_string()
    } else {
        format!("while parsing: {}", rule_stack.join(" > "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn renders_without_panicking_on_simple_error() {
        let err = ParseError::new(
            ErrorKind::ExpectedToken {
                literal: "+".into(),
            },
            3,
            vec!["expr".into()],
        );
        let diag = Diagnostic::new(&err, "test.grako", 3);
        let rendered = diag.render("1 + 2");
        assert!(rendered.contains("expected"));
    }

    #[test]
    fn expecting_label_lists_sorted_alternatives() {
        let mut first = FirstSet::default();
        first.items.insert(FirstItem::Literal("+".into()));
        first.items.insert(FirstItem::Literal("-".into()));
        let label = Diagnostic::expecting_label(&first);
        assert_eq!(label, "expecting one of: \"+\", \"-\"");
    }
}
