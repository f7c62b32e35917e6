//! Error types and diagnostics.
//!
//! Two families: [`GrammarError`], fatal at resolution time and never
//! recovered from, and the match-time failures carried by [`ParseError`].
//! Both implement [`miette::Diagnostic`] so callers get source-anchored,
//! caret-style reports: grammar errors render the offending rule's own
//! text, parse errors render the input with the stall point labeled.

use std::fmt;

use miette::{Diagnostic, LabeledSpan, SourceCode, SourceSpan};
use thiserror::Error;

use crate::matcher::MatchNode;
use crate::reader::Cursor;

// ============================================================================
// GRAMMAR ERRORS
// ============================================================================

/// A defect in the grammar itself, detected during resolution. Grammar
/// construction aborts on the first of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("reference to undefined rule '{symbol}' in rule '{referenced_in}'")]
    UndefinedRule {
        symbol: String,
        referenced_in: String,
        /// The referencing rule, rendered as grammar text.
        definition: String,
    },

    #[error("duplicate label '{label}' in rule '{rule}'")]
    DuplicateLabel {
        rule: String,
        label: String,
        definition: String,
    },

    #[error("rule '{symbol}' is defined more than once")]
    DuplicateRule { symbol: String },

    #[error("grammar defines no rules")]
    EmptyGrammar,
}

impl GrammarError {
    pub(crate) fn undefined_rule(symbol: String, referenced_in: String, definition: String) -> Self {
        Self::UndefinedRule {
            symbol,
            referenced_in,
            definition,
        }
    }

    pub(crate) fn duplicate_label(rule: String, label: String, definition: String) -> Self {
        Self::DuplicateLabel {
            rule,
            label,
            definition,
        }
    }
}

impl Diagnostic for GrammarError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            Self::UndefinedRule { .. } => "descent::grammar::undefined_rule",
            Self::DuplicateLabel { .. } => "descent::grammar::duplicate_label",
            Self::DuplicateRule { .. } => "descent::grammar::duplicate_rule",
            Self::EmptyGrammar => "descent::grammar::empty_grammar",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help: String = match self {
            Self::UndefinedRule { symbol, .. } => {
                format!("define '{symbol}' somewhere in the grammar, or fix the reference")
            }
            Self::DuplicateLabel { .. } => {
                "labels must be unique within one rule's tree; rename one occurrence".into()
            }
            Self::DuplicateRule { .. } => "merge the definitions, or rename one of them".into(),
            Self::EmptyGrammar => "a grammar needs at least one rule to parse anything".into(),
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            Self::UndefinedRule { definition, .. } | Self::DuplicateLabel { definition, .. } => {
                Some(definition)
            }
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Self::UndefinedRule {
                symbol, definition, ..
            } => {
                // Search past the arrow so the rule's own name is not the hit.
                let body_start = definition.find("<-").map(|i| i + 2).unwrap_or(0);
                let offset = definition[body_start..]
                    .find(symbol.as_str())
                    .map(|i| body_start + i)?;
                let span = SourceSpan::from(offset..offset + symbol.len());
                let label =
                    LabeledSpan::new_with_span(Some("not defined anywhere".to_string()), span);
                Some(Box::new(std::iter::once(label)))
            }
            Self::DuplicateLabel {
                label, definition, ..
            } => {
                let needle = format!("{label}:");
                let (offset, _) = definition.match_indices(&needle).nth(1)?;
                let span = SourceSpan::from(offset..offset + label.len());
                let labeled =
                    LabeledSpan::new_with_span(Some("label reused here".to_string()), span);
                Some(Box::new(std::iter::once(labeled)))
            }
            _ => None,
        }
    }
}

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// Why a parse attempt produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// No rule recognized any prefix of the input; no branch of any
    /// top-level attempt ever advanced the cursor.
    #[error("no rule matched any prefix of the input")]
    NothingMatches { cursor: Cursor },

    /// Some rule matched a prefix but could not complete. Carries the
    /// failing attempt that reached farthest, as a partial tree.
    #[error("a rule matched part of the input but could not complete")]
    IncompleteParse { node: MatchNode },
}

impl ParseError {
    pub(crate) fn nothing_matches(cursor: Cursor) -> Self {
        Self::NothingMatches { cursor }
    }

    pub(crate) fn incomplete_parse(node: MatchNode) -> Self {
        Self::IncompleteParse { node }
    }

    /// The partial tree behind an incomplete parse, for callers that want
    /// to inspect how far matching got.
    pub fn partial_node(&self) -> Option<&MatchNode> {
        match self {
            Self::IncompleteParse { node } => Some(node),
            _ => None,
        }
    }
}

impl Diagnostic for ParseError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Self::Grammar(inner) => inner.code(),
            Self::NothingMatches { .. } => Some(Box::new("descent::parse::nothing_matches")),
            Self::IncompleteParse { .. } => Some(Box::new("descent::parse::incomplete_parse")),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Self::Grammar(inner) => inner.help(),
            Self::NothingMatches { .. } => Some(Box::new(
                "none of the grammar's rules recognize the start of this input",
            )),
            Self::IncompleteParse { node } => Some(Box::new(format!(
                "matching stalled at '{}'",
                node.failure_path().join(".")
            ))),
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            Self::Grammar(inner) => inner.source_code(),
            Self::NothingMatches { cursor } => Some(cursor.source().as_ref()),
            Self::IncompleteParse { node } => Some(node.remaining.source().as_ref()),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Self::Grammar(inner) => inner.labels(),
            Self::NothingMatches { cursor } => {
                let (span, _) = cursor.read(1);
                let label = LabeledSpan::new_with_span(
                    Some("no rule matches here".to_string()),
                    span.to_source_span(),
                );
                Some(Box::new(std::iter::once(label)))
            }
            Self::IncompleteParse { node } => {
                let mut labels = Vec::new();

                let (next, _) = node.remaining.read(1);
                let stall_text = if next.is_empty() {
                    "input ended here"
                } else {
                    "matching stopped here"
                };
                labels.push(LabeledSpan::new_with_span(
                    Some(stall_text.to_string()),
                    next.to_source_span(),
                ));

                if let Some(extent) = node.combined_span() {
                    labels.push(LabeledSpan::new_with_span(
                        Some("matched this far".to_string()),
                        extent.to_source_span(),
                    ));
                }

                Some(Box::new(labels.into_iter()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_rule_label_points_into_the_rendered_rule() {
        let error = GrammarError::undefined_rule(
            "Missing".into(),
            "A".into(),
            "A <- (left:Missing)".into(),
        );
        let labels: Vec<_> = error.labels().unwrap().collect();
        assert_eq!(labels.len(), 1);
        let span = labels[0].inner();
        assert_eq!(span.offset(), "A <- (left:".len());
        assert_eq!(span.len(), "Missing".len());
    }

    #[test]
    fn duplicate_label_points_at_the_second_occurrence() {
        let error = GrammarError::duplicate_label(
            "A".into(),
            "x".into(),
            r#"A <- (x:"a" x:"b")"#.into(),
        );
        let labels: Vec<_> = error.labels().unwrap().collect();
        assert_eq!(labels[0].inner().offset(), r#"A <- (x:"a" "#.len());
    }

    #[test]
    fn nothing_matches_labels_the_first_character() {
        let cursor = Cursor::from_string("+1");
        let error = ParseError::nothing_matches(cursor);
        let labels: Vec<_> = error.labels().unwrap().collect();
        assert_eq!(labels[0].inner().offset(), 0);
        assert_eq!(labels[0].inner().len(), 1);
    }
}
