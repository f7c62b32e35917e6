//! The recursive-descent matching engine.
//!
//! [`descend`] evaluates one resolved pattern against a cursor and produces
//! a tri-state [`MatchNode`]: a full match, a diagnosable partial match, or
//! a miss. [`parse`] runs every rule of a grammar in declaration order and
//! either returns the first full, input-exhausting match or selects the
//! most informative failure (the one whose cursor advanced farthest).
//!
//! Matching is purely synchronous recursion over immutable values; the only
//! state threaded through is the cursor, and backtracking is holding an
//! earlier cursor.

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::grammar::{Grammar, Pattern, RuleId};
use crate::params::{Key, Params};
use crate::reader::{Cursor, Span};

// ============================================================================
// MATCH NODES
// ============================================================================

/// How far a pattern got against the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The pattern was fully satisfied.
    Match,
    /// Some required structure matched before matching stopped; a
    /// diagnosable near-miss.
    Partial,
    /// Nothing matched; nothing is attributable to this pattern.
    Miss,
}

/// The combinator that produced a node, for consumers that walk the tree
/// by rule symbol and for failure reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Origin {
    Rule(String),
    Literal(String),
    Sequence,
    Choice,
    ZeroOrMore,
    OneOrMore,
    Optional,
    And,
    Not,
}

/// What a node matched: nothing, a span of input, a single inner node, or
/// an ordered keyed set of child results.
///
/// In `Children`, a `None` slot records a child that was reached but missed
/// (or, for a choice, an alternative that missed or was never tried).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchValue {
    None,
    Span(Span),
    Node(Box<MatchNode>),
    Children(Params<Option<MatchNode>>),
}

/// One node of the matcher's output tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNode {
    pub status: Status,
    pub origin: Origin,
    pub value: MatchValue,
    /// The cursor after whatever this node consumed. For a miss or a
    /// lookahead this equals the cursor the node was attempted at.
    pub remaining: Cursor,
}

impl MatchNode {
    fn matched(origin: Origin, value: MatchValue, remaining: Cursor) -> Self {
        Self {
            status: Status::Match,
            origin,
            value,
            remaining,
        }
    }

    fn partial(origin: Origin, value: MatchValue, remaining: Cursor) -> Self {
        Self {
            status: Status::Partial,
            origin,
            value,
            remaining,
        }
    }

    fn miss(origin: Origin, value: MatchValue, remaining: Cursor) -> Self {
        Self {
            status: Status::Miss,
            origin,
            value,
            remaining,
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == Status::Match
    }

    pub fn is_partial(&self) -> bool {
        self.status == Status::Partial
    }

    pub fn is_miss(&self) -> bool {
        self.status == Status::Miss
    }

    /// The rule symbol this node was produced by, if it is a rule node.
    pub fn rule_symbol(&self) -> Option<&str> {
        match &self.origin {
            Origin::Rule(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Every input span inside this node's tree, in match order.
    pub fn spans(&self) -> Vec<Span> {
        let mut spans = Vec::new();
        self.collect_spans(&mut spans);
        spans
    }

    fn collect_spans(&self, spans: &mut Vec<Span>) {
        match &self.value {
            MatchValue::None => {}
            MatchValue::Span(span) => spans.push(span.clone()),
            MatchValue::Node(inner) => inner.collect_spans(spans),
            MatchValue::Children(children) => {
                for child in children.values().filter_map(Option::as_ref) {
                    child.collect_spans(spans);
                }
            }
        }
    }

    /// The exact extent of input this node's tree matched, as a single
    /// span; `None` when the tree consumed nothing.
    pub fn combined_span(&self) -> Option<Span> {
        Span::union(self.spans())
    }

    /// The chain of rule symbols and child keys leading to the point where
    /// matching stopped. Used to name the stall site in diagnostics.
    pub fn failure_path(&self) -> Vec<String> {
        let mut path = Vec::new();
        self.collect_failure_path(&mut path);
        path
    }

    fn collect_failure_path(&self, path: &mut Vec<String>) {
        if let Origin::Rule(symbol) = &self.origin {
            path.push(symbol.clone());
        }
        match &self.value {
            MatchValue::Node(inner) => inner.collect_failure_path(path),
            MatchValue::Children(children) => {
                // The stalled branch is the recorded child that reached
                // farthest into the input; earlier children win ties.
                let mut deepest: Option<(&Key, &MatchNode)> = None;
                for (key, child) in children.iter() {
                    if let Some(node) = child {
                        let farther = deepest
                            .map(|(_, best)| node.remaining.offset() > best.remaining.offset())
                            .unwrap_or(true);
                        if farther {
                            deepest = Some((key, node));
                        }
                    }
                }
                if let Some((key, node)) = deepest {
                    path.push(key.to_string());
                    node.collect_failure_path(path);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// DESCENT
// ============================================================================

/// Evaluate one pattern against the input.
///
/// An exhausted cursor is an immediate miss for any pattern; no visitor
/// ever runs without input remaining.
pub fn descend(grammar: &Grammar, pattern: &Pattern, cursor: Cursor) -> MatchNode {
    let _scope = trace::enter(grammar, pattern, &cursor);

    if cursor.is_exhausted() {
        let node = MatchNode::miss(origin_of(grammar, pattern), MatchValue::None, cursor);
        return trace::exit(node);
    }

    let node = match pattern {
        Pattern::Literal(expected) => match_literal(expected, cursor),
        Pattern::Rule(id) => match_rule_body(grammar, *id, cursor),
        Pattern::Sequence(children) => {
            match_sequence(grammar, Origin::Sequence, children, cursor)
        }
        Pattern::Choice(children) => match_choice(grammar, children, cursor),
        Pattern::ZeroOrMore(unit) => match_zero_or_more(grammar, unit, cursor),
        Pattern::OneOrMore(unit) => match_one_or_more(grammar, unit, cursor),
        Pattern::Optional(unit) => match_optional(grammar, unit, cursor),
        Pattern::And(unit) => match_and(grammar, unit, cursor),
        Pattern::Not(unit) => match_not(grammar, unit, cursor),
    };
    trace::exit(node)
}

fn origin_of(grammar: &Grammar, pattern: &Pattern) -> Origin {
    match pattern {
        Pattern::Literal(text) => Origin::Literal(text.clone()),
        Pattern::Rule(id) => Origin::Rule(grammar.rule(*id).symbol().to_string()),
        Pattern::Sequence(_) => Origin::Sequence,
        Pattern::Choice(_) => Origin::Choice,
        Pattern::ZeroOrMore(_) => Origin::ZeroOrMore,
        Pattern::OneOrMore(_) => Origin::OneOrMore,
        Pattern::Optional(_) => Origin::Optional,
        Pattern::And(_) => Origin::And,
        Pattern::Not(_) => Origin::Not,
    }
}

fn match_rule_body(grammar: &Grammar, id: RuleId, cursor: Cursor) -> MatchNode {
    let rule = grammar.rule(id);
    let origin = Origin::Rule(rule.symbol().to_string());
    let node = descend(grammar, rule.body(), cursor.clone());
    match node.status {
        Status::Match => {
            let remaining = node.remaining.clone();
            MatchNode::matched(origin, MatchValue::Node(Box::new(node)), remaining)
        }
        Status::Partial => {
            let remaining = node.remaining.clone();
            MatchNode::partial(origin, MatchValue::Node(Box::new(node)), remaining)
        }
        Status::Miss => MatchNode::miss(origin, MatchValue::None, cursor),
    }
}

fn match_literal(expected: &str, cursor: Cursor) -> MatchNode {
    let origin = Origin::Literal(expected.to_string());
    let length = expected.chars().count();
    let (span, next) = cursor.read(length);
    // A short read at end of text can never equal the expected text.
    if span.text() == expected {
        MatchNode::matched(origin, MatchValue::Span(span), next)
    } else {
        MatchNode::miss(origin, MatchValue::None, cursor)
    }
}

/// The sequence algorithm, shared by `Sequence` nodes and by every
/// combinator that wraps a sequence unit.
///
/// Children run strictly left to right against an advancing cursor. The
/// first child that fails to fully match stops the walk: a partial child is
/// recorded and keeps its progress, a missing child is recorded as `None`.
fn match_sequence(
    grammar: &Grammar,
    origin: Origin,
    children: &Params<Pattern>,
    cursor: Cursor,
) -> MatchNode {
    let mut found = Params::new();
    let mut current = cursor;
    let mut matched = 0usize;
    let mut partial = 0usize;

    for (key, child) in children.iter() {
        let node = descend(grammar, child, current.clone());
        match node.status {
            Status::Match => {
                matched += 1;
                current = node.remaining.clone();
                found.assign(key.clone(), Some(node));
            }
            Status::Partial => {
                partial += 1;
                current = node.remaining.clone();
                found.assign(key.clone(), Some(node));
                break;
            }
            Status::Miss => {
                found.assign(key.clone(), None);
                break;
            }
        }
    }

    if matched == children.len() {
        MatchNode::matched(origin, MatchValue::Children(found), current)
    } else if matched > 0 || partial > 0 {
        MatchNode::partial(origin, MatchValue::Children(found), current)
    } else {
        MatchNode::miss(origin, MatchValue::None, current)
    }
}

/// Ordered choice: the first alternative that fully matches wins and no
/// later alternative is tried. Failing that, the farthest-advancing
/// partial is reported (first declared wins ties); failing that, a miss.
fn match_choice(grammar: &Grammar, children: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let mut found = Params::new();
    let mut winner: Option<Cursor> = None;
    let mut best_partial: Option<Cursor> = None;

    for (key, alternative) in children.iter() {
        if winner.is_none() {
            let node = descend(grammar, alternative, cursor.clone());
            match node.status {
                Status::Match => {
                    winner = Some(node.remaining.clone());
                    found.assign(key.clone(), Some(node));
                    continue;
                }
                Status::Partial => {
                    let farther = best_partial
                        .as_ref()
                        .map(|best| node.remaining.offset() > best.offset())
                        .unwrap_or(true);
                    if farther {
                        best_partial = Some(node.remaining.clone());
                    }
                    found.assign(key.clone(), Some(node));
                    continue;
                }
                Status::Miss => {}
            }
        }
        found.assign(key.clone(), None);
    }

    if let Some(remaining) = winner {
        MatchNode::matched(Origin::Choice, MatchValue::Children(found), remaining)
    } else if let Some(remaining) = best_partial {
        MatchNode::partial(Origin::Choice, MatchValue::Children(found), remaining)
    } else {
        MatchNode::miss(Origin::Choice, MatchValue::None, cursor)
    }
}

/// Run the repetition unit against the advancing cursor until an attempt
/// is not a full match. The result list is full matches possibly followed
/// by one trailing partial.
///
/// A full match that consumed nothing ends the loop without being
/// recorded; repeating it could never advance, and looping on it would
/// never terminate.
fn repeat_unit(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> Vec<MatchNode> {
    let mut results = Vec::new();
    let mut current = cursor;

    while !current.is_exhausted() {
        let node = match_sequence(grammar, Origin::Sequence, unit, current.clone());
        match node.status {
            Status::Match => {
                if node.remaining.offset() == current.offset() {
                    break;
                }
                current = node.remaining.clone();
                results.push(node);
            }
            Status::Partial => {
                results.push(node);
                break;
            }
            Status::Miss => break,
        }
    }

    results
}

/// Zero or more repetitions of the unit. Always a match, possibly of zero
/// repetitions consuming nothing, with one exception: a first attempt that
/// is itself partial is preserved as a partial rather than discarded as
/// "zero matches is fine". A partial after at least one full repetition is
/// dropped and the node ends at the last full repetition.
fn match_zero_or_more(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let results = repeat_unit(grammar, unit, cursor.clone());
    let mut found = Params::new();
    let mut current = cursor;

    for (repetition, node) in results.into_iter().enumerate() {
        match node.status {
            Status::Match => {
                current = node.remaining.clone();
                found.assign(repetition, Some(node));
            }
            Status::Partial => {
                if repetition == 0 {
                    let remaining = node.remaining.clone();
                    found.assign(repetition, Some(node));
                    return MatchNode::partial(
                        Origin::ZeroOrMore,
                        MatchValue::Children(found),
                        remaining,
                    );
                }
                break;
            }
            Status::Miss => break,
        }
    }

    MatchNode::matched(Origin::ZeroOrMore, MatchValue::Children(found), current)
}

/// One or more repetitions. At least one full repetition makes the node a
/// match (a trailing partial stays recorded and the cursor rests after
/// it); a partial-only first attempt makes it partial; otherwise a miss.
fn match_one_or_more(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let results = repeat_unit(grammar, unit, cursor.clone());
    let mut found = Params::new();
    let mut matched = 0usize;
    let mut partial = 0usize;
    let mut current = cursor.clone();

    for (repetition, node) in results.into_iter().enumerate() {
        match node.status {
            Status::Match => {
                matched += 1;
                current = node.remaining.clone();
                found.assign(repetition, Some(node));
            }
            Status::Partial => {
                partial += 1;
                current = node.remaining.clone();
                found.assign(repetition, Some(node));
                break;
            }
            Status::Miss => break,
        }
    }

    if matched >= 1 {
        MatchNode::matched(Origin::OneOrMore, MatchValue::Children(found), current)
    } else if partial >= 1 {
        MatchNode::partial(Origin::OneOrMore, MatchValue::Children(found), current)
    } else {
        MatchNode::miss(Origin::OneOrMore, MatchValue::None, cursor)
    }
}

/// Attempt the unit once; an absent optional is a non-failing match of
/// nothing at the original cursor.
fn match_optional(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let node = match_sequence(grammar, Origin::Sequence, unit, cursor.clone());
    match node.status {
        Status::Match => {
            let remaining = node.remaining.clone();
            MatchNode::matched(Origin::Optional, MatchValue::Node(Box::new(node)), remaining)
        }
        Status::Partial => {
            let remaining = node.remaining.clone();
            MatchNode::partial(Origin::Optional, MatchValue::Node(Box::new(node)), remaining)
        }
        Status::Miss => MatchNode::matched(Origin::Optional, MatchValue::None, cursor),
    }
}

/// Positive lookahead: report whether the unit would match, never
/// consuming input.
fn match_and(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let node = match_sequence(grammar, Origin::Sequence, unit, cursor.clone());
    let value = MatchValue::Node(Box::new(node.clone()));
    match node.status {
        Status::Match => MatchNode::matched(Origin::And, value, cursor),
        Status::Partial => MatchNode::partial(Origin::And, value, cursor),
        Status::Miss => MatchNode::miss(Origin::And, value, cursor),
    }
}

/// Negative lookahead: a match of the unit is a miss and anything short of
/// a match is a match, never consuming input.
fn match_not(grammar: &Grammar, unit: &Params<Pattern>, cursor: Cursor) -> MatchNode {
    let node = match_sequence(grammar, Origin::Sequence, unit, cursor.clone());
    let value = MatchValue::Node(Box::new(node.clone()));
    match node.status {
        Status::Match => MatchNode::miss(Origin::Not, value, cursor),
        Status::Partial | Status::Miss => MatchNode::matched(Origin::Not, value, cursor),
    }
}

// ============================================================================
// TOP-LEVEL PARSE
// ============================================================================

/// Attempt one named rule against the input.
pub fn descend_rule(grammar: &Grammar, id: RuleId, cursor: Cursor) -> MatchNode {
    if cursor.is_exhausted() {
        let symbol = grammar.rule(id).symbol().to_string();
        return MatchNode::miss(Origin::Rule(symbol), MatchValue::None, cursor);
    }
    match_rule_body(grammar, id, cursor)
}

/// Try every rule of the grammar in declaration order; the first whose
/// result is a full match with nothing left to read is the outcome.
///
/// When no rule satisfies both conditions, the failure whose cursor
/// advanced farthest (first encountered winning ties) is selected: if even
/// it never advanced, nothing about the input was recognizable and the
/// error carries the original cursor; otherwise the error carries the
/// partial tree for diagnostics.
pub fn parse(grammar: &Grammar, cursor: Cursor) -> Result<MatchNode, ParseError> {
    let mut failures = Vec::new();

    for id in grammar.rule_ids() {
        let node = descend_rule(grammar, id, cursor.clone());
        if node.is_match() && node.remaining.is_exhausted() {
            return Ok(node);
        }
        failures.push(node);
    }

    Err(pick_failure(cursor, failures))
}

fn pick_failure(cursor: Cursor, failures: Vec<MatchNode>) -> ParseError {
    let mut best: Option<MatchNode> = None;
    for node in failures {
        let farther = best
            .as_ref()
            .map(|b| node.remaining.offset() > b.remaining.offset())
            .unwrap_or(true);
        if farther {
            best = Some(node);
        }
    }

    match best {
        Some(node) if node.remaining.offset() > 0 => ParseError::incomplete_parse(node),
        Some(node) => ParseError::nothing_matches(node.remaining),
        None => ParseError::nothing_matches(cursor),
    }
}

// ============================================================================
// DESCENT TRACING (feature = "trace")
// ============================================================================

#[cfg(feature = "trace")]
mod trace {
    use std::cell::Cell;

    use super::MatchNode;
    use crate::grammar::{Grammar, Pattern};
    use crate::reader::Cursor;

    thread_local! {
        static DEPTH: Cell<usize> = Cell::new(0);
    }

    pub struct Scope;

    impl Drop for Scope {
        fn drop(&mut self) {
            DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        }
    }

    pub fn enter(grammar: &Grammar, pattern: &Pattern, cursor: &Cursor) -> Scope {
        DEPTH.with(|depth| {
            let indent = depth.get() * 2;
            let kind = match pattern {
                Pattern::Literal(text) => format!("Literal({text:?})"),
                Pattern::Rule(id) => format!("Rule({})", grammar.rule(*id).symbol()),
                other => format!("{other:?}")
                    .split('(')
                    .next()
                    .unwrap_or("?")
                    .to_string(),
            };
            eprintln!("{:indent$}-> {kind} @ {}", "", cursor.offset());
            depth.set(depth.get() + 1);
        });
        Scope
    }

    pub fn exit(node: MatchNode) -> MatchNode {
        DEPTH.with(|depth| {
            let indent = depth.get().saturating_sub(1) * 2;
            eprintln!(
                "{:indent$}<- {:?} @ {}",
                "",
                node.status,
                node.remaining.offset()
            );
        });
        node
    }
}

#[cfg(not(feature = "trace"))]
mod trace {
    use super::MatchNode;
    use crate::grammar::{Grammar, Pattern};
    use crate::reader::Cursor;

    pub struct Scope;

    #[inline]
    pub fn enter(_grammar: &Grammar, _pattern: &Pattern, _cursor: &Cursor) -> Scope {
        Scope
    }

    #[inline]
    pub fn exit(node: MatchNode) -> MatchNode {
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, Grammar};

    fn single(body: Expr) -> Grammar {
        Grammar::resolve(vec![("Only", body)]).unwrap()
    }

    fn body(grammar: &Grammar) -> &Pattern {
        grammar.get("Only").unwrap().body()
    }

    #[test]
    fn literal_matches_exactly() {
        let grammar = single(Expr::lit("ab"));
        let node = descend(&grammar, body(&grammar), Cursor::from_string("abc"));
        assert!(node.is_match());
        assert_eq!(node.remaining.offset(), 2);
        assert_eq!(node.combined_span().unwrap().text(), "ab");
    }

    #[test]
    fn literal_misses_without_consuming() {
        let grammar = single(Expr::lit("ab"));
        let node = descend(&grammar, body(&grammar), Cursor::from_string("ax"));
        assert!(node.is_miss());
        assert_eq!(node.remaining.offset(), 0);
    }

    #[test]
    fn literal_cut_short_by_eof_is_a_miss() {
        let grammar = single(Expr::lit("abc"));
        let node = descend(&grammar, body(&grammar), Cursor::from_string("ab"));
        assert!(node.is_miss());
        assert_eq!(node.remaining.offset(), 0);
    }

    #[test]
    fn any_pattern_misses_on_an_exhausted_cursor() {
        let grammar = single(Expr::zero_or_more(vec![Expr::lit("x")]));
        let (_, exhausted) = Cursor::from_string("y").read(1);
        let node = descend(&grammar, body(&grammar), exhausted);
        assert!(node.is_miss());
    }

    #[test]
    fn optional_miss_degrades_to_empty_match() {
        let grammar = single(Expr::optional(vec![Expr::lit("x")]));
        let node = descend(&grammar, body(&grammar), Cursor::from_string("yyy"));
        assert!(node.is_match());
        assert_eq!(node.value, MatchValue::None);
        assert_eq!(node.remaining.offset(), 0);
    }

    #[test]
    fn lookahead_never_consumes() {
        let cursor = Cursor::from_string("abc");

        let and = single(Expr::and(vec![Expr::lit("ab")]));
        let node = descend(&and, body(&and), cursor.clone());
        assert!(node.is_match());
        assert_eq!(node.remaining, cursor);

        let not_miss = single(Expr::not(vec![Expr::lit("ab")]));
        let node = descend(&not_miss, body(&not_miss), cursor.clone());
        assert!(node.is_miss());
        assert_eq!(node.remaining, cursor);

        let not_match = single(Expr::not(vec![Expr::lit("zz")]));
        let node = descend(&not_match, body(&not_match), cursor.clone());
        assert!(node.is_match());
        assert_eq!(node.remaining, cursor);
    }

    #[test]
    fn zero_width_repetition_terminates() {
        // The unit always matches without consuming; the loop must stop.
        let grammar = single(Expr::zero_or_more(vec![Expr::optional(vec![Expr::lit(
            "y",
        )])]));
        let node = descend(&grammar, body(&grammar), Cursor::from_string("zzz"));
        assert!(node.is_match());
        assert_eq!(node.remaining.offset(), 0);
        assert_eq!(node.value, MatchValue::Children(Params::new()));
    }

    #[test]
    fn failure_path_names_the_stalled_branch() {
        let grammar = Grammar::resolve(vec![(
            "Pair",
            Expr::sequence(vec![
                ("first", Expr::lit("a")),
                ("second", Expr::lit("b")),
            ]),
        )])
        .unwrap();
        let id = grammar.rule_id("Pair").unwrap();
        let node = descend_rule(&grammar, id, Cursor::from_string("ax"));
        assert!(node.is_partial());
        assert_eq!(node.failure_path(), vec!["Pair", "first"]);
    }
}
