//! Grammar model and resolution.
//!
//! Grammars are authored as [`Expr`] trees in which cross-rule references
//! are symbolic ([`Expr::Ref`]). [`Grammar::resolve`] turns a set of named
//! definitions into an arena of [`Rule`]s whose bodies are [`Pattern`]
//! trees: every `Ref` becomes a [`RuleId`] into the arena, which is what
//! makes forward, mutual and self references legal without ever copying a
//! rule. After resolution no `Ref` remains anywhere.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::GrammarError;
use crate::params::{Key, Params};

// ============================================================================
// AUTHORING EXPRESSIONS
// ============================================================================

/// A combinator expression as written by a grammar author.
///
/// Composite variants carry an ordered keyed child list; children of one
/// node are either all positional or all labeled, which the construction
/// API enforces by accepting one shape or the other. The repetition,
/// optional and lookahead variants wrap the *sequence definition* of their
/// repeated or tested unit, not a single bare child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(String),
    /// A symbolic reference to a named rule; exists only before resolution.
    Ref(String),
    Sequence(Params<Expr>),
    Choice(Params<Expr>),
    ZeroOrMore(Params<Expr>),
    OneOrMore(Params<Expr>),
    Optional(Params<Expr>),
    And(Params<Expr>),
    Not(Params<Expr>),
}

impl Expr {
    pub fn lit(text: impl Into<String>) -> Expr {
        Expr::Literal(text.into())
    }

    /// A reference to the rule named `symbol`, defined anywhere in the same
    /// grammar.
    pub fn reference(symbol: impl Into<String>) -> Expr {
        Expr::Ref(symbol.into())
    }

    pub fn sequence(children: impl Into<Params<Expr>>) -> Expr {
        Expr::Sequence(children.into())
    }

    pub fn choice(children: impl Into<Params<Expr>>) -> Expr {
        Expr::Choice(children.into())
    }

    pub fn zero_or_more(unit: impl Into<Params<Expr>>) -> Expr {
        Expr::ZeroOrMore(unit.into())
    }

    pub fn one_or_more(unit: impl Into<Params<Expr>>) -> Expr {
        Expr::OneOrMore(unit.into())
    }

    pub fn optional(unit: impl Into<Params<Expr>>) -> Expr {
        Expr::Optional(unit.into())
    }

    /// Positive lookahead: matches when the unit would match, consuming
    /// nothing.
    pub fn and(unit: impl Into<Params<Expr>>) -> Expr {
        Expr::And(unit.into())
    }

    /// Negative lookahead: matches when the unit would not, consuming
    /// nothing.
    pub fn not(unit: impl Into<Params<Expr>>) -> Expr {
        Expr::Not(unit.into())
    }
}

impl From<Vec<Expr>> for Params<Expr> {
    fn from(children: Vec<Expr>) -> Self {
        Params::from_indexed(children)
    }
}

impl From<Vec<(&str, Expr)>> for Params<Expr> {
    fn from(children: Vec<(&str, Expr)>) -> Self {
        Params::from_labeled(children)
    }
}

impl From<Vec<(String, Expr)>> for Params<Expr> {
    fn from(children: Vec<(String, Expr)>) -> Self {
        Params::from_labeled(children)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(text) => write!(f, "{text:?}"),
            Expr::Ref(symbol) => write!(f, "{symbol}"),
            Expr::Sequence(children) => wrapped(f, "(", children, " ", ")"),
            Expr::Choice(children) => wrapped(f, "(", children, " | ", ")"),
            Expr::ZeroOrMore(unit) => wrapped(f, "(", unit, " ", ")*"),
            Expr::OneOrMore(unit) => wrapped(f, "(", unit, " ", ")+"),
            Expr::Optional(unit) => wrapped(f, "(", unit, " ", ")?"),
            Expr::And(unit) => wrapped(f, "&(", unit, " ", ")"),
            Expr::Not(unit) => wrapped(f, "!(", unit, " ", ")"),
        }
    }
}

fn wrapped(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    children: &Params<Expr>,
    separator: &str,
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (position, (key, child)) in children.iter().enumerate() {
        if position > 0 {
            f.write_str(separator)?;
        }
        if let Key::Label(label) = key {
            write!(f, "{label}:")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(close)
}

// ============================================================================
// RESOLVED PATTERNS
// ============================================================================

/// Index of a rule inside its grammar's arena. All cross-rule edges are
/// ids, never owned copies, so cyclic rule graphs cost nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(usize);

/// A fully resolved combinator expression: the same shape as [`Expr`] with
/// every symbolic reference replaced by a [`RuleId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Literal(String),
    Rule(RuleId),
    Sequence(Params<Pattern>),
    Choice(Params<Pattern>),
    ZeroOrMore(Params<Pattern>),
    OneOrMore(Params<Pattern>),
    Optional(Params<Pattern>),
    And(Params<Pattern>),
    Not(Params<Pattern>),
}

/// A named rule: a symbol and its resolved body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    symbol: String,
    body: Pattern,
}

impl Rule {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn body(&self) -> &Pattern {
        &self.body
    }
}

/// A resolved grammar: an arena of rules in declaration order plus a
/// symbol index into it.
///
/// The arena uniquely owns every rule; everything else refers to rules by
/// [`RuleId`]. A grammar is immutable once resolved and may be shared
/// freely between concurrent parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    rules: Vec<Rule>,
    index: HashMap<String, RuleId>,
}

impl Grammar {
    /// Resolve a set of named definitions into a grammar.
    ///
    /// Definitions may reference each other in any order, including
    /// mutually and self-recursively. Fails when a symbol is defined twice,
    /// when a reference names a symbol that is never defined, when a label
    /// occurs more than once within one rule's tree, or when the definition
    /// list is empty.
    pub fn resolve<S: Into<String>>(
        definitions: impl IntoIterator<Item = (S, Expr)>,
    ) -> Result<Grammar, GrammarError> {
        let definitions: Vec<(String, Expr)> = definitions
            .into_iter()
            .map(|(symbol, expr)| (symbol.into(), expr))
            .collect();

        if definitions.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        let mut index = HashMap::new();
        for (position, (symbol, _)) in definitions.iter().enumerate() {
            if index.insert(symbol.clone(), RuleId(position)).is_some() {
                return Err(GrammarError::DuplicateRule {
                    symbol: symbol.clone(),
                });
            }
        }

        let mut rules = Vec::with_capacity(definitions.len());
        for (symbol, expr) in &definitions {
            let body = resolve_expr(expr, &index, symbol, expr)?;
            rules.push(Rule {
                symbol: symbol.clone(),
                body,
            });
        }

        let grammar = Grammar { rules, index };
        grammar.validate_labels()?;
        Ok(grammar)
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn rule_id(&self, symbol: &str) -> Option<RuleId> {
        self.index.get(symbol).copied()
    }

    pub fn get(&self, symbol: &str) -> Option<&Rule> {
        self.rule_id(symbol).map(|id| self.rule(id))
    }

    /// Rules in declaration order; this is also the order `parse` tries
    /// them in.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub(crate) fn rule_ids(&self) -> impl Iterator<Item = RuleId> {
        (0..self.rules.len()).map(RuleId)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Render one rule as grammar text. Rule links print as bare symbols,
    /// so this stays finite on cyclic graphs.
    pub fn display_rule(&self, id: RuleId) -> RuleDisplay<'_> {
        RuleDisplay { grammar: self, id }
    }

    // Every label within one rule's tree must be unique. Rule links are
    // leaves here: labels of other rules live in those rules' own trees.
    fn validate_labels(&self) -> Result<(), GrammarError> {
        for id in self.rule_ids() {
            let rule = self.rule(id);
            let mut labels = Vec::new();
            collect_labels(&rule.body, &mut labels);

            let mut seen = HashSet::new();
            for label in labels {
                if !seen.insert(label.clone()) {
                    return Err(GrammarError::duplicate_label(
                        rule.symbol.clone(),
                        label,
                        self.display_rule(id).to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn resolve_expr(
    expr: &Expr,
    index: &HashMap<String, RuleId>,
    current_symbol: &str,
    definition: &Expr,
) -> Result<Pattern, GrammarError> {
    let resolve_children = |children: &Params<Expr>| -> Result<Params<Pattern>, GrammarError> {
        let mut resolved = Params::new();
        for (key, child) in children.iter() {
            resolved.assign(
                key.clone(),
                resolve_expr(child, index, current_symbol, definition)?,
            );
        }
        Ok(resolved)
    };

    match expr {
        Expr::Literal(text) => Ok(Pattern::Literal(text.clone())),
        Expr::Ref(symbol) => match index.get(symbol) {
            Some(id) => Ok(Pattern::Rule(*id)),
            None => Err(GrammarError::undefined_rule(
                symbol.clone(),
                current_symbol.to_string(),
                format!("{current_symbol} <- {definition}"),
            )),
        },
        Expr::Sequence(children) => Ok(Pattern::Sequence(resolve_children(children)?)),
        Expr::Choice(children) => Ok(Pattern::Choice(resolve_children(children)?)),
        Expr::ZeroOrMore(unit) => Ok(Pattern::ZeroOrMore(resolve_children(unit)?)),
        Expr::OneOrMore(unit) => Ok(Pattern::OneOrMore(resolve_children(unit)?)),
        Expr::Optional(unit) => Ok(Pattern::Optional(resolve_children(unit)?)),
        Expr::And(unit) => Ok(Pattern::And(resolve_children(unit)?)),
        Expr::Not(unit) => Ok(Pattern::Not(resolve_children(unit)?)),
    }
}

fn collect_labels(pattern: &Pattern, labels: &mut Vec<String>) {
    let collect_children = |children: &Params<Pattern>, labels: &mut Vec<String>| {
        for (key, child) in children.iter() {
            if let Key::Label(label) = key {
                labels.push(label.clone());
            }
            collect_labels(child, labels);
        }
    };

    match pattern {
        Pattern::Literal(_) | Pattern::Rule(_) => {}
        Pattern::Sequence(children)
        | Pattern::Choice(children)
        | Pattern::ZeroOrMore(children)
        | Pattern::OneOrMore(children)
        | Pattern::Optional(children)
        | Pattern::And(children)
        | Pattern::Not(children) => collect_children(children, labels),
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

/// Renders one rule of a grammar; see [`Grammar::display_rule`].
pub struct RuleDisplay<'a> {
    grammar: &'a Grammar,
    id: RuleId,
}

impl fmt::Display for RuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = self.grammar.rule(self.id);
        write!(f, "{} <- ", rule.symbol)?;
        write_pattern(f, self.grammar, &rule.body)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, id) in self.rule_ids().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", self.display_rule(id))?;
        }
        Ok(())
    }
}

fn write_pattern(f: &mut fmt::Formatter<'_>, grammar: &Grammar, pattern: &Pattern) -> fmt::Result {
    let mut children = |f: &mut fmt::Formatter<'_>,
                        open: &str,
                        params: &Params<Pattern>,
                        separator: &str,
                        close: &str|
     -> fmt::Result {
        f.write_str(open)?;
        for (position, (key, child)) in params.iter().enumerate() {
            if position > 0 {
                f.write_str(separator)?;
            }
            if let Key::Label(label) = key {
                write!(f, "{label}:")?;
            }
            write_pattern(f, grammar, child)?;
        }
        f.write_str(close)
    };

    match pattern {
        Pattern::Literal(text) => write!(f, "{text:?}"),
        Pattern::Rule(id) => write!(f, "{}", grammar.rule(*id).symbol),
        Pattern::Sequence(params) => children(f, "(", params, " ", ")"),
        Pattern::Choice(params) => children(f, "(", params, " | ", ")"),
        Pattern::ZeroOrMore(params) => children(f, "(", params, " ", ")*"),
        Pattern::OneOrMore(params) => children(f, "(", params, " ", ")+"),
        Pattern::Optional(params) => children(f, "(", params, " ", ")?"),
        Pattern::And(params) => children(f, "&(", params, " ", ")"),
        Pattern::Not(params) => children(f, "!(", params, " ", ")"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_self_references_resolve() {
        let grammar = Grammar::resolve(vec![
            (
                "List",
                Expr::sequence(vec![
                    ("open", Expr::lit("(")),
                    ("inner", Expr::optional(vec![Expr::reference("List")])),
                    ("close", Expr::lit(")")),
                ]),
            ),
            ("Atom", Expr::reference("List")),
        ])
        .unwrap();

        assert_eq!(grammar.len(), 2);
        let list_id = grammar.rule_id("List").unwrap();
        let list = grammar.rule(list_id);
        if let Pattern::Sequence(children) = list.body() {
            if let Some(Pattern::Optional(unit)) = children.get_label("inner") {
                assert_eq!(unit.get(0), Some(&Pattern::Rule(list_id)));
            } else {
                panic!("expected an optional inner pattern");
            }
        } else {
            panic!("expected a sequence body");
        }
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let result = Grammar::resolve(vec![("A", Expr::reference("Missing"))]);
        assert!(matches!(
            result,
            Err(GrammarError::UndefinedRule { ref symbol, ref referenced_in, .. })
                if symbol == "Missing" && referenced_in == "A"
        ));
    }

    #[test]
    fn cyclic_grammar_display_terminates() {
        let grammar = Grammar::resolve(vec![(
            "Loop",
            Expr::sequence(vec![Expr::lit("x"), Expr::reference("Loop")]),
        )])
        .unwrap();
        let id = grammar.rule_id("Loop").unwrap();
        assert_eq!(grammar.display_rule(id).to_string(), r#"Loop <- ("x" Loop)"#);
    }

    #[test]
    fn expr_display_quotes_literals_and_marks_labels() {
        let expr = Expr::sequence(vec![
            ("left", Expr::reference("Value")),
            (
                "op",
                Expr::choice(vec![Expr::lit("+"), Expr::lit("-")]),
            ),
        ]);
        assert_eq!(expr.to_string(), r#"(left:Value op:("+" | "-"))"#);
    }
}
