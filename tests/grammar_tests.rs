// tests/grammar_tests.rs

use descent::grammar::Pattern;
use descent::prelude::*;

fn arithmetic() -> Vec<(&'static str, Expr)> {
    vec![
        (
            "Sum",
            Expr::sequence(vec![
                ("left", Expr::reference("Value")),
                (
                    "suffix",
                    Expr::zero_or_more(vec![
                        (
                            "operator",
                            Expr::choice(vec![Expr::lit("+"), Expr::lit("-")]),
                        ),
                        ("right", Expr::reference("Value")),
                    ]),
                ),
            ]),
        ),
        ("Value", Expr::one_or_more(vec![Expr::reference("Digit")])),
        (
            "Digit",
            Expr::choice((0..=9).map(|d| Expr::lit(d.to_string())).collect::<Vec<_>>()),
        ),
    ]
}

#[test]
fn resolution_is_idempotent() {
    let first = Grammar::resolve(arithmetic()).unwrap();
    let second = Grammar::resolve(arithmetic()).unwrap();
    assert_eq!(first, second);

    let symbols: Vec<_> = first.rules().map(|rule| rule.symbol()).collect();
    assert_eq!(symbols, vec!["Sum", "Value", "Digit"]);
}

#[test]
fn mutual_recursion_resolves() {
    let grammar = Grammar::resolve(vec![
        (
            "Group",
            Expr::sequence(vec![
                Expr::lit("("),
                Expr::reference("Item"),
                Expr::lit(")"),
            ]),
        ),
        (
            "Item",
            Expr::choice(vec![Expr::lit("x"), Expr::reference("Group")]),
        ),
    ])
    .unwrap();

    let group_id = grammar.rule_id("Group").unwrap();
    let item = grammar.get("Item").unwrap();
    if let Pattern::Choice(alternatives) = item.body() {
        assert_eq!(alternatives.get(1), Some(&Pattern::Rule(group_id)));
    } else {
        panic!("expected a choice body for Item");
    }
}

#[test]
fn no_ref_survives_resolution() {
    fn assert_no_refs(pattern: &Pattern) {
        match pattern {
            Pattern::Literal(_) | Pattern::Rule(_) => {}
            Pattern::Sequence(children)
            | Pattern::Choice(children)
            | Pattern::ZeroOrMore(children)
            | Pattern::OneOrMore(children)
            | Pattern::Optional(children)
            | Pattern::And(children)
            | Pattern::Not(children) => {
                for child in children.values() {
                    assert_no_refs(child);
                }
            }
        }
    }

    let grammar = Grammar::resolve(arithmetic()).unwrap();
    for rule in grammar.rules() {
        assert_no_refs(rule.body());
    }
}

#[test]
fn undefined_reference_fails_resolution() {
    let result = Grammar::resolve(vec![(
        "A",
        Expr::choice(vec![Expr::lit("x"), Expr::reference("Nope")]),
    )]);

    match result {
        Err(GrammarError::UndefinedRule {
            symbol,
            referenced_in,
            ..
        }) => {
            assert_eq!(symbol, "Nope");
            assert_eq!(referenced_in, "A");
        }
        other => panic!("expected an undefined-rule error, got {other:?}"),
    }
}

#[test]
fn duplicate_label_within_one_rule_fails() {
    let result = Grammar::resolve(vec![(
        "A",
        Expr::sequence(vec![
            ("value", Expr::lit("a")),
            (
                "rest",
                Expr::zero_or_more(vec![("value", Expr::lit("b"))]),
            ),
        ]),
    )]);

    match result {
        Err(GrammarError::DuplicateLabel { rule, label, .. }) => {
            assert_eq!(rule, "A");
            assert_eq!(label, "value");
        }
        other => panic!("expected a duplicate-label error, got {other:?}"),
    }
}

#[test]
fn reusing_a_label_across_rules_is_fine() {
    let grammar = Grammar::resolve(vec![
        ("A", Expr::sequence(vec![("value", Expr::lit("a"))])),
        ("B", Expr::sequence(vec![("value", Expr::lit("b"))])),
    ]);
    assert!(grammar.is_ok());
}

#[test]
fn index_keys_are_exempt_from_uniqueness_across_nesting() {
    // Index 0 appears in both the outer sequence and the nested unit.
    let grammar = Grammar::resolve(vec![(
        "A",
        Expr::sequence(vec![
            Expr::lit("a"),
            Expr::zero_or_more(vec![Expr::lit("b")]),
        ]),
    )]);
    assert!(grammar.is_ok());
}

#[test]
fn defining_a_rule_twice_fails() {
    let result = Grammar::resolve(vec![
        ("A", Expr::lit("a")),
        ("A", Expr::lit("b")),
    ]);
    assert!(matches!(
        result,
        Err(GrammarError::DuplicateRule { ref symbol }) if symbol == "A"
    ));
}

#[test]
fn empty_grammar_fails() {
    let result = Grammar::resolve(Vec::<(String, Expr)>::new());
    assert_eq!(result.unwrap_err(), GrammarError::EmptyGrammar);
}

#[test]
fn grammar_renders_as_text() {
    let grammar = Grammar::resolve(arithmetic()).unwrap();
    let rendered = grammar.to_string();
    assert!(rendered.starts_with(
        r#"Sum <- (left:Value suffix:(operator:("+" | "-") right:Value)*)"#
    ));
    assert!(rendered.contains("Value <- (Digit)+"));
}
