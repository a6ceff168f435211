//! Integration tests for the optimizer pipeline
//!
//! These tests cover the default pass order, passes working together,
//! the context guards, the optimization log, and user-defined passes.

use pestle::meta::Expr;
use pestle::optimizer::{optimize, optimize_with_log, Pass, PassContext, PassList};
use pestle::{Grammar, OptimizerConfig, PegParser};

fn grammar(source: &str) -> Grammar {
    Grammar::from_source(source).unwrap()
}

fn body(grammar: &Grammar, rule: &str) -> Expr {
    grammar.get(rule).unwrap().expr.clone()
}

// ============================================================================
// Pass List
// ============================================================================

#[test]
fn test_default_pass_order() {
    assert_eq!(
        PassList::default_passes().names(),
        vec![
            "synthesize_skip",
            "inline_rules",
            "unroll_repetition",
            "squash_choice",
            "collapse_negation",
            "skip_until"
        ]
    );
}

#[test]
fn test_empty_pass_list_is_identity() {
    let g = grammar(r#"r = { ("a" | "b")* ~ digit } digit = _{ '0'..'9' }"#);
    let (optimized, log) = optimize_with_log(&g, &PassList::new());
    assert_eq!(optimized, g);
    assert!(log.is_empty());
}

// ============================================================================
// Passes Working Together
// ============================================================================

#[test]
fn test_scan_idiom_over_choice() {
    // squash, then collapse, then skip-until
    let g = grammar(r#"r = { (!("\n" | ";") ~ ANY)* }"#);
    let (optimized, log) = optimize_with_log(&g, &PassList::default_passes());

    assert_eq!(
        body(&optimized, "r"),
        Expr::SkipUntil(vec!["\n".to_string(), ";".to_string()])
    );
    assert_eq!(log.by_pass("squash_choice").count(), 1);
    assert_eq!(log.by_pass("skip_until").count(), 1);
    assert!(log.entries().iter().all(|e| e.rule == "r"));
}

#[test]
fn test_silent_rules_inlined_recursive_kept() {
    let g = grammar(
        r#"
        expr = { term ~ ("+" ~ term)* }
        term = _{ num | "(" ~ expr ~ ")" }
        num = @{ ASCII_DIGIT+ }
        value = { digit ~ digit }
        digit = _{ '0'..'9' }
        "#,
    );
    let optimized = optimize(&g, &PassList::default_passes());

    assert_eq!(
        body(&optimized, "value"),
        Expr::Seq(vec![Expr::Range('0', '9'), Expr::Range('0', '9')])
    );

    let mut calls = Vec::new();
    body(&optimized, "expr").walk(&mut |e| {
        if let Expr::Ident(name) = e {
            calls.push(name.clone());
        }
    });
    assert_eq!(calls, ["term", "term"]);

    // built-in inlined, then the atomic `+` unrolled
    assert_eq!(
        body(&optimized, "num"),
        Expr::Seq(vec![
            Expr::Range('0', '9'),
            Expr::Rep(Box::new(Expr::Range('0', '9'))),
        ])
    );
}

#[test]
fn test_rules_are_never_removed() {
    let g = grammar(r#"r = { helper ~ "!" } helper = _{ "a" }"#);
    let optimized = optimize(&g, &PassList::default_passes());
    assert!(optimized.get("helper").is_some());
    assert_eq!(optimized.len(), g.len());
}

// ============================================================================
// Guards
// ============================================================================

#[test]
fn test_trivia_blocks_unrolling_outside_atomic_rules() {
    let g = grammar(
        r#"
        WHITESPACE = _{ " " }
        loose = { "a"{2} }
        tight = @{ "a"{2} }
        "#,
    );
    let optimized = optimize(&g, &PassList::default_passes());

    assert!(matches!(body(&optimized, "loose"), Expr::RepExact(_, 2)));
    assert_eq!(
        body(&optimized, "tight"),
        Expr::Seq(vec![Expr::Str("a".into()), Expr::Str("a".into())])
    );
}

#[test]
fn test_trivia_blocks_skip_until_outside_atomic_rules() {
    let g = grammar(
        r#"
        WHITESPACE = _{ " " }
        loose = { (!"," ~ ANY)* }
        tight = @{ (!"," ~ ANY)* }
        "#,
    );
    let optimized = optimize(&g, &PassList::default_passes());

    assert!(matches!(body(&optimized, "loose"), Expr::Rep(_)));
    assert_eq!(body(&optimized, "tight"), Expr::SkipUntil(vec![",".to_string()]));
}

#[test]
fn test_skip_synthesis_marks_grammar() {
    let g = grammar(
        r#"
        WHITESPACE = _{ " " }
        pair = { "a" ~ "b" }
        "#,
    );
    assert!(!g.explicit_trivia());
    let optimized = optimize(&g, &PassList::default_passes());
    assert!(optimized.explicit_trivia());
    assert_eq!(
        body(&optimized, "pair"),
        Expr::Seq(vec![Expr::Str("a".into()), Expr::Trivia, Expr::Str("b".into())])
    );
}

#[test]
fn test_choice_order_survives_squash() {
    let g = grammar(r#"r = { "=" | "==" }"#);
    let parser = PegParser::from_grammar(g).build().unwrap();
    assert!(matches!(body(parser.grammar(), "r"), Expr::ChoiceRegex(_)));
    assert_eq!(parser.parse("r", "==").unwrap().as_str(), "=");
}

// ============================================================================
// Log
// ============================================================================

#[test]
fn test_log_records_before_and_after() {
    let g = grammar(r#"r = { !"x" ~ "y" }"#);
    let (_, log) = optimize_with_log(&g, &PassList::default_passes());

    let entry = log.by_pass("collapse_negation").next().unwrap();
    assert_eq!(entry.rule, "r");
    assert_eq!(entry.before, r#"!"x""#);
    assert!(log.to_string().contains("[collapse_negation] r: "));
}

// ============================================================================
// User Passes
// ============================================================================

/// Rewrites one literal into another
struct Respell;

impl Pass for Respell {
    fn name(&self) -> &str {
        "respell"
    }

    fn rewrite(&self, expr: &Expr, _cx: &PassContext<'_>) -> Option<Expr> {
        match expr {
            Expr::Str(value) if value == "colour" => Some(Expr::Str("color".into())),
            _ => None,
        }
    }
}

#[test]
fn test_user_pass_runs_in_list() {
    let g = grammar(r#"r = { "colour" ~ "!" }"#);
    let (optimized, log) = optimize_with_log(&g, &PassList::new().with(Respell));
    assert_eq!(
        body(&optimized, "r"),
        Expr::Seq(vec![Expr::Str("color".into()), Expr::Str("!".into())])
    );
    assert_eq!(log.len(), 1);
}

#[test]
fn test_user_pass_through_builder() {
    let parser = PegParser::builder(r#"r = { "colour" }"#)
        .optimizer(OptimizerConfig::Custom(PassList::new().with(Respell)))
        .build()
        .unwrap();
    assert!(parser.parse("r", "color").is_ok());
    assert!(parser.parse("r", "colour").is_err());
    assert_eq!(body(parser.raw_grammar(), "r"), Expr::Str("colour".into()));
}
