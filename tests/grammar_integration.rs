//! Integration tests for the grammar front end
//!
//! These tests cover grammar parsing, validation, printing, serialization
//! and analysis warnings.

use pestle::meta::analysis::WarningKind;
use pestle::meta::{parse_expr, parse_grammar};
use pestle::{Expr, Grammar, GrammarAnalyzer, GrammarError, Modifiers};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_rule_modifiers() {
    let grammar = Grammar::from_source(
        r#"
        a = { "a" }
        b = _{ "b" }
        c = @{ "c" }
        d = ${ "d" }
        e = !{ "e" }
        "#,
    )
    .unwrap();

    let modifiers: Vec<Modifiers> = grammar.rules().iter().map(|r| r.modifiers).collect();
    assert_eq!(
        modifiers,
        vec![
            Modifiers::NONE,
            Modifiers::SILENT,
            Modifiers::ATOMIC,
            Modifiers::COMPOUND,
            Modifiers::NONATOMIC
        ]
    );
}

#[test]
fn test_operator_precedence() {
    // `~` binds tighter than `|`, postfix binds tighter than `~`
    let expr = parse_expr(r#""a" ~ "b"* | "c""#).unwrap();
    assert_eq!(
        expr,
        Expr::Choice(vec![
            Expr::Seq(vec![
                Expr::Str("a".into()),
                Expr::Rep(Box::new(Expr::Str("b".into()))),
            ]),
            Expr::Str("c".into()),
        ])
    );
}

#[test]
fn test_bounded_repetition_forms() {
    let inner = || Box::new(Expr::Str("x".into()));
    assert_eq!(parse_expr(r#""x"{3}"#).unwrap(), Expr::RepExact(inner(), 3));
    assert_eq!(parse_expr(r#""x"{2,}"#).unwrap(), Expr::RepMin(inner(), 2));
    assert_eq!(parse_expr(r#""x"{,4}"#).unwrap(), Expr::RepMax(inner(), 4));
    assert_eq!(parse_expr(r#""x"{1,5}"#).unwrap(), Expr::RepRange(inner(), 1, 5));
}

#[test]
fn test_terminals_and_stack_syntax() {
    assert_eq!(
        parse_expr(r#"^"select""#).unwrap(),
        Expr::Insens("select".into())
    );
    assert_eq!(parse_expr("'a'..'z'").unwrap(), Expr::Range('a', 'z'));
    assert_eq!(
        parse_expr(r#"PUSH("x")"#).unwrap(),
        Expr::Push(Box::new(Expr::Str("x".into())))
    );
    assert_eq!(
        parse_expr(r#"PUSH_LITERAL("y")"#).unwrap(),
        Expr::PushLiteral("y".into())
    );
    assert_eq!(parse_expr("PEEK[1..-1]").unwrap(), Expr::PeekSlice(1, Some(-1)));
    assert_eq!(parse_expr("PEEK[..]").unwrap(), Expr::PeekSlice(0, None));
    assert_eq!(
        parse_expr("#name = ident").unwrap(),
        Expr::Tag("name".into(), Box::new(Expr::Ident("ident".into())))
    );
}

#[test]
fn test_docs_are_kept() {
    let grammar = Grammar::from_source("//! A tiny grammar\n\n/// The only rule\nr = { \"r\" }").unwrap();
    assert_eq!(grammar.doc(), ["A tiny grammar".to_string()]);
    assert_eq!(grammar.get("r").unwrap().doc, vec!["The only rule".to_string()]);
}

#[test]
fn test_syntax_error_position() {
    let err = parse_grammar("a = { \"a\" }\nb = { ~ }").unwrap_err();
    match err {
        GrammarError::Syntax { position, .. } => {
            assert_eq!(position.line, 2);
            assert_eq!(position.column, 7);
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_unresolved_rule() {
    let err = Grammar::from_source("a = { b }").unwrap_err();
    assert_eq!(
        err,
        GrammarError::UnresolvedRule {
            name: "b".into(),
            rule: "a".into()
        }
    );
}

#[test]
fn test_duplicate_rule() {
    let err = Grammar::from_source("a = { \"x\" }\na = { \"y\" }").unwrap_err();
    assert_eq!(err, GrammarError::DuplicateRule { name: "a".into() });
}

#[test]
fn test_builtin_names_are_reserved() {
    let err = Grammar::from_source("ANY = { \"x\" }").unwrap_err();
    assert_eq!(err, GrammarError::ReservedName { name: "ANY".into() });

    // WHITESPACE and COMMENT are user-definable
    assert!(Grammar::from_source("WHITESPACE = _{ \" \" }\nCOMMENT = _{ \"#\" }").is_ok());
}

#[test]
fn test_builtins_resolve() {
    let grammar = Grammar::from_source(
        "r = { SOI ~ (ASCII_ALPHA | ASCII_DIGIT | LETTER | NEWLINE)* ~ EOI }",
    );
    assert!(grammar.is_ok());
}

// ============================================================================
// Printing and Serialization
// ============================================================================

#[test]
fn test_display_round_trips_through_parser() {
    let source = r#"
        expr = { term ~ (("+" | "-") ~ term)* }
        term = _{ num | "(" ~ expr ~ ")" }
        num = @{ ASCII_DIGIT+ ~ ("." ~ ASCII_DIGIT{1,3})? }
    "#;
    let grammar = Grammar::from_source(source).unwrap();
    let printed = grammar.to_string();
    let reparsed = Grammar::from_source(&printed).unwrap();
    assert_eq!(grammar, reparsed);
}

#[test]
fn test_json_round_trip() {
    let grammar = Grammar::from_source("a = { b ~ \"!\" }\nb = @{ 'a'..'z'+ }").unwrap();
    let json = grammar.to_json().unwrap();
    let restored = Grammar::from_json(&json).unwrap();
    assert_eq!(restored, grammar);
    assert_eq!(restored.index_of("b"), Some(1));
}

// ============================================================================
// Analysis
// ============================================================================

#[test]
fn test_left_recursion_warning() {
    let grammar = Grammar::from_source("expr = { expr ~ \"+\" ~ num | num }\nnum = { ASCII_DIGIT+ }").unwrap();
    let warnings = GrammarAnalyzer::new(&grammar).analyze();
    assert!(warnings
        .iter()
        .any(|w| w.kind == WarningKind::LeftRecursion && w.rule == "expr"));
}

#[test]
fn test_unused_rule_warning() {
    let grammar = Grammar::from_source("main = { \"a\" }\nspare = { \"b\" }").unwrap();
    let warnings = GrammarAnalyzer::new(&grammar).analyze();
    assert!(warnings
        .iter()
        .any(|w| w.kind == WarningKind::UnusedRule && w.rule == "spare"));
}

#[test]
fn test_nullable_repetition_warning() {
    let grammar = Grammar::from_source("r = { (\"a\"?)* }").unwrap();
    let warnings = GrammarAnalyzer::new(&grammar).analyze();
    assert!(warnings.iter().any(|w| w.kind == WarningKind::NullableRepetition));
}

#[test]
fn test_recursive_rules() {
    let grammar = Grammar::from_source(
        "a = { \"(\" ~ b ~ \")\" | \"x\" }\nb = { a }\nc = { \"c\" }",
    )
    .unwrap();
    let recursive = GrammarAnalyzer::new(&grammar).recursive_rules();
    assert!(recursive.contains("a"));
    assert!(recursive.contains("b"));
    assert!(!recursive.contains("c"));
}
