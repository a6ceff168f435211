//! Property-based tests using proptest
//!
//! Random grammars over a small alphabet are checked for optimizer
//! idempotence, backend equivalence and well-formed parse trees.

use pestle::codegen::Program;
use pestle::optimizer::{optimize, PassList};
use pestle::runtime::{Interpreter, Pair};
use pestle::{Expr, Grammar, Modifiers, ParserConfig, Rule};
use proptest::prelude::*;

const RULES: usize = 3;

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        Just(Expr::Str("a".into())),
        Just(Expr::Str("b".into())),
        Just(Expr::Str("ab".into())),
        Just(Expr::Insens("a".into())),
        Just(Expr::Range('a', 'b')),
        Just(Expr::Any),
        Just(Expr::Ident("r1".into())),
        Just(Expr::Ident("r2".into())),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::Seq),
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::Choice),
            inner.clone().prop_map(|e| Expr::Opt(Box::new(e))),
            inner.clone().prop_map(|e| Expr::Rep(Box::new(e))),
            inner.clone().prop_map(|e| Expr::RepOnce(Box::new(e))),
            (inner.clone(), 0u32..3, 0u32..3)
                .prop_map(|(e, a, b)| Expr::RepRange(Box::new(e), a.min(b), a.max(b))),
            inner.clone().prop_map(|e| Expr::NegPred(Box::new(e))),
            inner.clone().prop_map(|e| Expr::PosPred(Box::new(e))),
            inner.clone().prop_map(|e| Expr::Group(Box::new(e))),
            // the shape the skip-until pass looks for
            inner.clone().prop_map(|e| Expr::Rep(Box::new(Expr::Seq(vec![
                Expr::NegPred(Box::new(e)),
                Expr::Any,
            ])))),
        ]
    })
}

fn modifiers_strategy() -> impl Strategy<Value = Modifiers> {
    prop_oneof![
        Just(Modifiers::NONE),
        Just(Modifiers::SILENT),
        Just(Modifiers::ATOMIC),
        Just(Modifiers::COMPOUND),
        Just(Modifiers::NONATOMIC),
    ]
}

/// Rule `i` may only call rules after it, so generated grammars never recurse
fn acyclic(expr: &Expr, rule: usize) -> Expr {
    if let Expr::Ident(name) = expr {
        let target: usize = name[1..].parse().unwrap_or(0);
        return if target > rule {
            expr.clone()
        } else {
            Expr::Str("b".into())
        };
    }
    let children = expr.children();
    if children.is_empty() {
        return expr.clone();
    }
    expr.with_children(children.into_iter().map(|c| acyclic(c, rule)).collect())
}

fn grammar_strategy() -> impl Strategy<Value = Grammar> {
    (
        prop::collection::vec((modifiers_strategy(), expr_strategy()), RULES),
        any::<bool>(),
    )
        .prop_map(|(bodies, whitespace)| {
            let mut rules: Vec<Rule> = bodies
                .iter()
                .enumerate()
                .map(|(i, (modifiers, body))| Rule::new(format!("r{}", i), *modifiers, acyclic(body, i)))
                .collect();
            if whitespace {
                rules.push(Rule::new("WHITESPACE", Modifiers::SILENT, Expr::Str(" ".into())));
            }
            Grammar::new(rules, Vec::new()).unwrap()
        })
}

fn check_spans(pair: &Pair<'_>, input: &str) -> Result<(), TestCaseError> {
    prop_assert!(pair.start() <= pair.end());
    prop_assert!(pair.end() <= input.len());
    for child in pair.children() {
        prop_assert!(pair.start() <= child.start());
        prop_assert!(child.end() <= pair.end());
        check_spans(child, input)?;
    }
    Ok(())
}

// =============================================================================
// Optimizer Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A second optimization run changes nothing
    #[test]
    fn test_optimize_is_idempotent(grammar in grammar_strategy()) {
        let passes = PassList::default_passes();
        let once = optimize(&grammar, &passes);
        let twice = optimize(&once, &passes);
        prop_assert_eq!(once, twice);
    }

    /// Interpreter, optimized interpreter and compiled program agree on
    /// verdict, tree and error
    #[test]
    fn test_backends_are_equivalent(grammar in grammar_strategy(), input in "[ab ]{0,8}") {
        let optimized = optimize(&grammar, &PassList::default_passes());
        let config = ParserConfig::default();

        let plain = Interpreter::new(grammar.clone(), config).parse("r0", &input, 0);
        let fast = Interpreter::new(optimized.clone(), config).parse("r0", &input, 0);
        let program = Program::compile(&optimized, config).unwrap();
        let compiled = program.parse("r0", &input, 0);

        prop_assert_eq!(&plain, &fast, "optimized grammar:\n{}", optimized);
        prop_assert_eq!(&fast, &compiled);
    }
}

// =============================================================================
// Parse Tree Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every span lies inside its parent and inside the input
    #[test]
    fn test_span_invariant(grammar in grammar_strategy(), input in "[ab ]{0,8}") {
        let interpreter = Interpreter::new(grammar, ParserConfig::default());
        if let Ok(pairs) = interpreter.parse("r0", &input, 0) {
            prop_assert!(pairs.start() <= pairs.end());
            for pair in pairs.iter() {
                check_spans(pair, &input)?;
            }
        }
    }

    /// Parsing from an offset never produces spans before it
    #[test]
    fn test_start_offset_bounds(input in "[ab]{0,8}", start in 0usize..8) {
        let grammar = Grammar::from_source("r = { item* }\nitem = { \"a\" | \"b\" }").unwrap();
        let interpreter = Interpreter::new(grammar, ParserConfig::default());
        let start = start.min(input.len());
        let pairs = interpreter.parse("r", &input, start).unwrap();
        prop_assert_eq!(pairs.start(), start);
        prop_assert_eq!(pairs.end(), input.len());
        for pair in pairs.flatten() {
            prop_assert!(pair.start() >= start);
        }
    }

    /// Choice of literals picks the first alternative that matches
    #[test]
    fn test_first_alternative_wins(rest in "[a-c]{0,4}") {
        let grammar = Grammar::from_source(r#"r = { "a" | "ab" | "abc" }"#).unwrap();
        let optimized = optimize(&grammar, &PassList::default_passes());
        let input = format!("a{}", rest);
        for g in [grammar, optimized] {
            let pairs = Interpreter::new(g, ParserConfig::default()).parse("r", &input, 0).unwrap();
            prop_assert_eq!(pairs.end(), 1);
        }
    }
}
