//! Inline silent rules and built-ins
//!
//! A reference to a rule whose only modifier is `_`, or to a built-in, is
//! replaced by the body. Silent rules never contribute structure, so the
//! parse tree is unchanged. Recursive rules and the trivia rules are left
//! alone.

use super::{Pass, PassContext};
use crate::meta::builtins;
use crate::meta::expr::Expr;
use crate::meta::grammar::Modifiers;

/// Replaces references to silent rules and built-ins with their bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRules;

impl Pass for InlineRules {
    fn name(&self) -> &str {
        "inline_rules"
    }

    fn rewrite(&self, expr: &Expr, cx: &PassContext<'_>) -> Option<Expr> {
        let Expr::Ident(name) = expr else {
            return None;
        };
        match cx.grammar().get(name) {
            Some(rule) => {
                let inlinable = rule.modifiers == Modifiers::SILENT
                    && !builtins::is_trivia_rule(name)
                    && name != builtins::SKIP_RULE
                    && !cx.is_recursive(name);
                inlinable.then(|| rule.expr.clone())
            }
            None => builtins::expand(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::{Expr, Grammar, Modifiers, Rule};
    use crate::optimizer::{optimize, InlineRules, PassList};

    fn inline(source: &str, rule: &str) -> String {
        let grammar = Grammar::from_source(source).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(InlineRules));
        optimized.get(rule).unwrap().expr.to_string()
    }

    #[test]
    fn test_inline_silent_rule() {
        let source = r#"
            a = { b ~ "z" }
            b = _{ "x" | "y" }
        "#;
        assert_eq!(inline(source, "a"), r#"("x" | "y") ~ "z""#);
    }

    #[test]
    fn test_inline_builtin() {
        assert_eq!(inline("a = { ASCII_DIGIT+ }", "a"), "'0'..'9'+");
        assert_eq!(inline("a = { ANY ~ EOI }", "a"), "ANY ~ EOI");
    }

    #[test]
    fn test_keep_non_silent_and_recursive_rules() {
        let source = r#"
            a = { b ~ c }
            b = { "x" }
            c = _{ "(" ~ c? ~ ")" }
        "#;
        assert_eq!(inline(source, "a"), "b ~ c");
    }

    #[test]
    fn test_keep_silent_atomic_and_trivia_rules() {
        // `_@` has no surface syntax, so the rule is built directly
        let rules = vec![
            Rule::new("WHITESPACE", Modifiers::SILENT, Expr::Str(" ".into())),
            Rule::new(
                "a",
                Modifiers::NONE,
                Expr::Seq(vec![Expr::Ident("b".into()), Expr::Ident("WHITESPACE".into())]),
            ),
            Rule::new("b", Modifiers::SILENT | Modifiers::ATOMIC, Expr::Str("x".into())),
        ];
        let grammar = Grammar::new(rules, Vec::new()).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(InlineRules));
        assert_eq!(optimized.get("a").unwrap().expr.to_string(), "b ~ WHITESPACE");
    }

    #[test]
    fn test_nested_inlining() {
        let source = r#"
            a = { b }
            b = _{ c ~ c }
            c = _{ ASCII_ALPHA }
        "#;
        let grammar = Grammar::from_source(source).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(InlineRules));
        let Expr::Seq(items) = &optimized.get("a").unwrap().expr else {
            panic!("expected a sequence");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].to_string(), "'a'..'z' | 'A'..'Z'");
    }
}
