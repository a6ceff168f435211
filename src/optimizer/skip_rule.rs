//! Synthesize the `SKIP` rule
//!
//! When a grammar defines `WHITESPACE` and/or `COMMENT`, a silent `SKIP`
//! rule holding `(WHITESPACE | COMMENT)*` is added and every sequence
//! outside atomic rules gets explicit [`Expr::Trivia`] call points between
//! its items. The grammar is then flagged as having explicit trivia, so
//! the runtime stops inserting trivia into sequences itself.
//!
//! `SKIP` is never interleaved into its own body, and the runtime does not
//! nest trivia skipping, so a `COMMENT` that may contain whitespace cannot
//! recurse.

use super::{Pass, PassContext};
use crate::meta::builtins::SKIP_RULE;
use crate::meta::expr::Expr;
use crate::meta::grammar::{Grammar, Modifiers, Rule};

/// Adds `SKIP` and makes trivia call points explicit
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesizeSkip;

impl Pass for SynthesizeSkip {
    fn name(&self) -> &str {
        "synthesize_skip"
    }

    fn rewrite_grammar(&self, grammar: &Grammar) -> Option<Grammar> {
        if grammar.explicit_trivia() || grammar.get(SKIP_RULE).is_some() {
            return None;
        }
        let body = grammar.trivia_expr()?;
        let mut next = grammar.clone();
        next.push_rule(Rule::new(SKIP_RULE, Modifiers::SILENT, body)).ok()?;
        next.set_explicit_trivia(true);
        Some(next)
    }

    fn rewrite(&self, expr: &Expr, cx: &PassContext<'_>) -> Option<Expr> {
        if !cx.grammar().explicit_trivia() || cx.rule().name == SKIP_RULE {
            return None;
        }
        let modifiers = cx.rule().effective_modifiers();
        if modifiers.contains(Modifiers::ATOMIC) || modifiers.contains(Modifiers::COMPOUND) {
            return None;
        }
        let Expr::Seq(items) = expr else {
            return None;
        };
        if items.len() < 2 || items.iter().any(|item| matches!(item, Expr::Trivia)) {
            return None;
        }
        let mut interleaved = Vec::with_capacity(items.len() * 2 - 1);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                interleaved.push(Expr::Trivia);
            }
            interleaved.push(item.clone());
        }
        Some(Expr::Seq(interleaved))
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::{Expr, Grammar};
    use crate::optimizer::{optimize_with_log, PassList, SynthesizeSkip};

    #[test]
    fn test_synthesize_skip_rule() {
        let source = r##"
            WHITESPACE = _{ " " }
            COMMENT = _{ "#" ~ (!"\n" ~ ANY)* }
            pair = { key ~ "=" ~ key }
            key = @{ "a" ~ "b" }
        "##;
        let grammar = Grammar::from_source(source).unwrap();
        let (optimized, log) = optimize_with_log(&grammar, &PassList::new().with(SynthesizeSkip));
        assert!(optimized.explicit_trivia());

        let skip = optimized.get("SKIP").unwrap();
        assert!(skip.is_silent());
        assert_eq!(skip.expr.to_string(), "(WHITESPACE | COMMENT)*");

        assert_eq!(
            optimized.get("pair").unwrap().expr.to_string(),
            "key ~ SKIP ~ \"=\" ~ SKIP ~ key"
        );
        assert_eq!(optimized.get("key").unwrap().expr.to_string(), r#""a" ~ "b""#);
        assert_eq!(
            optimized.get("COMMENT").unwrap().expr,
            grammar.get("COMMENT").unwrap().expr
        );
        assert_eq!(log.by_pass("synthesize_skip").next().map(|e| e.rule.as_str()), Some("SKIP"));
    }

    #[test]
    fn test_no_trivia_rules() {
        let grammar = Grammar::from_source(r#"r = { "a" ~ "b" }"#).unwrap();
        let (optimized, log) = optimize_with_log(&grammar, &PassList::new().with(SynthesizeSkip));
        assert_eq!(optimized, grammar);
        assert!(log.is_empty());
    }

    #[test]
    fn test_nested_sequences_interleaved_once() {
        let source = r#"
            WHITESPACE = _{ " " }
            r = { "a" ~ ("b" ~ "c")* }
        "#;
        let grammar = Grammar::from_source(source).unwrap();
        let (optimized, _) = optimize_with_log(&grammar, &PassList::new().with(SynthesizeSkip));
        let body = &optimized.get("r").unwrap().expr;
        let mut trivia = 0;
        body.walk(&mut |e| {
            if matches!(e, Expr::Trivia) {
                trivia += 1;
            }
        });
        assert_eq!(trivia, 2);
    }
}
