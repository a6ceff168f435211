//! Collapse negated terminals
//!
//! `!t` over a single terminal becomes one [`Expr::NegatedTerminal`]
//! check.

use super::{Pass, PassContext};
use crate::meta::expr::Expr;

/// Rewrites `!terminal` into a negated-terminal node
#[derive(Debug, Clone, Copy, Default)]
pub struct CollapseNegation;

impl Pass for CollapseNegation {
    fn name(&self) -> &str {
        "collapse_negation"
    }

    fn rewrite(&self, expr: &Expr, _cx: &PassContext<'_>) -> Option<Expr> {
        match expr {
            Expr::NegPred(inner) if inner.ungroup().is_terminal() => {
                Some(Expr::NegatedTerminal(Box::new(inner.ungroup().clone())))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::{Expr, Grammar};
    use crate::optimizer::{optimize, CollapseNegation, PassList};

    #[test]
    fn test_collapse_terminal() {
        let grammar = Grammar::from_source(r#"r = { !("a") ~ ANY }"#).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(CollapseNegation));
        let Expr::Seq(items) = &optimized.get("r").unwrap().expr else {
            panic!("expected a sequence");
        };
        assert_eq!(
            items[0],
            Expr::NegatedTerminal(Box::new(Expr::Str("a".into())))
        );
    }

    #[test]
    fn test_keep_complex_predicates() {
        let grammar = Grammar::from_source(r#"r = { !("a" ~ "b") ~ !rule ~ ANY } rule = { "c" }"#).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(CollapseNegation));
        assert_eq!(optimized, grammar);
    }
}
