//! Unroll bounded repetition
//!
//! `e{n}` becomes `n` copies of `e`, `e{n,}` and `e+` become the required
//! copies followed by `e*`, and `e{,n}` / `e{n,m}` pad with optional
//! copies. Only fires where no trivia can be skipped, because a sequence
//! skips trivia before its first copy where a repetition would not.

use super::{Pass, PassContext};
use crate::meta::expr::Expr;

/// Largest number of copies the pass will produce
const MAX_COPIES: u32 = 16;

/// Expands bounded quantifiers into explicit sequences
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrollRepetition;

impl Pass for UnrollRepetition {
    fn name(&self) -> &str {
        "unroll_repetition"
    }

    fn rewrite(&self, expr: &Expr, cx: &PassContext<'_>) -> Option<Expr> {
        if !cx.trivia_free() {
            return None;
        }
        let (inner, required, optional, tail) = match expr {
            Expr::RepOnce(inner) => (inner, 1, 0, true),
            Expr::RepExact(inner, n) => (inner, *n, 0, false),
            Expr::RepMin(inner, n) => (inner, *n, 0, true),
            Expr::RepMax(inner, n) => (inner, 0, *n, false),
            Expr::RepRange(inner, min, max) => (inner, *min, max.saturating_sub(*min), false),
            _ => return None,
        };
        let copies = required.checked_add(optional)?;
        if copies == 0 || copies > MAX_COPIES {
            return None;
        }

        let inner = inner.as_ref();
        let mut items: Vec<Expr> = Vec::with_capacity(copies as usize + 1);
        items.extend((0..required).map(|_| inner.clone()));
        items.extend((0..optional).map(|_| Expr::Opt(Box::new(inner.clone()))));
        if tail {
            items.push(Expr::Rep(Box::new(inner.clone())));
        }
        Some(match items.len() {
            1 => items.remove(0),
            _ => Expr::Seq(items),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::Grammar;
    use crate::optimizer::{optimize, PassList, UnrollRepetition};

    fn unroll(source: &str) -> String {
        let grammar = Grammar::from_source(source).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(UnrollRepetition));
        optimized.get("r").unwrap().expr.to_string()
    }

    #[test]
    fn test_unroll_shapes() {
        assert_eq!(unroll(r#"r = { "a"{3} }"#), r#""a" ~ "a" ~ "a""#);
        assert_eq!(unroll(r#"r = { "a"{1} }"#), r#""a""#);
        assert_eq!(unroll(r#"r = { "a"+ }"#), r#""a" ~ "a"*"#);
        assert_eq!(unroll(r#"r = { "a"{2,} }"#), r#""a" ~ "a" ~ "a"*"#);
        assert_eq!(unroll(r#"r = { "a"{,2} }"#), r#""a"? ~ "a"?"#);
        assert_eq!(unroll(r#"r = { "a"{1,3} }"#), r#""a" ~ "a"? ~ "a"?"#);
    }

    #[test]
    fn test_no_unroll_for_zero_or_large_counts() {
        assert_eq!(unroll(r#"r = { "a"{0} }"#), r#""a"{0}"#);
        assert_eq!(unroll(r#"r = { "a"{17} }"#), r#""a"{17}"#);
        assert_eq!(unroll(r#"r = { "a"{10,20} }"#), r#""a"{10,20}"#);
    }

    #[test]
    fn test_no_unroll_where_trivia_applies() {
        let source = r#"
            WHITESPACE = _{ " " }
            r = { "a"{2} }
            s = @{ "a"{2} }
        "#;
        let grammar = Grammar::from_source(source).unwrap();
        let optimized = optimize(&grammar, &PassList::new().with(UnrollRepetition));
        assert_eq!(optimized.get("r").unwrap().expr.to_string(), r#""a"{2}"#);
        assert_eq!(optimized.get("s").unwrap().expr.to_string(), r#""a" ~ "a""#);
    }
}
