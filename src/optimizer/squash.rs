//! Squash a choice of terminals into one pattern
//!
//! A choice whose alternatives are all literals, case-insensitive
//! literals, ranges or Unicode classes becomes a single
//! [`Expr::ChoiceRegex`]. The pattern keeps ordered-choice semantics and
//! the alternatives are kept for diagnostics.

use super::{Pass, PassContext};
use crate::meta::expr::{ChoiceAtom, ChoiceRegex, Expr};

/// Collapses terminal-only choices into a compiled pattern
#[derive(Debug, Clone, Copy, Default)]
pub struct SquashChoice;

impl Pass for SquashChoice {
    fn name(&self) -> &str {
        "squash_choice"
    }

    fn rewrite(&self, expr: &Expr, _cx: &PassContext<'_>) -> Option<Expr> {
        let Expr::Choice(items) = expr else {
            return None;
        };
        if items.len() < 2 {
            return None;
        }
        let mut atoms = Vec::new();
        for item in items {
            collect_atoms(item.ungroup(), &mut atoms)?;
        }
        Some(Expr::ChoiceRegex(ChoiceRegex::new(atoms)))
    }
}

fn collect_atoms(expr: &Expr, atoms: &mut Vec<ChoiceAtom>) -> Option<()> {
    match expr {
        Expr::Str(value) if !value.is_empty() => atoms.push(ChoiceAtom::Literal(value.clone())),
        Expr::Insens(value) if !value.is_empty() => {
            atoms.push(ChoiceAtom::Insensitive(value.clone()))
        }
        Expr::Range(start, end) => atoms.push(ChoiceAtom::Range(*start, *end)),
        Expr::Regex(term) => atoms.push(ChoiceAtom::Class {
            name: term.name.clone(),
            pattern: term.pattern.clone(),
        }),
        Expr::ChoiceRegex(choice) => atoms.extend(choice.atoms.iter().cloned()),
        _ => return None,
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use crate::meta::expr::ChoiceAtom;
    use crate::meta::{Expr, Grammar};
    use crate::optimizer::{optimize, InlineRules, PassList, SquashChoice};

    fn squash(source: &str, passes: PassList) -> Expr {
        let grammar = Grammar::from_source(source).unwrap();
        optimize(&grammar, &passes).get("r").unwrap().expr.clone()
    }

    #[test]
    fn test_squash_literals_and_ranges() {
        let expr = squash(
            r#"r = { "+" | 'a'..'c' | 'd'..'f' | "==" }"#,
            PassList::new().with(SquashChoice),
        );
        let Expr::ChoiceRegex(choice) = expr else {
            panic!("expected a squashed choice");
        };
        assert_eq!(choice.pattern, r"[\+a-f]|==");
        assert_eq!(choice.atoms.len(), 4);
    }

    #[test]
    fn test_squash_through_inlined_builtins() {
        let expr = squash(
            "r = { ASCII_ALPHA | ASCII_DIGIT | \"_\" }",
            PassList::new().with(InlineRules).with(SquashChoice),
        );
        let Expr::ChoiceRegex(choice) = expr else {
            panic!("expected a squashed choice");
        };
        assert_eq!(choice.pattern, "[0-9A-Z_a-z]");
        assert_eq!(
            choice.atoms,
            vec![
                ChoiceAtom::Range('a', 'z'),
                ChoiceAtom::Range('A', 'Z'),
                ChoiceAtom::Range('0', '9'),
                ChoiceAtom::Literal("_".into()),
            ]
        );
    }

    #[test]
    fn test_no_squash_with_non_terminal_alternative() {
        let expr = squash(
            r#"r = { "a" | "b" ~ "c" }"#,
            PassList::new().with(SquashChoice),
        );
        assert!(matches!(expr, Expr::Choice(_)));
    }
}
