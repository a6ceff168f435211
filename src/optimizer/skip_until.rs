//! Detect the scan-until idiom
//!
//! `(!X ~ ANY)*`, where `X` is a literal or a choice of literals, consumes
//! input up to the next occurrence of any of the literals. It becomes one
//! [`Expr::SkipUntil`] node that searches for the terminators directly.
//! Only fires where no trivia can be skipped between iterations.

use super::{Pass, PassContext};
use crate::meta::expr::{ChoiceAtom, Expr};
use crate::meta::grammar::{Grammar, Modifiers};

/// Silent rules followed while resolving terminators
const MAX_RESOLVE_DEPTH: usize = 16;

/// Replaces `(!X ~ ANY)*` with a terminator search
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipUntil;

impl Pass for SkipUntil {
    fn name(&self) -> &str {
        "skip_until"
    }

    fn rewrite(&self, expr: &Expr, cx: &PassContext<'_>) -> Option<Expr> {
        if !cx.trivia_free() {
            return None;
        }
        let Expr::Rep(body) = expr else {
            return None;
        };
        let Expr::Seq(items) = body.ungroup() else {
            return None;
        };
        let items: Vec<&Expr> = items.iter().filter(|e| !matches!(e, Expr::Trivia)).collect();
        let [guard, any] = items.as_slice() else {
            return None;
        };
        let is_any = match any.ungroup() {
            Expr::Any => true,
            Expr::Ident(name) => name == "ANY" && cx.grammar().get(name).is_none(),
            _ => false,
        };
        if !is_any {
            return None;
        }
        let negated = match guard.ungroup() {
            Expr::NegPred(inner) | Expr::NegatedTerminal(inner) => inner,
            _ => return None,
        };
        let mut terminators = Vec::new();
        terminators_of(negated, cx.grammar(), 0, &mut terminators)?;
        Some(Expr::SkipUntil(terminators))
    }
}

fn terminators_of(
    expr: &Expr,
    grammar: &Grammar,
    depth: usize,
    out: &mut Vec<String>,
) -> Option<()> {
    fn add(literal: &str, out: &mut Vec<String>) {
        if !out.iter().any(|t| t == literal) {
            out.push(literal.to_string());
        }
    }
    match expr.ungroup() {
        Expr::Str(value) if !value.is_empty() => add(value, out),
        Expr::Choice(items) => {
            for item in items {
                terminators_of(item, grammar, depth, out)?;
            }
        }
        Expr::ChoiceRegex(choice) => {
            for atom in &choice.atoms {
                match atom {
                    ChoiceAtom::Literal(value) => add(value, out),
                    _ => return None,
                }
            }
        }
        Expr::Ident(name) if depth < MAX_RESOLVE_DEPTH => {
            let rule = grammar.get(name)?;
            if rule.effective_modifiers() != Modifiers::SILENT {
                return None;
            }
            terminators_of(&rule.expr, grammar, depth + 1, out)?;
        }
        _ => return None,
    }
    Some(())
}
