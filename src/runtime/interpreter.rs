//! Tree-walking interpreter
//!
//! Evaluates a [`Grammar`] directly: every expression node is dispatched
//! through one exhaustive `match` onto the [`ParserState`] combinators.
//! Rule references are resolved by name through the grammar on each call.

use super::guard;
use super::pairs::Pairs;
use super::state::{Outcome, ParserState, RuleInfo};
use crate::error::{Expected, ParseError};
use crate::meta::builtins;
use crate::meta::expr::Expr;
use crate::meta::grammar::{Grammar, Modifiers};
use crate::parser::ParserConfig;
use hashbrown::HashMap;

/// Silent rules are looked through this many levels deep when describing
const DESCRIBE_DEPTH: usize = 16;

/// Direct interpreter over a grammar
#[derive(Debug, Clone)]
pub struct Interpreter {
    grammar: Grammar,
    infos: Vec<RuleInfo>,
    builtins: HashMap<String, Expr>,
    trivia: Option<Expr>,
    config: ParserConfig,
}

impl Interpreter {
    /// Prepare `grammar` for interpretation
    pub fn new(grammar: Grammar, config: ParserConfig) -> Self {
        let infos = grammar
            .rules()
            .iter()
            .map(|rule| RuleInfo::new(&rule.name, rule.effective_modifiers()))
            .collect();
        let mut expansions = HashMap::new();
        for rule in grammar.rules() {
            rule.expr.walk(&mut |expr| {
                if let Expr::Ident(name) = expr {
                    if grammar.get(name).is_none() && !expansions.contains_key(name) {
                        if let Some(expansion) = builtins::expand(name) {
                            expansions.insert(name.clone(), expansion);
                        }
                    }
                }
            });
        }
        let trivia = grammar.trivia_expr();
        Self {
            grammar,
            infos,
            builtins: expansions,
            trivia,
            config,
        }
    }

    /// The interpreted grammar
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Runtime limits applied to each parse
    pub fn config(&self) -> ParserConfig {
        self.config
    }

    /// Parse `input` from `start` with `rule` as the start rule
    pub fn parse<'i>(&self, rule: &str, input: &'i str, start: usize) -> Result<Pairs<'i>, ParseError> {
        let index = self
            .grammar
            .index_of(rule)
            .ok_or_else(|| ParseError::UnknownRule {
                name: rule.to_string(),
            })?;
        guard::with_parse_stack(&self.config, || {
            let mut state = ParserState::new(input, start, self.config)?;
            let matched = self.call(&mut state, index)?;
            state.finish(matched)
        })
    }

    fn call(&self, state: &mut ParserState<'_>, index: usize) -> Outcome {
        let body = &self.grammar.rules()[index].expr;
        state.rule(&self.infos[index], |state| self.eval(state, body))
    }

    fn skip(&self, state: &mut ParserState<'_>) -> Outcome {
        match &self.trivia {
            Some(trivia) => state.skip(|state| self.eval(state, trivia)),
            None => Ok(true),
        }
    }

    fn repeat(&self, state: &mut ParserState<'_>, inner: &Expr, min: u32, max: Option<u32>) -> Outcome {
        state.repeat(
            min,
            max,
            |state| self.eval(state, inner),
            |state| self.skip(state),
        )
    }

    /// Evaluate one expression at the current position
    pub fn eval(&self, state: &mut ParserState<'_>, expr: &Expr) -> Outcome {
        match expr {
            Expr::Str(value) => Ok(state.match_string(value)),
            Expr::Insens(value) => Ok(state.match_insensitive(value)),
            Expr::Range(start, end) => Ok(state.match_range(*start, *end)),
            Expr::Any => Ok(state.match_any()),
            Expr::Soi => Ok(state.match_soi()),
            Expr::Eoi => Ok(state.match_eoi()),
            Expr::Regex(term) => state.match_regex(term),
            Expr::ChoiceRegex(choice) => state.match_choice_regex(choice),
            Expr::SkipUntil(terminators) => Ok(state.skip_until(terminators)),
            Expr::Ident(name) => match self.grammar.index_of(name) {
                Some(index) => self.call(state, index),
                None => match self.builtins.get(name) {
                    Some(expansion) => self.eval(state, expansion),
                    None => Err(ParseError::UnknownRule { name: name.clone() }),
                },
            },
            Expr::NegatedTerminal(inner) | Expr::NegPred(inner) => state.not(
                || describe(inner, &self.grammar),
                |state| self.eval(state, inner),
            ),
            Expr::PosPred(inner) => state.lookahead(true, |state| self.eval(state, inner)),
            Expr::Push(inner) => state.push(|state| self.eval(state, inner)),
            Expr::PushLiteral(value) => Ok(state.push_literal(value)),
            Expr::Peek => Ok(state.peek()),
            Expr::PeekSlice(start, end) => Ok(state.peek_slice(*start, *end)),
            Expr::Pop => state.pop(),
            Expr::PopAll => Ok(state.pop_all()),
            Expr::Drop => state.drop_top(),
            Expr::Seq(items) => {
                let implicit = !self.grammar.explicit_trivia();
                state.sequence(|state| {
                    for (i, item) in items.iter().enumerate() {
                        if implicit && i > 0 && !self.skip(state)? {
                            return Ok(false);
                        }
                        if !self.eval(state, item)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                })
            }
            Expr::Choice(items) => {
                for item in items {
                    if self.eval(state, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Group(inner) => self.eval(state, inner),
            Expr::Opt(inner) => state.optional(|state| self.eval(state, inner)),
            Expr::Rep(inner) => self.repeat(state, inner, 0, None),
            Expr::RepOnce(inner) => self.repeat(state, inner, 1, None),
            Expr::RepExact(inner, n) => self.repeat(state, inner, *n, Some(*n)),
            Expr::RepMin(inner, n) => self.repeat(state, inner, *n, None),
            Expr::RepMax(inner, n) => self.repeat(state, inner, 0, Some(*n)),
            Expr::RepRange(inner, min, max) => self.repeat(state, inner, *min, Some(*max)),
            Expr::Tag(tag, inner) => state.tagged(tag, |state| self.eval(state, inner)),
            Expr::Trivia => self.skip(state),
        }
    }
}

/// What `expr` expects at its start position
///
/// Recorded as forbidden when a negative predicate over `expr` fails. Silent
/// rules and built-ins are described by their bodies, other rules by name.
pub fn describe(expr: &Expr, grammar: &Grammar) -> Vec<Expected> {
    let mut out = Vec::new();
    describe_into(expr, grammar, 0, &mut out);
    out
}

fn describe_into(expr: &Expr, grammar: &Grammar, depth: usize, out: &mut Vec<Expected>) {
    fn add(expected: Expected, out: &mut Vec<Expected>) {
        if !out.contains(&expected) {
            out.push(expected);
        }
    }
    match expr {
        Expr::Str(value) => add(Expected::Literal(value.clone()), out),
        Expr::Insens(value) => add(Expected::Insensitive(value.clone()), out),
        Expr::Range(start, end) => add(Expected::Range(*start, *end), out),
        Expr::Any => add(Expected::builtin("ANY"), out),
        Expr::Soi => add(Expected::builtin("SOI"), out),
        Expr::Eoi => add(Expected::builtin("EOI"), out),
        Expr::Regex(term) => add(Expected::Builtin(term.name.clone()), out),
        Expr::ChoiceRegex(choice) => {
            for expected in choice.expected() {
                add(expected, out);
            }
        }
        Expr::Ident(name) => match grammar.get(name) {
            Some(rule) if rule.modifiers.contains(Modifiers::SILENT) => {
                if depth < DESCRIBE_DEPTH {
                    describe_into(&rule.expr, grammar, depth + 1, out);
                }
            }
            Some(_) => add(Expected::Rule(name.clone()), out),
            None => {
                if let Some(expansion) = builtins::expand(name) {
                    describe_into(&expansion, grammar, depth, out);
                }
            }
        },
        Expr::Choice(items) => {
            for item in items {
                describe_into(item, grammar, depth, out);
            }
        }
        Expr::Seq(items) => {
            if let Some(first) = items.iter().find(|item| !matches!(item, Expr::Trivia)) {
                describe_into(first, grammar, depth, out);
            }
        }
        Expr::Group(inner)
        | Expr::Opt(inner)
        | Expr::Rep(inner)
        | Expr::RepOnce(inner)
        | Expr::RepExact(inner, _)
        | Expr::RepMin(inner, _)
        | Expr::RepMax(inner, _)
        | Expr::RepRange(inner, _, _)
        | Expr::Tag(_, inner)
        | Expr::Push(inner) => describe_into(inner, grammar, depth, out),
        Expr::SkipUntil(_)
        | Expr::NegatedTerminal(_)
        | Expr::NegPred(_)
        | Expr::PosPred(_)
        | Expr::PushLiteral(_)
        | Expr::Peek
        | Expr::PeekSlice(..)
        | Expr::Pop
        | Expr::PopAll
        | Expr::Drop
        | Expr::Trivia => {}
    }
}
