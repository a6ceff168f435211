//! Closure compiler
//!
//! Lowers every rule body once into a tree of boxed closures. Rule
//! references become indices, built-ins are expanded, patterns are
//! compiled and terminator finders are built ahead of time, so a parse
//! does no lookups by name. Every closure bottoms out in the same
//! [`ParserState`] combinators the interpreter uses.

use crate::error::{Expected, GrammarError, ParseError};
use crate::meta::builtins;
use crate::meta::expr::Expr;
use crate::meta::grammar::Grammar;
use crate::parser::ParserConfig;
use crate::regex_cache;
use crate::runtime::guard;
use crate::runtime::interpreter::describe;
use crate::runtime::pairs::Pairs;
use crate::runtime::state::{Outcome, ParserState, RuleInfo};
use crate::search::TerminatorFinder;
use hashbrown::HashMap;
use regex::Regex;
use std::fmt;

/// A compiled expression
pub type Matcher = Box<dyn for<'i> Fn(&Program, &mut ParserState<'i>) -> Outcome + Send + Sync>;

fn matcher<F>(f: F) -> Matcher
where
    F: for<'i> Fn(&Program, &mut ParserState<'i>) -> Outcome + Send + Sync + 'static,
{
    Box::new(f)
}

struct CompiledRule {
    info: RuleInfo,
    body: Matcher,
}

/// A grammar compiled to closures
pub struct Program {
    rules: Vec<CompiledRule>,
    index: HashMap<String, usize>,
    trivia: Option<Matcher>,
    config: ParserConfig,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.info.name.as_ref()).collect::<Vec<_>>(),
            )
            .field("trivia", &self.trivia.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Program {
    /// Compile `grammar`
    ///
    /// Fails when a pattern does not compile or an identifier is unresolved.
    pub fn compile(grammar: &Grammar, config: ParserConfig) -> Result<Self, GrammarError> {
        let mut compiler = Compiler {
            grammar,
            rule: "",
        };
        let mut rules = Vec::with_capacity(grammar.len());
        let mut index = HashMap::with_capacity(grammar.len());
        for (i, rule) in grammar.rules().iter().enumerate() {
            compiler.rule = &rule.name;
            rules.push(CompiledRule {
                info: RuleInfo::new(&rule.name, rule.effective_modifiers()),
                body: compiler.compile(&rule.expr)?,
            });
            index.insert(rule.name.clone(), i);
        }
        compiler.rule = builtins::SKIP_RULE;
        let trivia = grammar
            .trivia_expr()
            .map(|expr| compiler.compile(&expr))
            .transpose()?;
        log_debug!("compiled {} rules", rules.len());
        Ok(Self {
            rules,
            index,
            trivia,
            config,
        })
    }

    /// Parse `input` from `start` with `rule` as the start rule
    pub fn parse<'i>(&self, rule: &str, input: &'i str, start: usize) -> Result<Pairs<'i>, ParseError> {
        let index = *self.index.get(rule).ok_or_else(|| ParseError::UnknownRule {
            name: rule.to_string(),
        })?;
        guard::with_parse_stack(&self.config, || {
            let mut state = ParserState::new(input, start, self.config)?;
            let matched = self.call(&mut state, index)?;
            state.finish(matched)
        })
    }

    /// Compiled rule names, in declaration order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.info.name.as_ref())
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules were compiled
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn call(&self, state: &mut ParserState<'_>, index: usize) -> Outcome {
        let rule = &self.rules[index];
        state.rule(&rule.info, |state| (rule.body)(self, state))
    }

    fn skip(&self, state: &mut ParserState<'_>) -> Outcome {
        match &self.trivia {
            Some(trivia) => state.skip(|state| trivia(self, state)),
            None => Ok(true),
        }
    }
}

struct Compiler<'g> {
    grammar: &'g Grammar,
    rule: &'g str,
}

impl Compiler<'_> {
    fn compile_pattern(&self, pattern: &str) -> Result<Regex, GrammarError> {
        regex_cache::compile_anchored(pattern).map_err(|err| GrammarError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
    }

    fn compile_all(&self, items: &[Expr]) -> Result<Vec<Matcher>, GrammarError> {
        items.iter().map(|item| self.compile(item)).collect()
    }

    fn repeat(&self, inner: &Expr, min: u32, max: Option<u32>) -> Result<Matcher, GrammarError> {
        let m = self.compile(inner)?;
        Ok(matcher(move |p, s| {
            s.repeat(min, max, |s| m(p, s), |s| p.skip(s))
        }))
    }

    fn compile(&self, expr: &Expr) -> Result<Matcher, GrammarError> {
        let compiled = match expr {
            Expr::Str(value) => {
                let value = value.clone();
                matcher(move |_, s| Ok(s.match_string(&value)))
            }
            Expr::Insens(value) => {
                let value = value.clone();
                matcher(move |_, s| Ok(s.match_insensitive(&value)))
            }
            Expr::Range(start, end) => {
                let (start, end) = (*start, *end);
                matcher(move |_, s| Ok(s.match_range(start, end)))
            }
            Expr::Any => matcher(|_, s| Ok(s.match_any())),
            Expr::Soi => matcher(|_, s| Ok(s.match_soi())),
            Expr::Eoi => matcher(|_, s| Ok(s.match_eoi())),
            Expr::Regex(term) => {
                let regex = self.compile_pattern(&term.pattern)?;
                let name = term.name.clone();
                matcher(move |_, s| Ok(s.match_pattern(&regex, || Expected::Builtin(name.clone()))))
            }
            Expr::ChoiceRegex(choice) => {
                let regex = self.compile_pattern(&choice.pattern)?;
                let choice = choice.clone();
                matcher(move |_, s| Ok(s.match_choice_with(&choice, &regex)))
            }
            Expr::SkipUntil(terminators) => {
                let finder = TerminatorFinder::new(terminators);
                matcher(move |_, s| Ok(s.skip_until_with(&finder, finder.terminators())))
            }
            Expr::Ident(name) => match self.grammar.index_of(name) {
                Some(index) => matcher(move |p, s| p.call(s, index)),
                None => match builtins::expand(name) {
                    Some(expansion) => self.compile(&expansion)?,
                    None => {
                        return Err(GrammarError::UnresolvedRule {
                            name: name.clone(),
                            rule: self.rule.to_string(),
                        })
                    }
                },
            },
            Expr::NegatedTerminal(inner) | Expr::NegPred(inner) => {
                let described = describe(inner, self.grammar);
                let m = self.compile(inner)?;
                matcher(move |p, s| s.not(|| described.iter().cloned(), |s| m(p, s)))
            }
            Expr::PosPred(inner) => {
                let m = self.compile(inner)?;
                matcher(move |p, s| s.lookahead(true, |s| m(p, s)))
            }
            Expr::Push(inner) => {
                let m = self.compile(inner)?;
                matcher(move |p, s| s.push(|s| m(p, s)))
            }
            Expr::PushLiteral(value) => {
                let value = value.clone();
                matcher(move |_, s| Ok(s.push_literal(&value)))
            }
            Expr::Peek => matcher(|_, s| Ok(s.peek())),
            Expr::PeekSlice(start, end) => {
                let (start, end) = (*start, *end);
                matcher(move |_, s| Ok(s.peek_slice(start, end)))
            }
            Expr::Pop => matcher(|_, s| s.pop()),
            Expr::PopAll => matcher(|_, s| Ok(s.pop_all())),
            Expr::Drop => matcher(|_, s| s.drop_top()),
            Expr::Seq(items) => {
                let items = self.compile_all(items)?;
                let implicit = !self.grammar.explicit_trivia();
                matcher(move |p, s| {
                    s.sequence(|s| {
                        for (i, item) in items.iter().enumerate() {
                            if implicit && i > 0 && !p.skip(s)? {
                                return Ok(false);
                            }
                            if !item(p, s)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    })
                })
            }
            Expr::Choice(items) => {
                let items = self.compile_all(items)?;
                matcher(move |p, s| {
                    for item in &items {
                        if item(p, s)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                })
            }
            Expr::Group(inner) => self.compile(inner)?,
            Expr::Opt(inner) => {
                let m = self.compile(inner)?;
                matcher(move |p, s| s.optional(|s| m(p, s)))
            }
            Expr::Rep(inner) => self.repeat(inner, 0, None)?,
            Expr::RepOnce(inner) => self.repeat(inner, 1, None)?,
            Expr::RepExact(inner, n) => self.repeat(inner, *n, Some(*n))?,
            Expr::RepMin(inner, n) => self.repeat(inner, *n, None)?,
            Expr::RepMax(inner, n) => self.repeat(inner, 0, Some(*n))?,
            Expr::RepRange(inner, min, max) => self.repeat(inner, *min, Some(*max))?,
            Expr::Tag(tag, inner) => {
                let tag = tag.clone();
                let m = self.compile(inner)?;
                matcher(move |p, s| s.tagged(&tag, |s| m(p, s)))
            }
            Expr::Trivia => matcher(|p, s| p.skip(s)),
        };
        Ok(compiled)
    }
}
