//! Grammar analysis and warnings
//!
//! Static checks that do not make a grammar invalid but usually point at a
//! mistake:
//! - Left recursion (a PEG loops until the recursion guard trips)
//! - Alternatives shadowed by an earlier literal prefix
//! - Rules unreachable from the first rule
//! - Repetition of an expression that can match the empty string
//! - Repetition bounded to zero iterations
//!
//! The analyzer also computes the set of recursive rules, which the
//! inlining pass uses to avoid unfolding a rule into itself.
//!
//! # Example
//!
//! ```
//! use pestle::meta::{Grammar, GrammarAnalyzer, WarningKind};
//!
//! let grammar = Grammar::from_source(r#"expr = { expr ~ "+" ~ "1" | "1" }"#).unwrap();
//! let warnings = GrammarAnalyzer::new(&grammar).analyze();
//! assert_eq!(warnings[0].kind, WarningKind::LeftRecursion);
//! ```

use super::builtins;
use super::expr::Expr;
use super::grammar::Grammar;
use ahash::{AHashMap, AHashSet};
use std::fmt;

/// Kind of grammar warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A rule can reach itself without consuming input
    ///
    /// Example: `expr = { expr ~ "+" ~ term | term }`
    LeftRecursion,

    /// A later literal alternative can never win
    ///
    /// Example: `"a" | "ab"` never matches `"ab"` as a whole
    UnreachableAlternative,

    /// A rule is not reachable from the first rule
    UnusedRule,

    /// A repeated expression can match the empty string
    NullableRepetition,

    /// `{0}` or `{,0}`: always matches nothing
    UselessRepetition,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftRecursion => write!(f, "left recursion"),
            Self::UnreachableAlternative => write!(f, "unreachable alternative"),
            Self::UnusedRule => write!(f, "unused rule"),
            Self::NullableRepetition => write!(f, "nullable repetition"),
            Self::UselessRepetition => write!(f, "useless repetition"),
        }
    }
}

/// A grammar warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Rule the warning was found in
    pub rule: String,
    /// Human-readable message
    pub message: String,
    /// Related rules (e.g. the left-recursive cycle)
    pub related: Vec<String>,
}

impl GrammarWarning {
    /// Create a new warning
    pub fn new(kind: WarningKind, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule: rule.into(),
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Add related rules to the warning
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[rule {}] {}: {}", self.rule, self.kind, self.message)?;
        if !self.related.is_empty() {
            write!(f, " (via {})", self.related.join(" -> "))?;
        }
        Ok(())
    }
}

/// Grammar analyzer
pub struct GrammarAnalyzer<'a> {
    grammar: &'a Grammar,
    /// Rules that can match the empty string
    nullable: AHashMap<String, bool>,
}

impl<'a> GrammarAnalyzer<'a> {
    /// Create a new analyzer for the given grammar
    pub fn new(grammar: &'a Grammar) -> Self {
        let mut analyzer = Self {
            grammar,
            nullable: AHashMap::new(),
        };
        analyzer.compute_nullable_rules();
        analyzer
    }

    /// Analyze the grammar and return all warnings
    pub fn analyze(&self) -> Vec<GrammarWarning> {
        let mut warnings = Vec::new();
        self.detect_left_recursion(&mut warnings);
        self.detect_unreachable_alternatives(&mut warnings);
        self.detect_unused_rules(&mut warnings);
        self.detect_repetition_problems(&mut warnings);
        warnings
    }

    /// Rules that can (directly or indirectly) refer to themselves
    pub fn recursive_rules(&self) -> AHashSet<String> {
        let graph: AHashMap<&str, Vec<String>> = self
            .grammar
            .rules()
            .iter()
            .map(|rule| (rule.name.as_str(), self.references(&rule.expr)))
            .collect();
        self.grammar
            .rule_names()
            .filter(|name| find_cycle(name, &graph).is_some())
            .map(str::to_string)
            .collect()
    }

    /// True when `expr` can succeed without consuming input
    pub fn is_nullable(&self, expr: &Expr) -> bool {
        nullable(expr, &|name| self.nullable.get(name).copied())
    }

    /// Least fixed point over the rules, starting from "not nullable"
    fn compute_nullable_rules(&mut self) {
        for name in self.grammar.rule_names() {
            self.nullable.insert(name.to_string(), false);
        }
        loop {
            let mut changed = false;
            for rule in self.grammar.rules() {
                if self.nullable.get(&rule.name).copied().unwrap_or(false) {
                    continue;
                }
                if self.is_nullable(&rule.expr) {
                    self.nullable.insert(rule.name.clone(), true);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// User rules referenced anywhere in `expr`
    fn references(&self, expr: &Expr) -> Vec<String> {
        let mut names = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::Ident(name) = e {
                if self.grammar.get(name).is_some() && !names.contains(name) {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// User rules that may be entered at the position `expr` starts at
    fn left_calls(&self, expr: &Expr, out: &mut Vec<String>) {
        match expr {
            Expr::Ident(name) => {
                if self.grammar.get(name).is_some() && !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Seq(items) => {
                for item in items {
                    self.left_calls(item, out);
                    if !self.is_nullable(item) {
                        break;
                    }
                }
            }
            Expr::Choice(items) => {
                for item in items {
                    self.left_calls(item, out);
                }
            }
            other => {
                for child in other.children() {
                    self.left_calls(child, out);
                }
            }
        }
    }

    fn detect_left_recursion(&self, warnings: &mut Vec<GrammarWarning>) {
        let graph: AHashMap<&str, Vec<String>> = self
            .grammar
            .rules()
            .iter()
            .map(|rule| {
                let mut calls = Vec::new();
                self.left_calls(&rule.expr, &mut calls);
                (rule.name.as_str(), calls)
            })
            .collect();

        for rule in self.grammar.rules() {
            if let Some(cycle) = find_cycle(&rule.name, &graph) {
                warnings.push(
                    GrammarWarning::new(
                        WarningKind::LeftRecursion,
                        &rule.name,
                        format!(
                            "rule `{}` can call itself without consuming input",
                            rule.name
                        ),
                    )
                    .with_related(cycle),
                );
            }
        }
    }

    fn detect_unreachable_alternatives(&self, warnings: &mut Vec<GrammarWarning>) {
        for rule in self.grammar.rules() {
            rule.expr.walk(&mut |expr| {
                let Expr::Choice(items) = expr else {
                    return;
                };
                let mut seen: Vec<&str> = Vec::new();
                for item in items {
                    let Expr::Str(value) = item.ungroup() else {
                        continue;
                    };
                    if let Some(prefix) = seen.iter().find(|p| value.starts_with(**p)) {
                        warnings.push(GrammarWarning::new(
                            WarningKind::UnreachableAlternative,
                            &rule.name,
                            format!(
                                "alternative {:?} is shadowed by the earlier {:?}",
                                value, prefix
                            ),
                        ));
                    }
                    seen.push(value);
                }
            });
        }
    }

    fn detect_unused_rules(&self, warnings: &mut Vec<GrammarWarning>) {
        let Some(first) = self.grammar.rules().first() else {
            return;
        };
        let mut reachable = AHashSet::new();
        let mut pending = vec![first.name.clone()];
        pending.extend(
            self.grammar
                .rule_names()
                .filter(|n| builtins::is_trivia_rule(n) || *n == builtins::SKIP_RULE)
                .map(str::to_string),
        );
        while let Some(name) = pending.pop() {
            if !reachable.insert(name.clone()) {
                continue;
            }
            if let Some(rule) = self.grammar.get(&name) {
                pending.extend(self.references(&rule.expr));
            }
        }
        for rule in self.grammar.rules() {
            if !reachable.contains(&rule.name) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnusedRule,
                    &rule.name,
                    format!("rule `{}` is not reachable from `{}`", rule.name, first.name),
                ));
            }
        }
    }

    fn detect_repetition_problems(&self, warnings: &mut Vec<GrammarWarning>) {
        for rule in self.grammar.rules() {
            rule.expr.walk(&mut |expr| match expr {
                Expr::RepExact(_, 0) | Expr::RepMax(_, 0) | Expr::RepRange(_, 0, 0) => {
                    warnings.push(GrammarWarning::new(
                        WarningKind::UselessRepetition,
                        &rule.name,
                        format!("`{}` always matches nothing", expr),
                    ));
                }
                Expr::Rep(inner) | Expr::RepOnce(inner) | Expr::RepMin(inner, _)
                    if self.is_nullable(inner) =>
                {
                    warnings.push(GrammarWarning::new(
                        WarningKind::NullableRepetition,
                        &rule.name,
                        format!("`{}` repeats an expression that can match nothing", expr),
                    ));
                }
                _ => {}
            });
        }
    }
}

/// Nullability of `expr`, with rule nullability supplied by `rule`
fn nullable(expr: &Expr, rule: &dyn Fn(&str) -> Option<bool>) -> bool {
    match expr {
        Expr::Str(value) | Expr::Insens(value) => value.is_empty(),
        Expr::Range(..) | Expr::Any | Expr::Regex(_) | Expr::ChoiceRegex(_) => false,
        Expr::Ident(name) => match rule(name) {
            Some(result) => result,
            None => builtins::expand(name)
                .map(|e| nullable(&e, rule))
                .unwrap_or(false),
        },
        Expr::Soi
        | Expr::Eoi
        | Expr::SkipUntil(_)
        | Expr::NegatedTerminal(_)
        | Expr::PushLiteral(_)
        | Expr::Peek
        | Expr::PeekSlice(..)
        | Expr::Pop
        | Expr::PopAll
        | Expr::Drop
        | Expr::Opt(_)
        | Expr::Rep(_)
        | Expr::RepMax(..)
        | Expr::PosPred(_)
        | Expr::NegPred(_)
        | Expr::Trivia => true,
        Expr::Seq(items) => items.iter().all(|e| nullable(e, rule)),
        Expr::Choice(items) => items.iter().any(|e| nullable(e, rule)),
        Expr::Push(inner) | Expr::Group(inner) | Expr::Tag(_, inner) | Expr::RepOnce(inner) => {
            nullable(inner, rule)
        }
        Expr::RepExact(inner, n) | Expr::RepMin(inner, n) | Expr::RepRange(inner, n, _) => {
            *n == 0 || nullable(inner, rule)
        }
    }
}

/// Path `start -> ... -> start` in `graph`, if one exists
fn find_cycle(start: &str, graph: &AHashMap<&str, Vec<String>>) -> Option<Vec<String>> {
    fn visit(
        current: &str,
        start: &str,
        graph: &AHashMap<&str, Vec<String>>,
        visited: &mut AHashSet<String>,
        path: &mut Vec<String>,
    ) -> bool {
        for next in graph.get(current).into_iter().flatten() {
            if next == start {
                path.push(next.clone());
                return true;
            }
            if visited.insert(next.clone()) {
                path.push(next.clone());
                if visit(next, start, graph, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let mut path = vec![start.to_string()];
    let mut visited = AHashSet::new();
    visit(start, start, graph, &mut visited, &mut path).then_some(path)
}
