//! Grammar optimizer
//!
//! A rewrite pipeline over rule bodies. Each rewrite is a [`Pass`]; an
//! explicit, ordered [`PassList`] says which passes run and in what order.
//! There is no global registry.
//!
//! # Traversal
//!
//! Bodies are rewritten bottom-up: a node is offered to the passes only
//! after its children are in normal form. Passes are tried in list order
//! and the first one to return a different node wins; the replacement is
//! then normalized again from the top, so later passes see it too. Rounds
//! repeat over the whole grammar until nothing changes, which makes
//! `optimize(optimize(g)) == optimize(g)`.
//!
//! # Example
//!
//! ```
//! use pestle::meta::{Expr, Grammar};
//! use pestle::optimizer::{optimize, PassList};
//!
//! let grammar = Grammar::from_source(r#"r = { (!"," ~ ANY)* }"#).unwrap();
//! let optimized = optimize(&grammar, &PassList::default_passes());
//! assert_eq!(
//!     optimized.get("r").unwrap().expr,
//!     Expr::SkipUntil(vec![",".to_string()])
//! );
//! ```

mod inline;
mod negation;
mod skip_rule;
mod skip_until;
mod squash;
mod unroll;

pub use inline::InlineRules;
pub use negation::CollapseNegation;
pub use skip_rule::SynthesizeSkip;
pub use skip_until::SkipUntil;
pub use squash::SquashChoice;
pub use unroll::UnrollRepetition;

use crate::meta::analysis::GrammarAnalyzer;
use crate::meta::expr::Expr;
use crate::meta::grammar::{Grammar, Modifiers, Rule};
use ahash::AHashSet;
use std::fmt;
use std::sync::Arc;

/// Whole-grammar rounds before the optimizer gives up
const MAX_ROUNDS: usize = 32;

/// Consecutive rewrites of one node before a pass is considered non-terminating
const MAX_CHAIN: usize = 64;

// ============================================================================
// Pass Trait
// ============================================================================

/// A semantics-preserving rewrite
///
/// `rewrite` is called on every node, children first. Returning `None` or
/// an equal node means the pass does not apply.
pub trait Pass: Send + Sync {
    /// Name used in the optimization log
    fn name(&self) -> &str;

    /// Grammar-level rewrite, run once at the start of each round
    fn rewrite_grammar(&self, _grammar: &Grammar) -> Option<Grammar> {
        None
    }

    /// Node-level rewrite
    fn rewrite(&self, expr: &Expr, cx: &PassContext<'_>) -> Option<Expr>;
}

/// What a pass may know about the node being rewritten
pub struct PassContext<'a> {
    grammar: &'a Grammar,
    rule: &'a Rule,
    recursive: &'a AHashSet<String>,
}

impl<'a> PassContext<'a> {
    /// Build a context for a node inside `rule`
    pub fn new(grammar: &'a Grammar, rule: &'a Rule, recursive: &'a AHashSet<String>) -> Self {
        Self {
            grammar,
            rule,
            recursive,
        }
    }

    /// Grammar snapshot taken at the start of the round
    pub fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    /// Rule whose body is being rewritten
    pub fn rule(&self) -> &'a Rule {
        self.rule
    }

    /// True when `name` takes part in a reference cycle
    pub fn is_recursive(&self, name: &str) -> bool {
        self.recursive.contains(name)
    }

    /// True when no trivia can ever be skipped inside this rule's body
    pub fn trivia_free(&self) -> bool {
        let modifiers = self.rule.effective_modifiers();
        modifiers.contains(Modifiers::ATOMIC)
            || modifiers.contains(Modifiers::COMPOUND)
            || !self.grammar.has_trivia()
    }
}

// ============================================================================
// Pass List
// ============================================================================

/// An ordered list of passes
#[derive(Clone, Default)]
pub struct PassList {
    passes: Vec<Arc<dyn Pass>>,
}

impl PassList {
    /// An empty list; optimizing with it is the identity
    pub fn new() -> Self {
        Self::default()
    }

    /// The default pipeline
    pub fn default_passes() -> Self {
        Self::new()
            .with(SynthesizeSkip)
            .with(InlineRules)
            .with(UnrollRepetition)
            .with(SquashChoice)
            .with(CollapseNegation)
            .with(SkipUntil)
    }

    /// Append a pass
    pub fn with(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Arc::new(pass));
        self
    }

    /// Pass names in order
    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Number of passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// True when the list has no passes
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &dyn Pass> {
        self.passes.iter().map(|p| p.as_ref())
    }
}

impl fmt::Debug for PassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ============================================================================
// Optimization Log
// ============================================================================

/// One applied rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Pass that fired
    pub pass: String,
    /// Rule whose body changed
    pub rule: String,
    /// Node before the rewrite, in grammar syntax
    pub before: String,
    /// Node after the rewrite, in grammar syntax
    pub after: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} => {}", self.pass, self.rule, self.before, self.after)
    }
}

/// Every rewrite applied, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationLog {
    entries: Vec<LogEntry>,
}

impl OptimizationLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, pass: &str, rule: &str, before: String, after: String) {
        log_debug!("[{}] {}: {} => {}", pass, rule, before, after);
        self.entries.push(LogEntry {
            pass: pass.to_string(),
            rule: rule.to_string(),
            before,
            after,
        });
    }

    /// Entries in application order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of rewrites
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was rewritten
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries produced by `pass`
    pub fn by_pass<'a>(&'a self, pass: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries.iter().filter(move |e| e.pass == pass)
    }
}

impl fmt::Display for OptimizationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Optimize `grammar` with `passes`
pub fn optimize(grammar: &Grammar, passes: &PassList) -> Grammar {
    optimize_with_log(grammar, passes).0
}

/// Optimize `grammar` with `passes`, recording every rewrite
///
/// # Panics
/// Panics when the passes do not reach a fixed point; that is a bug in a
/// pass, not in the grammar.
pub fn optimize_with_log(grammar: &Grammar, passes: &PassList) -> (Grammar, OptimizationLog) {
    let mut log = OptimizationLog::new();
    let mut current = grammar.clone();
    if passes.is_empty() {
        return (current, log);
    }

    for round in 0..MAX_ROUNDS {
        let mut changed = false;

        for pass in passes.iter() {
            if let Some(next) = pass.rewrite_grammar(&current) {
                if next != current {
                    log_grammar_change(&mut log, pass.name(), &current, &next);
                    current = next;
                    changed = true;
                }
            }
        }

        let recursive = GrammarAnalyzer::new(&current).recursive_rules();
        let bodies: Vec<Expr> = current
            .rules()
            .iter()
            .map(|rule| {
                let cx = PassContext::new(&current, rule, &recursive);
                rewrite_node(&rule.expr, passes, &cx, &mut log, &mut changed, 0)
            })
            .collect();
        current = current.with_bodies(bodies);

        log_debug!("optimizer round {} done, changed: {}", round + 1, changed);
        if !changed {
            return (current, log);
        }
    }

    panic!(
        "optimizer did not reach a fixed point after {} rounds with passes {:?}",
        MAX_ROUNDS, passes
    );
}

fn log_grammar_change(log: &mut OptimizationLog, pass: &str, before: &Grammar, after: &Grammar) {
    for rule in after.rules() {
        match before.get(&rule.name) {
            None => log.record(pass, &rule.name, "(none)".to_string(), rule.to_string()),
            Some(old) if old != rule => log.record(pass, &rule.name, old.to_string(), rule.to_string()),
            Some(_) => {}
        }
    }
}

fn rewrite_node(
    expr: &Expr,
    passes: &PassList,
    cx: &PassContext<'_>,
    log: &mut OptimizationLog,
    changed: &mut bool,
    chain: usize,
) -> Expr {
    assert!(
        chain <= MAX_CHAIN,
        "optimizer passes keep rewriting `{}` in rule `{}`",
        expr,
        cx.rule().name
    );
    let children = expr.children();
    let node = if children.is_empty() {
        expr.clone()
    } else {
        let rewritten = children
            .into_iter()
            .map(|child| rewrite_node(child, passes, cx, log, changed, 0))
            .collect();
        expr.with_children(rewritten)
    };

    for pass in passes.iter() {
        if let Some(next) = pass.rewrite(&node, cx) {
            if next != node {
                log.record(pass.name(), &cx.rule().name, node.to_string(), next.to_string());
                *changed = true;
                return rewrite_node(&next, passes, cx, log, changed, chain + 1);
            }
        }
    }
    node
}
