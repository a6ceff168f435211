//! Developer tools
//!
//! Text renderings for debugging grammars and parse results:
//!
//! - [`TreePrinter`]: an indented view of a Pair tree
//! - [`GrammarVisualizer`]: an expression tree view of a grammar, plus
//!   Mermaid and GraphViz DOT rule-dependency graphs

use crate::meta::expr::Expr;
use crate::meta::grammar::Grammar;
use crate::runtime::pairs::{Pair, Pairs};

/// Pair tree pretty printer
#[derive(Debug, Clone)]
pub struct TreePrinter {
    indent: String,
    max_depth: Option<usize>,
    show_text: bool,
}

impl TreePrinter {
    /// Create a printer with two-space indentation
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
            show_text: true,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Show or hide matched text
    pub fn show_text(mut self, show: bool) -> Self {
        self.show_text = show;
        self
    }

    /// Render every top-level Pair
    pub fn print(&self, pairs: &Pairs<'_>) -> String {
        let mut output = String::new();
        for pair in pairs.iter() {
            self.print_pair(pair, 0, &mut output);
        }
        output
    }

    /// Render a single Pair and its descendants
    pub fn print_pair_tree(&self, pair: &Pair<'_>) -> String {
        let mut output = String::new();
        self.print_pair(pair, 0, &mut output);
        output
    }

    fn print_pair(&self, pair: &Pair<'_>, depth: usize, output: &mut String) {
        let indent = self.indent.repeat(depth);
        if let Some(max) = self.max_depth {
            if depth > max {
                output.push_str(&format!("{}...\n", indent));
                return;
            }
        }

        output.push_str(&indent);
        if let Some(tag) = pair.tag() {
            output.push_str(&format!("#{} = ", tag));
        }
        output.push_str(&format!("{} {}..{}", pair.rule(), pair.start(), pair.end()));
        if self.show_text && pair.children().is_empty() {
            output.push_str(&format!(" {:?}", pair.as_str()));
        }
        output.push('\n');

        for child in pair.children() {
            self.print_pair(child, depth + 1, output);
        }
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Grammar visualizer
pub struct GrammarVisualizer<'a> {
    grammar: &'a Grammar,
}

impl<'a> GrammarVisualizer<'a> {
    /// Create a visualizer over `grammar`
    pub fn new(grammar: &'a Grammar) -> Self {
        Self { grammar }
    }

    /// Indented expression tree, one block per rule
    pub fn tree_view(&self) -> String {
        let mut output = String::new();
        for rule in self.grammar.rules() {
            output.push_str(&format!(
                "{} = {}{{ }}\n",
                rule.name,
                rule.modifiers.symbols()
            ));
            Self::expr_tree(&rule.expr, 1, &mut output);
        }
        output
    }

    fn expr_tree(expr: &Expr, depth: usize, output: &mut String) {
        output.push_str(&"  ".repeat(depth));
        output.push_str(&Self::label(expr));
        output.push('\n');
        for child in expr.children() {
            Self::expr_tree(child, depth + 1, output);
        }
    }

    /// Rule names referenced from `rule`'s body, in first-use order
    pub fn dependencies(&self, rule: &str) -> Vec<&'a str> {
        let mut deps: Vec<&'a str> = Vec::new();
        if let Some(rule) = self.grammar.get(rule) {
            rule.expr.walk(&mut |expr| {
                if let Expr::Ident(name) = expr {
                    if let Some(target) = self.grammar.get(name) {
                        if !deps.contains(&target.name.as_str()) {
                            deps.push(&target.name);
                        }
                    }
                }
            });
        }
        deps
    }

    /// Mermaid rule-dependency graph
    pub fn to_mermaid(&self) -> String {
        let mut output = String::new();
        output.push_str("graph TD\n");

        for (i, rule) in self.grammar.rules().iter().enumerate() {
            output.push_str(&format!(
                "  r{}[\"{}{}\"]\n",
                i,
                rule.modifiers.symbols(),
                rule.name
            ));
        }
        for (i, rule) in self.grammar.rules().iter().enumerate() {
            for dep in self.dependencies(&rule.name) {
                if let Some(j) = self.grammar.index_of(dep) {
                    output.push_str(&format!("  r{} --> r{}\n", i, j));
                }
            }
        }

        output
    }

    /// GraphViz DOT rule-dependency graph
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph Grammar {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n");

        for (i, rule) in self.grammar.rules().iter().enumerate() {
            let style = if rule.is_silent() { ", style=dashed" } else { "" };
            output.push_str(&format!(
                "  r{} [label=\"{}{}\"{}];\n",
                i,
                rule.modifiers.symbols(),
                rule.name,
                style
            ));
        }
        for (i, rule) in self.grammar.rules().iter().enumerate() {
            for dep in self.dependencies(&rule.name) {
                if let Some(j) = self.grammar.index_of(dep) {
                    output.push_str(&format!("  r{} -> r{};\n", i, j));
                }
            }
        }

        output.push_str("}\n");
        output
    }

    fn label(expr: &Expr) -> String {
        match expr {
            Expr::Str(value) => format!("str({:?})", value),
            Expr::Insens(value) => format!("insens({:?})", value),
            Expr::Range(start, end) => format!("range({:?}..{:?})", start, end),
            Expr::Ident(name) => format!("ident({})", name),
            Expr::Any => "ANY".to_string(),
            Expr::Soi => "SOI".to_string(),
            Expr::Eoi => "EOI".to_string(),
            Expr::Regex(term) => format!("regex({} /{}/)", term.name, term.pattern),
            Expr::ChoiceRegex(choice) => {
                format!("choice_regex({}, /{}/)", choice.atoms.len(), choice.pattern)
            }
            Expr::SkipUntil(terminators) => format!("skip_until({:?})", terminators),
            Expr::NegatedTerminal(_) => "negated_terminal".to_string(),
            Expr::Push(_) => "push".to_string(),
            Expr::PushLiteral(value) => format!("push_literal({:?})", value),
            Expr::Peek => "peek".to_string(),
            Expr::PeekSlice(start, end) => match end {
                Some(end) => format!("peek[{}..{}]", start, end),
                None => format!("peek[{}..]", start),
            },
            Expr::Pop => "pop".to_string(),
            Expr::PopAll => "pop_all".to_string(),
            Expr::Drop => "drop".to_string(),
            Expr::Seq(items) => format!("seq({})", items.len()),
            Expr::Choice(items) => format!("choice({})", items.len()),
            Expr::Group(_) => "group".to_string(),
            Expr::Opt(_) => "opt".to_string(),
            Expr::Rep(_) => "rep(0..)".to_string(),
            Expr::RepOnce(_) => "rep(1..)".to_string(),
            Expr::RepExact(_, n) => format!("rep({}..={})", n, n),
            Expr::RepMin(_, n) => format!("rep({}..)", n),
            Expr::RepMax(_, n) => format!("rep(0..={})", n),
            Expr::RepRange(_, min, max) => format!("rep({}..={})", min, max),
            Expr::PosPred(_) => "lookahead(+)".to_string(),
            Expr::NegPred(_) => "lookahead(-)".to_string(),
            Expr::Tag(tag, _) => format!("tag({})", tag),
            Expr::Trivia => "trivia".to_string(),
        }
    }
}
