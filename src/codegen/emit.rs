//! Rust source generation
//!
//! [`generate`] renders a grammar as a standalone Rust module with one
//! function per rule. The generated code links against this crate and
//! evaluates through [`ParserState`](crate::runtime::ParserState), so it
//! parses exactly like the interpreter and the compiled program.

use crate::error::Expected;
use crate::meta::builtins;
use crate::meta::expr::{ChoiceAtom, Expr};
use crate::meta::grammar::{Grammar, Modifiers, Rule};
use crate::runtime::interpreter::describe;

const INDENT: &str = "    ";

/// Render `grammar` as Rust source
///
/// The module exposes `rule_<name>` for every rule, a `trivia` function
/// and `parse(rule, input, start)`.
pub fn generate(grammar: &Grammar) -> String {
    let emitter = Emitter {
        grammar,
        implicit: !grammar.explicit_trivia() && grammar.has_trivia(),
    };
    let mut out = String::new();
    emitter.header(&mut out);
    for rule in grammar.rules() {
        emitter.rule(rule, &mut out);
    }
    emitter.trivia(&mut out);
    emitter.entry(&mut out);
    log_debug!("generated {} bytes of source for {} rules", out.len(), grammar.len());
    out
}

/// An emitted expression: either a plain `bool` or an `Outcome`
struct Code {
    text: String,
    fallible: bool,
}

impl Code {
    fn matched(text: String) -> Self {
        Self {
            text,
            fallible: false,
        }
    }

    fn outcome(text: String) -> Self {
        Self {
            text,
            fallible: true,
        }
    }

    fn into_outcome(self) -> String {
        if self.fallible {
            self.text
        } else {
            format!("Ok({})", self.text)
        }
    }

    fn into_bool(self) -> String {
        if self.fallible {
            format!("{}?", self.text)
        } else {
            self.text
        }
    }
}

struct Emitter<'g> {
    grammar: &'g Grammar,
    /// Insert trivia calls between sequence items
    implicit: bool,
}

impl Emitter<'_> {
    fn header(&self, out: &mut String) {
        out.push_str("// Generated by pestle. Do not edit.\n");
        for line in self.grammar.doc() {
            out.push_str(&format!("//! {}\n", line));
        }
        out.push_str(
            "#![allow(dead_code, non_snake_case, unused_imports, unused_parens, clippy::all)]\n\n\
             use pestle::meta::{ChoiceAtom, ChoiceRegex, Modifiers, RegexTerm};\n\
             use pestle::runtime::{with_parse_stack, Outcome, Pairs, ParserState, RuleInfo};\n\
             use pestle::{Expected, ParseError, ParserConfig};\n\
             use std::sync::OnceLock;\n",
        );
    }

    fn rule(&self, rule: &Rule, out: &mut String) {
        out.push('\n');
        for line in &rule.doc {
            out.push_str(&format!("/// {}\n", line));
        }
        out.push_str(&format!(
            "// {} = {}{{ {} }}\n",
            rule.name,
            rule.modifiers.symbols(),
            rule.expr
        ));
        out.push_str(&format!(
            "pub fn rule_{}(state: &mut ParserState<'_>) -> Outcome {{\n",
            rule.name
        ));
        out.push_str(&format!(
            "{INDENT}static INFO: OnceLock<RuleInfo> = OnceLock::new();\n\
             {INDENT}let info = INFO.get_or_init(|| RuleInfo::new({:?}, {}));\n",
            rule.name,
            modifiers(rule.effective_modifiers())
        ));
        let body = self.expr(&rule.expr, 1).into_outcome();
        out.push_str(&format!("{INDENT}state.rule(info, |state| {})\n}}\n", body));
    }

    fn trivia(&self, out: &mut String) {
        out.push_str("\n/// Implicit whitespace and comments\n");
        out.push_str("pub fn trivia(state: &mut ParserState<'_>) -> Outcome {\n");
        match self.grammar.trivia_expr() {
            Some(expr) => {
                let body = self.expr(&expr, 1).into_outcome();
                out.push_str(&format!("{INDENT}state.skip(|state| {})\n", body));
            }
            None => out.push_str(&format!("{INDENT}Ok(true)\n")),
        }
        out.push_str("}\n");
    }

    fn entry(&self, out: &mut String) {
        out.push_str(
            "\n/// Parse `input` from byte offset `start` with `rule` as the start rule\n\
             pub fn parse<'i>(rule: &str, input: &'i str, start: usize) -> Result<Pairs<'i>, ParseError> {\n",
        );
        out.push_str(&format!(
            "{INDENT}let config = ParserConfig::default();\n\
             {INDENT}with_parse_stack(&config, || {{\n\
             {INDENT}{INDENT}let mut state = ParserState::new(input, start, config)?;\n\
             {INDENT}{INDENT}let matched = match rule {{\n"
        ));
        for rule in self.grammar.rules() {
            out.push_str(&format!(
                "{INDENT}{INDENT}{INDENT}{:?} => rule_{}(&mut state)?,\n",
                rule.name, rule.name
            ));
        }
        out.push_str(&format!(
            "{INDENT}{INDENT}{INDENT}_ => return Err(ParseError::UnknownRule {{ name: rule.to_string() }}),\n\
             {INDENT}{INDENT}}};\n\
             {INDENT}{INDENT}state.finish(matched)\n\
             {INDENT}}})\n}}\n"
        ));
    }

    fn closure(&self, inner: &Expr, depth: usize) -> String {
        format!("|state| {}", self.expr(inner, depth).into_outcome())
    }

    fn repeat(&self, inner: &Expr, min: u32, max: Option<u32>, depth: usize) -> Code {
        Code::outcome(format!(
            "state.repeat({}, {:?}, {}, trivia)",
            min,
            max,
            self.closure(inner, depth)
        ))
    }

    fn expr(&self, expr: &Expr, depth: usize) -> Code {
        match expr {
            Expr::Str(value) => Code::matched(format!("state.match_string({:?})", value)),
            Expr::Insens(value) => Code::matched(format!("state.match_insensitive({:?})", value)),
            Expr::Range(start, end) => {
                Code::matched(format!("state.match_range({:?}, {:?})", start, end))
            }
            Expr::Any => Code::matched("state.match_any()".to_string()),
            Expr::Soi => Code::matched("state.match_soi()".to_string()),
            Expr::Eoi => Code::matched("state.match_eoi()".to_string()),
            Expr::Regex(term) => Code::outcome(format!(
                "{{ static TERM: OnceLock<RegexTerm> = OnceLock::new(); \
                 state.match_regex(TERM.get_or_init(|| RegexTerm::new({:?}, {:?}))) }}",
                term.name, term.pattern
            )),
            Expr::ChoiceRegex(choice) => {
                let atoms: Vec<String> = choice.atoms.iter().map(atom).collect();
                Code::outcome(format!(
                    "{{ static CHOICE: OnceLock<ChoiceRegex> = OnceLock::new(); \
                     state.match_choice_regex(CHOICE.get_or_init(|| ChoiceRegex::new(vec![{}]))) }}",
                    atoms.join(", ")
                ))
            }
            Expr::SkipUntil(terminators) => Code::matched(format!(
                "{{ static TERMINATORS: OnceLock<Vec<String>> = OnceLock::new(); \
                 state.skip_until(TERMINATORS.get_or_init(|| vec![{}])) }}",
                strings(terminators)
            )),
            Expr::Ident(name) => {
                if self.grammar.get(name).is_some() {
                    Code::outcome(format!("rule_{}(state)", name))
                } else if let Some(expansion) = builtins::expand(name) {
                    self.expr(&expansion, depth)
                } else {
                    Code::outcome(format!(
                        "Err::<bool, ParseError>(ParseError::UnknownRule {{ name: {:?}.to_string() }})",
                        name
                    ))
                }
            }
            Expr::NegatedTerminal(inner) | Expr::NegPred(inner) => {
                let expected: Vec<String> = describe(inner, self.grammar)
                    .iter()
                    .map(expected)
                    .collect();
                let list = if expected.is_empty() {
                    "Vec::<Expected>::new()".to_string()
                } else {
                    format!("vec![{}]", expected.join(", "))
                };
                Code::outcome(format!(
                    "state.not(|| {}, {})",
                    list,
                    self.closure(inner, depth)
                ))
            }
            Expr::PosPred(inner) => Code::outcome(format!(
                "state.lookahead(true, {})",
                self.closure(inner, depth)
            )),
            Expr::Push(inner) => {
                Code::outcome(format!("state.push({})", self.closure(inner, depth)))
            }
            Expr::PushLiteral(value) => {
                Code::matched(format!("state.push_literal({:?})", value))
            }
            Expr::Peek => Code::matched("state.peek()".to_string()),
            Expr::PeekSlice(start, end) => {
                Code::matched(format!("state.peek_slice({}, {:?})", start, end))
            }
            Expr::Pop => Code::outcome("state.pop()".to_string()),
            Expr::PopAll => Code::matched("state.pop_all()".to_string()),
            Expr::Drop => Code::outcome("state.drop_top()".to_string()),
            Expr::Seq(items) => self.sequence(items, depth),
            Expr::Choice(items) => {
                // fallible branches unwrap in place, so the choice is a bool
                let branches: Vec<String> = items
                    .iter()
                    .map(|item| self.expr(item, depth).into_bool())
                    .collect();
                Code::matched(format!("({})", branches.join(" || ")))
            }
            Expr::Group(inner) => self.expr(inner, depth),
            Expr::Opt(inner) => {
                Code::outcome(format!("state.optional({})", self.closure(inner, depth)))
            }
            Expr::Rep(inner) => self.repeat(inner, 0, None, depth),
            Expr::RepOnce(inner) => self.repeat(inner, 1, None, depth),
            Expr::RepExact(inner, n) => self.repeat(inner, *n, Some(*n), depth),
            Expr::RepMin(inner, n) => self.repeat(inner, *n, None, depth),
            Expr::RepMax(inner, n) => self.repeat(inner, 0, Some(*n), depth),
            Expr::RepRange(inner, min, max) => self.repeat(inner, *min, Some(*max), depth),
            Expr::Tag(tag, inner) => Code::outcome(format!(
                "state.tagged({:?}, {})",
                tag,
                self.closure(inner, depth)
            )),
            Expr::Trivia => Code::outcome("trivia(state)".to_string()),
        }
    }

    fn sequence(&self, items: &[Expr], depth: usize) -> Code {
        let outer = INDENT.repeat(depth);
        let inner = INDENT.repeat(depth + 1);
        let mut text = String::from("state.sequence(|state| {\n");
        for (i, item) in items.iter().enumerate() {
            if self.implicit && i > 0 {
                text.push_str(&format!(
                    "{inner}if !trivia(state)? {{\n{inner}{INDENT}return Ok(false);\n{inner}}}\n"
                ));
            }
            let check = self.expr(item, depth + 1).into_bool();
            text.push_str(&format!(
                "{inner}if !{} {{\n{inner}{INDENT}return Ok(false);\n{inner}}}\n",
                check
            ));
        }
        text.push_str(&format!("{inner}Ok(true)\n{outer}}})"));
        Code::outcome(text)
    }
}

fn strings(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("{:?}.to_string()", value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn modifiers(modifiers: Modifiers) -> String {
    let names: Vec<&str> = [
        (Modifiers::SILENT, "Modifiers::SILENT"),
        (Modifiers::ATOMIC, "Modifiers::ATOMIC"),
        (Modifiers::COMPOUND, "Modifiers::COMPOUND"),
        (Modifiers::NONATOMIC, "Modifiers::NONATOMIC"),
    ]
    .iter()
    .filter(|(flag, _)| modifiers.contains(*flag))
    .map(|(_, name)| *name)
    .collect();
    if names.is_empty() {
        "Modifiers::NONE".to_string()
    } else {
        names.join(" | ")
    }
}

fn atom(atom: &ChoiceAtom) -> String {
    match atom {
        ChoiceAtom::Literal(value) => format!("ChoiceAtom::Literal({:?}.to_string())", value),
        ChoiceAtom::Insensitive(value) => {
            format!("ChoiceAtom::Insensitive({:?}.to_string())", value)
        }
        ChoiceAtom::Range(start, end) => format!("ChoiceAtom::Range({:?}, {:?})", start, end),
        ChoiceAtom::Class { name, pattern } => format!(
            "ChoiceAtom::Class {{ name: {:?}.to_string(), pattern: {:?}.to_string() }}",
            name, pattern
        ),
    }
}

fn expected(expected: &Expected) -> String {
    match expected {
        Expected::Literal(value) => format!("Expected::Literal({:?}.to_string())", value),
        Expected::Insensitive(value) => format!("Expected::Insensitive({:?}.to_string())", value),
        Expected::Range(start, end) => format!("Expected::Range({:?}, {:?})", start, end),
        Expected::Rule(name) => format!("Expected::Rule({:?}.to_string())", name),
        Expected::Builtin(name) => format!("Expected::Builtin({:?}.to_string())", name),
        Expected::Stack(name) => format!("Expected::Stack({:?}.to_string())", name),
    }
}
