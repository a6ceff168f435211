//! Grammar types
//!
//! A [`Grammar`] is an ordered list of [`Rule`]s plus a name index. Rule
//! bodies refer to each other through [`Expr::Ident`], so recursion is a
//! lookup, never an ownership cycle.

use super::builtins;
use super::expr::Expr;
use crate::error::GrammarError;
use crate::regex_cache;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Rule modifier bitset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(u8);

impl Modifiers {
    /// No modifier: an ordinary rule
    pub const NONE: Self = Self(0);
    /// `_`: produce no Pair, forward children
    pub const SILENT: Self = Self(1);
    /// `@`: no implicit trivia, no inner structure
    pub const ATOMIC: Self = Self(1 << 1);
    /// `$`: like atomic, but always one childless Pair
    pub const COMPOUND: Self = Self(1 << 2);
    /// `!`: restore implicit trivia inside an atomic context
    pub const NONATOMIC: Self = Self(1 << 3);

    const ALL: u8 = 0b1111;

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, rejecting unknown ones
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// True when every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no bit is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Grammar-syntax prefix, e.g. `_` or `@`
    pub fn symbols(self) -> String {
        [
            (Self::SILENT, '_'),
            (Self::ATOMIC, '@'),
            (Self::COMPOUND, '$'),
            (Self::NONATOMIC, '!'),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, symbol)| *symbol)
        .collect()
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A named rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name
    pub name: String,
    /// Declared modifiers
    pub modifiers: Modifiers,
    /// Rule body
    pub expr: Expr,
    /// `///` documentation lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
}

impl Rule {
    /// Create an undocumented rule
    pub fn new(name: impl Into<String>, modifiers: Modifiers, expr: Expr) -> Self {
        Self {
            name: name.into(),
            modifiers,
            expr,
            doc: Vec::new(),
        }
    }

    /// Attach documentation lines
    pub fn with_doc(mut self, doc: Vec<String>) -> Self {
        self.doc = doc;
        self
    }

    /// Modifiers as the runtime sees them
    ///
    /// `WHITESPACE` and `COMMENT` are atomic unless declared `@`, `$` or `!`.
    pub fn effective_modifiers(&self) -> Modifiers {
        let explicit = Modifiers::ATOMIC | Modifiers::COMPOUND | Modifiers::NONATOMIC;
        if builtins::is_trivia_rule(&self.name) && self.modifiers.bits() & explicit.bits() == 0 {
            self.modifiers | Modifiers::ATOMIC
        } else {
            self.modifiers
        }
    }

    /// True when the rule never produces a Pair of its own
    pub fn is_silent(&self) -> bool {
        self.modifiers.contains(Modifiers::SILENT)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.doc {
            writeln!(f, "/// {}", line)?;
        }
        write!(
            f,
            "{} = {}{{ {} }}",
            self.name,
            self.modifiers.symbols(),
            self.expr
        )
    }
}

/// An ordered set of rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GrammarData", into = "GrammarData")]
pub struct Grammar {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    doc: Vec<String>,
    explicit_trivia: bool,
}

/// Serialized form; the index is rebuilt on load
#[derive(Serialize, Deserialize)]
struct GrammarData {
    rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    doc: Vec<String>,
    #[serde(default)]
    explicit_trivia: bool,
}

impl TryFrom<GrammarData> for Grammar {
    type Error = GrammarError;

    fn try_from(data: GrammarData) -> Result<Self, GrammarError> {
        let mut grammar = Grammar::new(data.rules, data.doc)?;
        grammar.explicit_trivia = data.explicit_trivia;
        Ok(grammar)
    }
}

impl From<Grammar> for GrammarData {
    fn from(grammar: Grammar) -> Self {
        Self {
            rules: grammar.rules,
            doc: grammar.doc,
            explicit_trivia: grammar.explicit_trivia,
        }
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
            && self.doc == other.doc
            && self.explicit_trivia == other.explicit_trivia
    }
}

impl Eq for Grammar {}

impl Grammar {
    /// Build a grammar from rules in declaration order
    ///
    /// Fails on duplicate rule names. Identifier resolution is checked by
    /// [`Grammar::validate`].
    pub fn new(rules: Vec<Rule>, doc: Vec<String>) -> Result<Self, GrammarError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            if index.insert(rule.name.clone(), i).is_some() {
                return Err(GrammarError::DuplicateRule {
                    name: rule.name.clone(),
                });
            }
        }
        Ok(Self {
            rules,
            index,
            doc,
            explicit_trivia: false,
        })
    }

    /// Parse and validate grammar source text
    pub fn from_source(source: &str) -> Result<Self, GrammarError> {
        let grammar = super::parser::parse_grammar(source)?;
        grammar.validate()?;
        Ok(grammar)
    }

    /// Check that the grammar is well formed
    ///
    /// Every identifier must name a rule or a built-in, no user rule may
    /// shadow a built-in, and every pattern terminal must compile.
    pub fn validate(&self) -> Result<(), GrammarError> {
        for rule in &self.rules {
            if builtins::is_builtin(&rule.name) {
                return Err(GrammarError::ReservedName {
                    name: rule.name.clone(),
                });
            }
        }
        for rule in &self.rules {
            let mut problem = None;
            rule.expr.walk(&mut |expr| {
                if problem.is_some() {
                    return;
                }
                problem = match expr {
                    Expr::Ident(name)
                        if !self.index.contains_key(name) && builtins::expand(name).is_none() =>
                    {
                        Some(GrammarError::UnresolvedRule {
                            name: name.clone(),
                            rule: rule.name.clone(),
                        })
                    }
                    Expr::Regex(term) => check_pattern(&term.pattern),
                    Expr::ChoiceRegex(choice) => check_pattern(&choice.pattern),
                    _ => None,
                };
            });
            if let Some(err) = problem {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rule names in declaration order
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Look up a rule by name
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    /// Position of a rule in declaration order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `//!` documentation lines
    pub fn doc(&self) -> &[String] {
        &self.doc
    }

    /// True once trivia call points have been made explicit
    pub fn explicit_trivia(&self) -> bool {
        self.explicit_trivia
    }

    pub(crate) fn set_explicit_trivia(&mut self, explicit: bool) {
        self.explicit_trivia = explicit;
    }

    /// Trivia rules the grammar defines, in `WHITESPACE`, `COMMENT` order
    pub fn trivia_rules(&self) -> Vec<&str> {
        builtins::TRIVIA_RULES
            .iter()
            .copied()
            .filter(|name| self.index.contains_key(*name))
            .collect()
    }

    /// True when the grammar defines `WHITESPACE` or `COMMENT`
    pub fn has_trivia(&self) -> bool {
        !self.trivia_rules().is_empty()
    }

    /// The expression skipped between sequence items and repetitions
    ///
    /// `(WHITESPACE | COMMENT)*` over whichever trivia rules exist. Once
    /// trivia is explicit this is the body of the `SKIP` rule.
    pub fn trivia_expr(&self) -> Option<Expr> {
        if self.explicit_trivia {
            if let Some(rule) = self.get(builtins::SKIP_RULE) {
                return Some(rule.expr.clone());
            }
        }
        let mut calls: Vec<Expr> = self
            .trivia_rules()
            .into_iter()
            .map(|name| Expr::Ident(name.to_string()))
            .collect();
        let body = match calls.len() {
            0 => return None,
            1 => calls.remove(0),
            _ => Expr::Choice(calls),
        };
        Some(Expr::Rep(Box::new(body)))
    }

    /// Same grammar with rebuilt rule bodies, in the same order
    pub(crate) fn with_bodies(&self, bodies: Vec<Expr>) -> Self {
        debug_assert_eq!(bodies.len(), self.rules.len());
        let rules = self
            .rules
            .iter()
            .zip(bodies)
            .map(|(rule, expr)| Rule {
                expr,
                ..rule.clone()
            })
            .collect();
        Self {
            rules,
            index: self.index.clone(),
            doc: self.doc.clone(),
            explicit_trivia: self.explicit_trivia,
        }
    }

    /// Append a rule
    pub fn push_rule(&mut self, rule: Rule) -> Result<(), GrammarError> {
        if self.index.contains_key(&rule.name) {
            return Err(GrammarError::DuplicateRule { name: rule.name });
        }
        self.index.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn check_pattern(pattern: &str) -> Option<GrammarError> {
    regex_cache::compile_anchored(pattern)
        .err()
        .map(|err| GrammarError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.doc {
            writeln!(f, "//! {}", line)?;
        }
        if !self.doc.is_empty() {
            writeln!(f)?;
        }
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::expr::RegexTerm;

    fn rule(name: &str, expr: Expr) -> Rule {
        Rule::new(name, Modifiers::NONE, expr)
    }

    // === Modifiers Tests ===

    #[test]
    fn test_modifier_bits() {
        let m = Modifiers::SILENT | Modifiers::ATOMIC;
        assert!(m.contains(Modifiers::SILENT));
        assert!(m.contains(Modifiers::ATOMIC));
        assert!(!m.contains(Modifiers::COMPOUND));
        assert_eq!(m.symbols(), "_@");
        assert_eq!(Modifiers::from_bits(m.bits()), Some(m));
        assert_eq!(Modifiers::from_bits(0x80), None);
    }

    #[test]
    fn test_trivia_rules_are_implicitly_atomic() {
        let ws = Rule::new("WHITESPACE", Modifiers::SILENT, Expr::Str(" ".into()));
        assert!(ws.effective_modifiers().contains(Modifiers::ATOMIC));

        let nonatomic = Rule::new("COMMENT", Modifiers::NONATOMIC, Expr::Any);
        assert!(!nonatomic.effective_modifiers().contains(Modifiers::ATOMIC));

        let plain = rule("other", Expr::Any);
        assert_eq!(plain.effective_modifiers(), Modifiers::NONE);
    }

    // === Grammar Tests ===

    #[test]
    fn test_duplicate_rule() {
        let err = Grammar::new(vec![rule("a", Expr::Any), rule("a", Expr::Eoi)], vec![])
            .unwrap_err();
        assert_eq!(err, GrammarError::DuplicateRule { name: "a".into() });
    }

    #[test]
    fn test_validate_unresolved() {
        let grammar = Grammar::new(
            vec![rule("a", Expr::Seq(vec![Expr::Ident("ANY".into()), Expr::Ident("b".into())]))],
            vec![],
        )
        .unwrap();
        assert_eq!(
            grammar.validate(),
            Err(GrammarError::UnresolvedRule {
                name: "b".into(),
                rule: "a".into()
            })
        );
    }

    #[test]
    fn test_validate_reserved_name() {
        let grammar = Grammar::new(vec![rule("ANY", Expr::Eoi)], vec![]).unwrap();
        assert!(matches!(
            grammar.validate(),
            Err(GrammarError::ReservedName { .. })
        ));

        let trivia = Grammar::new(vec![rule("WHITESPACE", Expr::Str(" ".into()))], vec![]).unwrap();
        assert!(trivia.validate().is_ok());
        assert!(trivia.has_trivia());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let grammar = Grammar::new(
            vec![rule("a", Expr::Regex(RegexTerm::new("BAD", "[z-a")))],
            vec![],
        )
        .unwrap();
        assert!(matches!(
            grammar.validate(),
            Err(GrammarError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_lookup_and_order() {
        let grammar = Grammar::new(vec![rule("b", Expr::Any), rule("a", Expr::Eoi)], vec![]).unwrap();
        assert_eq!(grammar.rule_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(grammar.index_of("a"), Some(1));
        assert_eq!(grammar.get("a").map(|r| &r.expr), Some(&Expr::Eoi));
        assert!(grammar.get("c").is_none());
    }

    #[test]
    fn test_json_roundtrip_rebuilds_index() {
        let grammar = Grammar::new(
            vec![
                rule("a", Expr::Rep(Box::new(Expr::Ident("b".into())))),
                Rule::new("b", Modifiers::ATOMIC, Expr::Range('0', '9')).with_doc(vec!["digit".into()]),
            ],
            vec!["numbers".into()],
        )
        .unwrap();
        let json = grammar.to_json().unwrap();
        let loaded = Grammar::from_json(&json).unwrap();
        assert_eq!(loaded, grammar);
        assert_eq!(loaded.index_of("b"), Some(1));
    }

    #[test]
    fn test_json_rejects_duplicates() {
        let json = r#"{"rules":[{"name":"a","modifiers":0,"expr":"Any"},{"name":"a","modifiers":0,"expr":"Eoi"}]}"#;
        assert!(Grammar::from_json(json).is_err());
    }

    #[test]
    fn test_display() {
        let grammar = Grammar::new(
            vec![Rule::new(
                "pair",
                Modifiers::COMPOUND,
                Expr::Seq(vec![Expr::Str("a".into()), Expr::Opt(Box::new(Expr::Ident("b".into())))]),
            )
            .with_doc(vec!["a pair".into()])],
            vec!["top".into()],
        )
        .unwrap();
        assert_eq!(
            grammar.to_string(),
            "//! top\n\n/// a pair\npair = ${ \"a\" ~ b? }\n"
        );
    }
}
