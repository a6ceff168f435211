//! Expression model
//!
//! [`Expr`] is the closed set of node kinds a rule body is built from. Rule
//! references are by name ([`Expr::Ident`]) and are resolved through the
//! owning [`Grammar`](super::Grammar), so recursive grammars never form
//! ownership cycles.
//!
//! Every tree algorithm in the crate (interpretation, optimization,
//! compilation, source generation, printing) is an exhaustive `match` over
//! this enum. Generic rewriting goes through [`Expr::children`] and
//! [`Expr::with_children`].

use crate::error::Expected;
use crate::regex_cache;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A grammar expression node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Case-sensitive literal: `"abc"`
    Str(String),
    /// ASCII case-insensitive literal: `^"abc"`
    Insens(String),
    /// Inclusive character range: `'a'..'z'`
    Range(char, char),
    /// Reference to a user rule or built-in
    Ident(String),
    /// Any single character
    Any,
    /// Start of input
    Soi,
    /// End of input
    Eoi,
    /// Single-character pattern terminal (Unicode property classes)
    Regex(RegexTerm),
    /// A choice of terminals collapsed into one pattern
    ChoiceRegex(ChoiceRegex),
    /// `(!(t1 | t2 ...) ~ ANY)*` collapsed: consume up to the first terminator
    SkipUntil(Vec<String>),
    /// `!terminal` collapsed into a single non-consuming check
    NegatedTerminal(Box<Expr>),
    /// `PUSH(e)`: match `e` and push the matched text
    Push(Box<Expr>),
    /// `PUSH_LITERAL("s")`: push `s` without consuming input
    PushLiteral(String),
    /// `PEEK`: match the top of the stack
    Peek,
    /// `PEEK[start..end]`: match a slice of the stack, bottom to top
    PeekSlice(i32, Option<i32>),
    /// `POP`: match the top of the stack and remove it
    Pop,
    /// `POP_ALL`: match the whole stack and clear it
    PopAll,
    /// `DROP`: remove the top of the stack without matching
    Drop,
    /// `a ~ b ~ ...`
    Seq(Vec<Expr>),
    /// `a | b | ...`
    Choice(Vec<Expr>),
    /// `( e )`
    Group(Box<Expr>),
    /// `e?`
    Opt(Box<Expr>),
    /// `e*`
    Rep(Box<Expr>),
    /// `e+`
    RepOnce(Box<Expr>),
    /// `e{n}`
    RepExact(Box<Expr>, u32),
    /// `e{n,}`
    RepMin(Box<Expr>, u32),
    /// `e{,n}`
    RepMax(Box<Expr>, u32),
    /// `e{n,m}`
    RepRange(Box<Expr>, u32, u32),
    /// `&e`
    PosPred(Box<Expr>),
    /// `!e`
    NegPred(Box<Expr>),
    /// `#tag = e`
    Tag(String, Box<Expr>),
    /// Explicit implicit-trivia call point inserted by skip synthesis
    Trivia,
}

/// A named single-character pattern such as `\p{L}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegexTerm {
    /// Built-in name used in diagnostics
    pub name: String,
    /// Unanchored regex source
    pub pattern: String,
}

impl RegexTerm {
    /// Create a pattern terminal
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// One alternative of a squashed choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceAtom {
    /// Case-sensitive literal
    Literal(String),
    /// ASCII case-insensitive literal
    Insensitive(String),
    /// Character range
    Range(char, char),
    /// Named single-character pattern
    Class {
        /// Built-in name
        name: String,
        /// Unanchored regex source
        pattern: String,
    },
}

impl ChoiceAtom {
    /// Description recorded when this alternative fails
    pub fn expected(&self) -> Expected {
        match self {
            Self::Literal(value) => Expected::Literal(value.clone()),
            Self::Insensitive(value) => Expected::Insensitive(value.clone()),
            Self::Range(start, end) => Expected::Range(*start, *end),
            Self::Class { name, .. } => Expected::Builtin(name.clone()),
        }
    }

    /// Byte length this alternative matches at the start of `rest`
    pub fn match_len(&self, rest: &str) -> Option<usize> {
        match self {
            Self::Literal(value) => rest.starts_with(value.as_str()).then_some(value.len()),
            Self::Insensitive(value) => {
                starts_with_insensitive(rest, value).then_some(value.len())
            }
            Self::Range(start, end) => rest
                .chars()
                .next()
                .filter(|c| (*start..=*end).contains(c))
                .map(char::len_utf8),
            Self::Class { pattern, .. } => regex_cache::match_len(pattern, rest).ok().flatten(),
        }
    }

    fn is_single_char(&self) -> bool {
        match self {
            Self::Literal(value) | Self::Insensitive(value) => value.chars().count() == 1,
            Self::Range(..) | Self::Class { .. } => true,
        }
    }

    fn matches_char(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        self.match_len(c.encode_utf8(&mut buf)).is_some()
    }
}

/// ASCII case-insensitive prefix test
pub(crate) fn starts_with_insensitive(rest: &str, literal: &str) -> bool {
    rest.len() >= literal.len()
        && rest.as_bytes()[..literal.len()].eq_ignore_ascii_case(literal.as_bytes())
}

/// A choice of terminals compiled into one anchored pattern
///
/// The alternatives are kept in declaration order for diagnostics; the
/// pattern preserves ordered-choice semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoiceRegex {
    /// Alternatives in declaration order
    pub atoms: Vec<ChoiceAtom>,
    /// Unanchored regex source
    pub pattern: String,
}

impl ChoiceRegex {
    /// Collapse alternatives into a pattern
    ///
    /// Single-character alternatives are merged into one leading character
    /// class when that cannot change which alternative wins; otherwise the
    /// original order is kept and only runs of adjacent single-character
    /// alternatives are merged.
    pub fn new(atoms: Vec<ChoiceAtom>) -> Self {
        let pattern = render_pattern(&atoms);
        Self { atoms, pattern }
    }

    /// Descriptions of every alternative, in order
    pub fn expected(&self) -> Vec<Expected> {
        self.atoms.iter().map(ChoiceAtom::expected).collect()
    }

    /// Index of the first alternative (in declaration order) matching at the start of `rest`
    pub fn first_match(&self, rest: &str) -> Option<usize> {
        self.atoms
            .iter()
            .position(|atom| atom.match_len(rest).is_some())
    }
}

fn render_pattern(atoms: &[ChoiceAtom]) -> String {
    let mut branches = Vec::new();
    if class_first_is_safe(atoms) {
        let mut class = CharClass::default();
        for atom in atoms.iter().filter(|a| a.is_single_char()) {
            class.add(atom);
        }
        if !class.is_empty() {
            branches.push(class.render());
        }
        for atom in atoms.iter().filter(|a| !a.is_single_char()) {
            branches.push(render_multi(atom));
        }
    } else {
        let mut run = CharClass::default();
        for atom in atoms {
            if atom.is_single_char() {
                run.add(atom);
                continue;
            }
            if !run.is_empty() {
                branches.push(std::mem::take(&mut run).render());
            }
            branches.push(render_multi(atom));
        }
        if !run.is_empty() {
            branches.push(run.render());
        }
    }
    branches.join("|")
}

/// Hoisting the class is safe unless a later single-char alternative can
/// match the first char of an earlier multi-char one.
fn class_first_is_safe(atoms: &[ChoiceAtom]) -> bool {
    for (i, multi) in atoms.iter().enumerate() {
        if multi.is_single_char() {
            continue;
        }
        let Some(first) = (match multi {
            ChoiceAtom::Literal(v) | ChoiceAtom::Insensitive(v) => v.chars().next(),
            _ => None,
        }) else {
            continue;
        };
        let insensitive = matches!(multi, ChoiceAtom::Insensitive(_));
        for single in atoms[i + 1..].iter().filter(|a| a.is_single_char()) {
            let hit = single.matches_char(first)
                || (insensitive
                    && (single.matches_char(first.to_ascii_lowercase())
                        || single.matches_char(first.to_ascii_uppercase())));
            if hit {
                return false;
            }
        }
    }
    true
}

fn render_multi(atom: &ChoiceAtom) -> String {
    match atom {
        ChoiceAtom::Literal(value) => regex::escape(value),
        ChoiceAtom::Insensitive(value) => value.chars().map(insensitive_char).collect(),
        ChoiceAtom::Range(start, end) => CharClass::range(*start, *end).render(),
        ChoiceAtom::Class { pattern, .. } => pattern.clone(),
    }
}

fn insensitive_char(c: char) -> String {
    if c.is_ascii_alphabetic() {
        format!("[{}{}]", c.to_ascii_lowercase(), c.to_ascii_uppercase())
    } else {
        regex::escape(c.encode_utf8(&mut [0u8; 4]))
    }
}

/// Accumulates single-character alternatives into one bracket expression
#[derive(Debug, Default)]
struct CharClass {
    ranges: Vec<(char, char)>,
    classes: Vec<String>,
}

impl CharClass {
    fn range(start: char, end: char) -> Self {
        Self {
            ranges: vec![(start, end)],
            classes: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.classes.is_empty()
    }

    fn add(&mut self, atom: &ChoiceAtom) {
        match atom {
            ChoiceAtom::Literal(value) => {
                if let Some(c) = value.chars().next() {
                    self.ranges.push((c, c));
                }
            }
            ChoiceAtom::Insensitive(value) => {
                if let Some(c) = value.chars().next() {
                    self.ranges.push((c.to_ascii_lowercase(), c.to_ascii_lowercase()));
                    self.ranges.push((c.to_ascii_uppercase(), c.to_ascii_uppercase()));
                }
            }
            ChoiceAtom::Range(start, end) => self.ranges.push((*start, *end)),
            ChoiceAtom::Class { pattern, .. } => {
                if !self.classes.contains(pattern) {
                    self.classes.push(pattern.clone());
                }
            }
        }
    }

    /// Sorted, with overlapping and adjacent ranges merged
    fn merged(&self) -> Vec<(char, char)> {
        let mut ranges: Vec<(char, char)> = self
            .ranges
            .iter()
            .copied()
            .filter(|(start, end)| start <= end)
            .collect();
        ranges.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start as u32 <= last.1 as u32 + 1 => {
                    if end > last.1 {
                        last.1 = end;
                    }
                }
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    fn render(&self) -> String {
        let mut out = String::from("[");
        for (start, end) in self.merged() {
            out.push_str(&regex::escape(start.encode_utf8(&mut [0u8; 4])));
            if start != end {
                out.push('-');
                out.push_str(&regex::escape(end.encode_utf8(&mut [0u8; 4])));
            }
        }
        for class in &self.classes {
            out.push_str(class);
        }
        out.push(']');
        out
    }
}

impl Expr {
    /// Direct sub-expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Seq(items) | Expr::Choice(items) => items.iter().collect(),
            Expr::NegatedTerminal(e)
            | Expr::Push(e)
            | Expr::Group(e)
            | Expr::Opt(e)
            | Expr::Rep(e)
            | Expr::RepOnce(e)
            | Expr::RepExact(e, _)
            | Expr::RepMin(e, _)
            | Expr::RepMax(e, _)
            | Expr::RepRange(e, _, _)
            | Expr::PosPred(e)
            | Expr::NegPred(e)
            | Expr::Tag(_, e) => vec![e.as_ref()],
            Expr::Str(_)
            | Expr::Insens(_)
            | Expr::Range(..)
            | Expr::Ident(_)
            | Expr::Any
            | Expr::Soi
            | Expr::Eoi
            | Expr::Regex(_)
            | Expr::ChoiceRegex(_)
            | Expr::SkipUntil(_)
            | Expr::PushLiteral(_)
            | Expr::Peek
            | Expr::PeekSlice(..)
            | Expr::Pop
            | Expr::PopAll
            | Expr::Drop
            | Expr::Trivia => Vec::new(),
        }
    }

    /// Rebuild this node around new children
    ///
    /// # Panics
    /// Panics when `children.len()` differs from `self.children().len()`;
    /// that is a rewriting bug, not a user error.
    pub fn with_children(&self, children: Vec<Expr>) -> Expr {
        let expected = self.children().len();
        assert_eq!(
            children.len(),
            expected,
            "with_children: {} children given, node has {}",
            children.len(),
            expected
        );
        let mut iter = children.into_iter();
        match self {
            Expr::Seq(_) => return Expr::Seq(iter.collect()),
            Expr::Choice(_) => return Expr::Choice(iter.collect()),
            _ => {}
        }
        let Some(child) = iter.next() else {
            return self.clone();
        };
        let child = Box::new(child);
        match self {
            Expr::NegatedTerminal(_) => Expr::NegatedTerminal(child),
            Expr::Push(_) => Expr::Push(child),
            Expr::Group(_) => Expr::Group(child),
            Expr::Opt(_) => Expr::Opt(child),
            Expr::Rep(_) => Expr::Rep(child),
            Expr::RepOnce(_) => Expr::RepOnce(child),
            Expr::RepExact(_, n) => Expr::RepExact(child, *n),
            Expr::RepMin(_, n) => Expr::RepMin(child, *n),
            Expr::RepMax(_, n) => Expr::RepMax(child, *n),
            Expr::RepRange(_, min, max) => Expr::RepRange(child, *min, *max),
            Expr::PosPred(_) => Expr::PosPred(child),
            Expr::NegPred(_) => Expr::NegPred(child),
            Expr::Tag(tag, _) => Expr::Tag(tag.clone(), child),
            leaf => leaf.clone(),
        }
    }

    /// Pre-order traversal
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Strip any number of enclosing groups
    pub fn ungroup(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Group(inner) = expr {
            expr = inner;
        }
        expr
    }

    /// True for nodes that consume at most a fixed terminal and touch no state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Expr::Str(_)
                | Expr::Insens(_)
                | Expr::Range(..)
                | Expr::Any
                | Expr::Regex(_)
                | Expr::ChoiceRegex(_)
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Choice(_) => 0,
            Expr::Seq(_) => 1,
            Expr::PosPred(_) | Expr::NegPred(_) | Expr::NegatedTerminal(_) | Expr::Tag(..) => 2,
            Expr::Opt(_)
            | Expr::Rep(_)
            | Expr::RepOnce(_)
            | Expr::RepExact(..)
            | Expr::RepMin(..)
            | Expr::RepMax(..)
            | Expr::RepRange(..) => 3,
            _ => 4,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }
        match self {
            Expr::Str(value) => write!(f, "{:?}", value),
            Expr::Insens(value) => write!(f, "^{:?}", value),
            Expr::Range(start, end) => write!(f, "{:?}..{:?}", start, end),
            Expr::Ident(name) => f.write_str(name),
            Expr::Any => f.write_str("ANY"),
            Expr::Soi => f.write_str("SOI"),
            Expr::Eoi => f.write_str("EOI"),
            Expr::Regex(term) => f.write_str(&term.name),
            Expr::ChoiceRegex(choice) => {
                f.write_str("/")?;
                for c in choice.pattern.chars() {
                    if c.is_control() {
                        write!(f, "{}", c.escape_default())?;
                    } else {
                        write!(f, "{}", c)?;
                    }
                }
                f.write_str("/")
            }
            Expr::SkipUntil(terminators) => {
                let quoted: Vec<String> = terminators.iter().map(|t| format!("{:?}", t)).collect();
                write!(f, "SKIP_UNTIL({})", quoted.join(" | "))
            }
            Expr::NegatedTerminal(inner) | Expr::NegPred(inner) => {
                write!(f, "!")?;
                inner.fmt_at(f, 2)
            }
            Expr::PosPred(inner) => {
                write!(f, "&")?;
                inner.fmt_at(f, 2)
            }
            Expr::Tag(tag, inner) => {
                write!(f, "#{} = ", tag)?;
                inner.fmt_at(f, 2)
            }
            Expr::Push(inner) => {
                write!(f, "PUSH(")?;
                inner.fmt_at(f, 0)?;
                write!(f, ")")
            }
            Expr::PushLiteral(value) => write!(f, "PUSH_LITERAL({:?})", value),
            Expr::Peek => f.write_str("PEEK"),
            Expr::PeekSlice(0, None) => f.write_str("PEEK[..]"),
            Expr::PeekSlice(start, end) => {
                write!(f, "PEEK[")?;
                if *start != 0 {
                    write!(f, "{}", start)?;
                }
                write!(f, "..")?;
                if let Some(end) = end {
                    write!(f, "{}", end)?;
                }
                write!(f, "]")
            }
            Expr::Pop => f.write_str("POP"),
            Expr::PopAll => f.write_str("POP_ALL"),
            Expr::Drop => f.write_str("DROP"),
            Expr::Seq(items) => join(f, items, " ~ ", 2),
            Expr::Choice(items) => join(f, items, " | ", 1),
            Expr::Group(inner) => {
                write!(f, "(")?;
                inner.fmt_at(f, 0)?;
                write!(f, ")")
            }
            Expr::Opt(inner) => postfix(f, inner, "?"),
            Expr::Rep(inner) => postfix(f, inner, "*"),
            Expr::RepOnce(inner) => postfix(f, inner, "+"),
            Expr::RepExact(inner, n) => postfix(f, inner, &format!("{{{}}}", n)),
            Expr::RepMin(inner, n) => postfix(f, inner, &format!("{{{},}}", n)),
            Expr::RepMax(inner, n) => postfix(f, inner, &format!("{{,{}}}", n)),
            Expr::RepRange(inner, min, max) => postfix(f, inner, &format!("{{{},{}}}", min, max)),
            Expr::Trivia => f.write_str("SKIP"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str, min: u8) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        item.fmt_at(f, min)?;
    }
    Ok(())
}

fn postfix(f: &mut fmt::Formatter<'_>, inner: &Expr, op: &str) -> fmt::Result {
    inner.fmt_at(f, 4)?;
    f.write_str(op)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
