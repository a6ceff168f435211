//! Error types
//!
//! Two families of errors exist:
//!
//! - [`GrammarError`]: the grammar source is malformed or references rules
//!   that do not exist. Raised once, at build time.
//! - [`ParseError`]: a parse of some input did not succeed. The ordinary
//!   case is [`ParseError::Failed`] carrying a [`ParsingError`]; the other
//!   variants are invariant violations (stack underflow, runaway recursion)
//!   that abort the parse instead of backtracking.

use crate::source_location::SourcePosition;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while compiling grammar source text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// Malformed grammar source
    #[error("grammar syntax error at {position}: {message}{}", found_suffix(.found))]
    Syntax {
        /// What went wrong
        message: String,
        /// The offending token text, if any
        found: Option<String>,
        /// Where it went wrong
        position: SourcePosition,
    },

    /// An identifier that names neither a rule nor a built-in
    #[error("unresolved rule `{name}` referenced from rule `{rule}`")]
    UnresolvedRule {
        /// The unknown identifier
        name: String,
        /// The rule whose body contains it
        rule: String,
    },

    /// Two rules share one name
    #[error("rule `{name}` is defined more than once")]
    DuplicateRule {
        /// The repeated rule name
        name: String,
    },

    /// A user rule tries to redefine a built-in
    #[error("rule `{name}` shadows a built-in rule")]
    ReservedName {
        /// The reserved name
        name: String,
    },

    /// A pattern terminal does not compile
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler message
        reason: String,
    },
}

fn found_suffix(found: &Option<String>) -> String {
    match found {
        Some(text) => format!(" (found `{}`)", text),
        None => String::new(),
    }
}

impl GrammarError {
    /// Convenience constructor for syntax errors
    pub fn syntax(
        message: impl Into<String>,
        found: Option<&str>,
        position: SourcePosition,
    ) -> Self {
        Self::Syntax {
            message: message.into(),
            found: found.map(str::to_string),
            position,
        }
    }
}

/// Errors raised by a parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input did not match the start rule
    #[error("{0}")]
    Failed(Box<ParsingError>),

    /// The requested start rule does not exist
    #[error("unknown start rule `{name}`")]
    UnknownRule {
        /// Requested rule name
        name: String,
    },

    /// `POP` or `DROP` executed with nothing on the stack
    #[error("stack underflow: `{operation}` at offset {position} with an empty stack")]
    StackUnderflow {
        /// The operation that underflowed
        operation: &'static str,
        /// Input offset
        position: usize,
    },

    /// Rule nesting exceeded the configured limit
    #[error("recursion limit exceeded: depth {depth} > max {max_depth}")]
    RecursionLimitExceeded {
        /// Depth reached
        depth: usize,
        /// Configured limit
        max_depth: usize,
    },

    /// Input is larger than the configured limit
    #[error("input too large: {size} bytes > max {max_size} bytes")]
    InputTooLarge {
        /// Input size
        size: usize,
        /// Configured limit
        max_size: usize,
    },

    /// The start offset is past the end or inside a UTF-8 sequence
    #[error("start offset {offset} is not a character boundary of the input")]
    InvalidStartOffset {
        /// Requested offset
        offset: usize,
    },

    /// A pattern terminal failed to compile at parse time
    #[error("invalid pattern `{pattern}`")]
    InvalidPattern {
        /// Pattern source
        pattern: String,
    },
}

impl ParseError {
    /// The furthest-failure diagnostics, when this is an ordinary parse failure
    pub fn parsing_error(&self) -> Option<&ParsingError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParsingError> for ParseError {
    fn from(err: ParsingError) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Description of something the parser expected (or forbade) at a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Expected {
    /// A case-sensitive literal
    Literal(String),
    /// An ASCII case-insensitive literal
    Insensitive(String),
    /// A character range
    Range(char, char),
    /// A named user rule
    Rule(String),
    /// A built-in terminal (`ANY`, `EOI`, Unicode classes, ...)
    Builtin(String),
    /// A stack operation with nothing to compare against
    Stack(String),
}

impl Expected {
    /// Shorthand for [`Expected::Literal`]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Shorthand for [`Expected::Rule`]
    pub fn rule(name: impl Into<String>) -> Self {
        Self::Rule(name.into())
    }

    /// Shorthand for [`Expected::Builtin`]
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::Builtin(name.into())
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{:?}", value),
            Self::Insensitive(value) => write!(f, "^{:?}", value),
            Self::Range(start, end) => write!(f, "{:?}..{:?}", start, end),
            Self::Rule(name) | Self::Builtin(name) | Self::Stack(name) => f.write_str(name),
        }
    }
}

/// Diagnostics for a failed parse, built from the furthest failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingError {
    /// Byte offset of the furthest failure
    pub position: usize,
    /// 1-based line of `position`
    pub line: usize,
    /// 1-based column of `position`
    pub column: usize,
    /// Text of the line containing `position`
    pub line_text: String,
    /// Descriptions expected at `position`, in first-seen order
    pub positives: Vec<Expected>,
    /// Descriptions forbidden at `position` by negative predicates
    pub negatives: Vec<Expected>,
    /// Non-silent rules active when the furthest position was reached, outermost first
    pub rule_stack: Vec<String>,
}

impl ParsingError {
    /// Build diagnostics for `input` at `position`
    pub fn new(
        input: &str,
        position: usize,
        positives: Vec<Expected>,
        negatives: Vec<Expected>,
        rule_stack: Vec<String>,
    ) -> Self {
        let location = SourcePosition::from_offset(input, position);
        Self {
            position,
            line: location.line,
            column: location.column,
            line_text: location.line_text(input).to_string(),
            positives,
            negatives,
            rule_stack,
        }
    }

    /// Short one-line message without the source excerpt
    pub fn message(&self) -> String {
        match (self.positives.is_empty(), self.negatives.is_empty()) {
            (false, true) => format!("expected {}", enumerate(&self.positives)),
            (true, false) => format!("unexpected {}", enumerate(&self.negatives)),
            (false, false) => format!(
                "unexpected {}; expected {}",
                enumerate(&self.negatives),
                enumerate(&self.positives)
            ),
            (true, true) => "unknown parsing error".to_string(),
        }
    }
}

fn enumerate(items: &[Expected]) -> String {
    let names: Vec<String> = items.iter().map(ToString::to_string).collect();
    match names.len() {
        0 => String::new(),
        1 => names[0].clone(),
        2 => format!("{} or {}", names[0], names[1]),
        n => format!("{}, or {}", names[..n - 1].join(", "), names[n - 1]),
    }
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gutter = " ".repeat(self.line.to_string().len());
        writeln!(f, "{} --> {}:{}", gutter, self.line, self.column)?;
        writeln!(f, "{} |", gutter)?;
        writeln!(f, "{} | {}", self.line, self.line_text)?;
        writeln!(f, "{} | {}^---", gutter, " ".repeat(self.column - 1))?;
        writeln!(f, "{} |", gutter)?;
        write!(f, "{} = {}", gutter, self.message())?;
        if let Some(rule) = self.rule_stack.last() {
            write!(f, " (in rule `{}`)", rule)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParsingError {}
