//! Grammar front end
//!
//! Everything needed to go from grammar source text to a validated
//! [`Grammar`]:
//!
//! - [`scanner`]: tokens
//! - [`parser`]: precedence-climbing grammar parser
//! - [`expr`]: the expression model
//! - [`builtins`]: built-in rule expansions
//! - [`grammar`]: rules, modifiers and validation
//! - [`analysis`]: warnings and recursion analysis

pub mod analysis;
pub mod builtins;
pub mod expr;
pub mod grammar;
pub mod parser;
pub mod scanner;

pub use analysis::{GrammarAnalyzer, GrammarWarning, WarningKind};
pub use expr::{ChoiceAtom, ChoiceRegex, Expr, RegexTerm};
pub use grammar::{Grammar, Modifiers, Rule};
pub use parser::{parse_expr, parse_grammar};
pub use scanner::{tokenize, Scanner, Token, TokenKind};
