//! Pestle - PEG engine for pest-style grammars
//!
//! Pestle reads grammars written in the `.pest` notation and parses input
//! with them. It provides:
//! - A grammar front end (scanner, parser, validation, analysis)
//! - An optimizer made of semantics-preserving rewrite passes
//! - A tree-walking interpreter and a closure-compiled backend that share
//!   one set of runtime combinators
//! - Standalone Rust source generation
//! - Furthest-failure error reports with expected/unexpected sets
//! - Literal search utilities (Aho–Corasick, terminator scanning)
//!
//! ## Quick Start
//!
//! ```rust
//! use pestle::PegParser;
//!
//! let parser = PegParser::new(r#"
//!     WHITESPACE = _{ " " }
//!     pair = { key ~ "=" ~ value }
//!     key = @{ ASCII_ALPHA+ }
//!     value = @{ ASCII_DIGIT+ }
//! "#).unwrap();
//!
//! let pairs = parser.parse("pair", "answer = 42").unwrap();
//! let pair = pairs.first().unwrap();
//! assert_eq!(pair.children()[0].as_str(), "answer");
//! assert_eq!(pair.children()[1].as_str(), "42");
//! ```
//!
//! ## Errors
//!
//! ```rust
//! use pestle::{ParseError, PegParser};
//!
//! let parser = PegParser::new(r#"choices = { "a" | "b" | "c" }"#).unwrap();
//! let Err(ParseError::Failed(err)) = parser.parse("choices", "x") else {
//!     panic!("expected a parse failure");
//! };
//! assert_eq!(err.position, 0);
//! assert_eq!(err.positives.len(), 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Parse batches on the rayon thread pool

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

pub mod codegen;
pub mod debug;
pub mod error;
pub mod meta;
pub mod optimizer;
pub mod parser;
pub mod regex_cache;
pub mod runtime;
pub mod search;
pub mod source_location;

/// Re-export commonly used types for convenience
pub use codegen::{generate, Program};
pub use debug::{GrammarVisualizer, TreePrinter};
pub use error::{Expected, GrammarError, ParseError, ParsingError};
pub use meta::{Expr, Grammar, GrammarAnalyzer, GrammarWarning, Modifiers, Rule};
pub use optimizer::{optimize, optimize_with_log, OptimizationLog, Pass, PassList};
pub use parser::{OptimizerConfig, ParserConfig, PegParser, PegParserBuilder};
pub use runtime::{Interpreter, Pair, PairToken, Pairs, Span};
pub use search::{AhoCorasick, PrefixMatcher, TerminatorFinder};
pub use source_location::SourcePosition;
