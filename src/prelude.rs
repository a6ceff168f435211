//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from pestle.
//! Importing this module with a wildcard import brings them into scope:
//!
//! ```
//! use pestle::prelude::*;
//!
//! let parser = PegParser::new(r#"word = @{ ASCII_ALPHA+ }"#).unwrap();
//! let pairs: Pairs<'_> = parser.parse("word", "hello").unwrap();
//! assert_eq!(pairs.as_str(), "hello");
//! ```
//!
//! # Re-exported Items
//!
//! ## Building and Running Parsers
//! - [`PegParser`] - Grammar source in, parse trees out
//! - [`ParserConfig`] - Runtime limits
//! - [`OptimizerConfig`] - Which optimizer passes to run
//!
//! ## Parse Trees
//! - [`Pairs`], [`Pair`], [`Span`], [`PairToken`]
//!
//! ## Grammars
//! - [`Grammar`], [`Rule`], [`Modifiers`], [`Expr`]
//!
//! ## Errors
//! - [`GrammarError`], [`ParseError`], [`ParsingError`], [`Expected`]

// ============================================================================
// Parsers
// ============================================================================

pub use crate::parser::{OptimizerConfig, ParserConfig, PegParser};

// ============================================================================
// Parse Trees
// ============================================================================

pub use crate::runtime::{Pair, PairToken, Pairs, Span};

// ============================================================================
// Grammars
// ============================================================================

pub use crate::meta::{Expr, Grammar, Modifiers, Rule};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::error::{Expected, GrammarError, ParseError, ParsingError};
