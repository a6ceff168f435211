//! Code generation backends
//!
//! - [`compile`]: lower a grammar into a [`Program`] of boxed closures
//! - [`emit`]: render a grammar as standalone Rust source
//!
//! Both produce parsers that evaluate through the same
//! [`ParserState`](crate::runtime::ParserState) combinators as the
//! interpreter.

pub mod compile;
pub mod emit;

pub use compile::{Matcher, Program};
pub use emit::generate;
