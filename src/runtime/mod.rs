//! Parsing runtime
//!
//! - [`state`]: per-parse state and the combinators every backend uses
//! - [`guard`]: stack sizing for parse threads
//! - [`interpreter`]: direct evaluation of a [`Grammar`](crate::meta::Grammar)
//! - [`pairs`]: the parse tree
//! - [`stack`]: the user value stack with snapshots
//! - [`tracker`]: furthest-failure tracking

pub mod guard;
pub mod interpreter;
pub mod pairs;
pub mod stack;
pub mod state;
pub mod tracker;

pub use guard::with_parse_stack;
pub use interpreter::{describe, Interpreter};
pub use pairs::{Pair, PairToken, Pairs, Span};
pub use stack::Stack;
pub use state::{Lookahead, Outcome, ParserState, RuleInfo};
pub use tracker::FailureTracker;
