//! Furthest-failure tracking
//!
//! Only failures at the rightmost position reached so far are kept. A
//! failure further right replaces everything; one at the same position is
//! merged in first-seen order without duplicates; one further left is
//! dropped.

use crate::error::{Expected, ParsingError};
use std::sync::Arc;

/// Furthest failure seen during one parse
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    position: Option<usize>,
    positives: Vec<Expected>,
    negatives: Vec<Expected>,
    rule_stack: Vec<Arc<str>>,
    touched: usize,
}

impl FailureTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Furthest failure position, if anything was recorded
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Counter bumped on every record, used to tell whether a rule body recorded anything
    pub fn touched(&self) -> usize {
        self.touched
    }

    /// True when a record at `position` would not be discarded
    pub fn reaches(&self, position: usize) -> bool {
        self.position.map_or(true, |furthest| position >= furthest)
    }

    /// Record descriptions at `position`
    ///
    /// `expected` is only called when the record is kept.
    pub fn record<I>(
        &mut self,
        position: usize,
        negative: bool,
        call_stack: &[Arc<str>],
        expected: impl FnOnce() -> I,
    ) where
        I: IntoIterator<Item = Expected>,
    {
        self.touched += 1;
        if !self.reaches(position) {
            return;
        }
        if self.position != Some(position) {
            self.position = Some(position);
            self.positives.clear();
            self.negatives.clear();
            self.rule_stack = call_stack.to_vec();
        }
        let target = if negative {
            &mut self.negatives
        } else {
            &mut self.positives
        };
        for item in expected() {
            if !target.contains(&item) {
                target.push(item);
            }
        }
    }

    /// Build the error for `input`, defaulting to `fallback` when nothing was recorded
    pub fn into_error(self, input: &str, fallback: usize) -> ParsingError {
        ParsingError::new(
            input,
            self.position.unwrap_or(fallback),
            self.positives,
            self.negatives,
            self.rule_stack.iter().map(|r| r.to_string()).collect(),
        )
    }
}
