//! Parser state and evaluation combinators
//!
//! [`ParserState`] is created per parse and owns everything mutable: the
//! cursor, the checkpoint stack, the user value stack, the output queue and
//! the furthest-failure tracker. Both backends (the tree-walking
//! interpreter and the compiled program) and generated parsers evaluate
//! through the combinators defined here, so they cannot disagree on
//! matching semantics.
//!
//! Every combinator returns an [`Outcome`]: `Ok(true)` on a match,
//! `Ok(false)` on an ordinary (backtrackable) failure and `Err` when the
//! parse must abort. A failed combinator leaves the cursor, the stack and
//! the output queue as it found them.

use super::pairs::{Pair, Pairs};
use super::stack::{slice_bounds, Stack};
use super::tracker::FailureTracker;
use crate::error::{Expected, ParseError};
use crate::meta::expr::{starts_with_insensitive, ChoiceAtom, ChoiceRegex, RegexTerm};
use crate::meta::grammar::Modifiers;
use crate::parser::ParserConfig;
use crate::regex_cache;
use crate::search::{self, TerminatorFinder};
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;

/// Result of evaluating an expression
pub type Outcome = Result<bool, ParseError>;

/// Static description of a rule, shared by all backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    /// Rule name
    pub name: Arc<str>,
    /// Effective modifiers
    pub modifiers: Modifiers,
}

impl RuleInfo {
    /// Describe a rule
    pub fn new(name: &str, modifiers: Modifiers) -> Self {
        Self {
            name: Arc::from(name),
            modifiers,
        }
    }
}

/// Lookahead context, flipped by each negative predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
    /// Not inside a predicate
    None,
    /// Inside an even number of negative predicates
    Positive,
    /// Inside an odd number of negative predicates
    Negative,
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pos: usize,
    queue_len: usize,
    atomic_depth: usize,
}

/// Mutable state of one parse
pub struct ParserState<'i> {
    input: &'i str,
    pos: usize,
    checkpoints: Vec<Checkpoint>,
    stack: Stack<Cow<'i, str>>,
    atomic_depth: usize,
    lookahead: Lookahead,
    quiet: usize,
    skipping: bool,
    queue: Vec<Pair<'i>>,
    call_stack: Vec<Arc<str>>,
    depth: usize,
    start: usize,
    config: ParserConfig,
    tracker: FailureTracker,
}

impl<'i> ParserState<'i> {
    /// Create a state positioned at `start`
    ///
    /// Fails when the input exceeds the configured size or `start` is not a
    /// character boundary.
    pub fn new(input: &'i str, start: usize, config: ParserConfig) -> Result<Self, ParseError> {
        if input.len() > config.max_input_size {
            return Err(ParseError::InputTooLarge {
                size: input.len(),
                max_size: config.max_input_size,
            });
        }
        if !input.is_char_boundary(start) {
            return Err(ParseError::InvalidStartOffset { offset: start });
        }
        Ok(Self {
            input,
            pos: start,
            checkpoints: Vec::new(),
            stack: Stack::new(),
            atomic_depth: 0,
            lookahead: Lookahead::None,
            quiet: 0,
            skipping: false,
            queue: Vec::new(),
            call_stack: Vec::new(),
            depth: 0,
            start,
            config,
            tracker: FailureTracker::new(),
        })
    }

    /// The input being parsed
    pub fn input(&self) -> &'i str {
        self.input
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current atomic depth
    pub fn atomic_depth(&self) -> usize {
        self.atomic_depth
    }

    /// Values on the user stack, bottom first
    pub fn stack(&self) -> &[Cow<'i, str>] {
        self.stack.as_slice()
    }

    /// Number of open checkpoints
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    fn rest(&self) -> &'i str {
        &self.input[self.pos..]
    }

    /// True when failures are recorded
    fn tracking(&self) -> bool {
        self.quiet == 0 && self.atomic_depth == 0 && self.lookahead != Lookahead::Negative
    }

    fn record<I>(&mut self, position: usize, negative: bool, expected: impl FnOnce() -> I)
    where
        I: IntoIterator<Item = Expected>,
    {
        if self.tracking() {
            self.tracker
                .record(position, negative, &self.call_stack, expected);
        }
    }

    fn fail(&mut self, expected: impl FnOnce() -> Expected) -> bool {
        let pos = self.pos;
        self.record(pos, false, || [expected()]);
        false
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Save cursor, output and stack state
    pub fn snapshot(&mut self) {
        self.checkpoints.push(Checkpoint {
            pos: self.pos,
            queue_len: self.queue.len(),
            atomic_depth: self.atomic_depth,
        });
        self.stack.snapshot();
    }

    /// Return to the newest checkpoint and discard it
    pub fn restore(&mut self) {
        if let Some(checkpoint) = self.checkpoints.pop() {
            self.pos = checkpoint.pos;
            self.queue.truncate(checkpoint.queue_len);
            self.atomic_depth = checkpoint.atomic_depth;
        }
        self.stack.restore();
    }

    /// Keep the current state and discard the newest checkpoint
    pub fn commit(&mut self) {
        self.checkpoints.pop();
        self.stack.clear_snapshot();
    }

    /// Run `f` between a checkpoint and its release
    ///
    /// The checkpoint is committed on a match and restored otherwise,
    /// including when `f` aborts.
    pub fn attempt<F>(&mut self, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        self.snapshot();
        match f(self) {
            Ok(true) => {
                self.commit();
                Ok(true)
            }
            Ok(false) => {
                self.restore();
                Ok(false)
            }
            Err(err) => {
                self.restore();
                Err(err)
            }
        }
    }

    /// Evaluate a sequence body; any failure rewinds to the sequence start
    pub fn sequence<F>(&mut self, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        self.attempt(f)
    }

    /// `e?`
    pub fn optional<F>(&mut self, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        self.attempt(f)?;
        Ok(true)
    }

    /// Greedy repetition between `min` and `max` iterations
    ///
    /// `trivia` runs before every iteration after the first. An unbounded
    /// repetition stops after the first iteration past `min` that consumed
    /// nothing; that iteration is kept. Fewer than `min` iterations rewind
    /// everything.
    pub fn repeat<F, T>(&mut self, min: u32, max: Option<u32>, mut item: F, mut trivia: T) -> Outcome
    where
        F: FnMut(&mut Self) -> Outcome,
        T: FnMut(&mut Self) -> Outcome,
    {
        self.snapshot();
        let mut count: u32 = 0;
        loop {
            if max.is_some_and(|max| count >= max) {
                break;
            }
            let before = self.pos;
            let first = count == 0;
            let matched = self.attempt(|state| {
                if !first && !trivia(state)? {
                    return Ok(false);
                }
                item(state)
            });
            match matched {
                Ok(true) => count += 1,
                Ok(false) => break,
                Err(err) => {
                    self.restore();
                    return Err(err);
                }
            }
            if max.is_none() && count > min && self.pos == before {
                break;
            }
        }
        if count >= min {
            self.commit();
            Ok(true)
        } else {
            self.restore();
            Ok(false)
        }
    }

    /// `&e` (`positive`) or the raw check of `!e`; never consumes
    pub fn lookahead<F>(&mut self, positive: bool, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        let saved = self.lookahead;
        self.lookahead = match (positive, saved) {
            (true, Lookahead::Negative) => Lookahead::Negative,
            (true, _) => Lookahead::Positive,
            (false, Lookahead::Negative) => Lookahead::Positive,
            (false, _) => Lookahead::Negative,
        };
        self.snapshot();
        let result = f(self);
        self.restore();
        self.lookahead = saved;
        let matched = result?;
        Ok(matched == positive)
    }

    /// `!e`: succeeds when `f` fails
    ///
    /// When `f` matches, `describe()` is recorded as forbidden at the
    /// current position.
    pub fn not<D, F, I>(&mut self, describe: D, f: F) -> Outcome
    where
        D: FnOnce() -> I,
        I: IntoIterator<Item = Expected>,
        F: FnOnce(&mut Self) -> Outcome,
    {
        let pos = self.pos;
        let succeeded = self.lookahead(false, f)?;
        if !succeeded {
            self.record(pos, true, describe);
        }
        Ok(succeeded)
    }

    /// `#tag = e`: tag every top-level Pair `f` produces
    pub fn tagged<F>(&mut self, tag: &str, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        let queue_len = self.queue.len();
        let matched = f(self)?;
        if matched && self.queue.len() > queue_len {
            let tag: Arc<str> = Arc::from(tag);
            for pair in &mut self.queue[queue_len..] {
                pair.tag = Some(tag.clone());
            }
        }
        Ok(matched)
    }

    /// Evaluate a rule body with the rule's modifiers applied
    pub fn rule<F>(&mut self, info: &RuleInfo, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        if self.depth >= self.config.max_recursion_depth {
            return Err(ParseError::RecursionLimitExceeded {
                depth: self.depth + 1,
                max_depth: self.config.max_recursion_depth,
            });
        }
        let modifiers = info.modifiers;
        let silent = modifiers.contains(Modifiers::SILENT);
        let compound = modifiers.contains(Modifiers::COMPOUND);
        let atomic = modifiers.contains(Modifiers::ATOMIC) || compound;
        let nonatomic = modifiers.contains(Modifiers::NONATOMIC);
        let emits = !silent && (self.atomic_depth == 0 || nonatomic);

        let start = self.pos;
        let queue_len = self.queue.len();
        let saved_atomic = self.atomic_depth;
        let touched = self.tracker.touched();

        self.depth += 1;
        if !silent {
            self.call_stack.push(info.name.clone());
        }
        if atomic {
            self.atomic_depth += 1;
        } else if nonatomic {
            self.atomic_depth = 0;
        }

        let result = f(self);

        self.atomic_depth = saved_atomic;
        self.depth -= 1;

        let matched = match result {
            Ok(matched) => matched,
            Err(err) => {
                if !silent {
                    self.call_stack.pop();
                }
                return Err(err);
            }
        };

        if matched {
            if emits {
                let children = if compound {
                    self.queue.truncate(queue_len);
                    Vec::new()
                } else {
                    self.queue.split_off(queue_len)
                };
                self.queue.push(Pair {
                    rule: info.name.clone(),
                    input: self.input,
                    start,
                    end: self.pos,
                    children,
                    tag: None,
                });
            }
        } else {
            self.pos = start;
            self.queue.truncate(queue_len);
            if !silent && self.tracking() && self.tracker.touched() == touched {
                let name = info.name.clone();
                self.record(start, false, || [Expected::Rule(name.to_string())]);
            }
        }
        if !silent {
            self.call_stack.pop();
        }
        Ok(matched)
    }

    /// Skip trivia with `f`
    ///
    /// A no-op inside atomic rules and while trivia is already being
    /// skipped. Failures are not tracked meanwhile.
    pub fn skip<F>(&mut self, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        if self.skipping || self.atomic_depth > 0 {
            return Ok(true);
        }
        self.skipping = true;
        self.quiet += 1;
        let result = self.attempt(f);
        self.quiet -= 1;
        self.skipping = false;
        result.map(|_| true)
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    /// Case-sensitive literal
    pub fn match_string(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            self.fail(|| Expected::literal(literal))
        }
    }

    /// ASCII case-insensitive literal
    pub fn match_insensitive(&mut self, literal: &str) -> bool {
        if starts_with_insensitive(self.rest(), literal) {
            self.pos += literal.len();
            true
        } else {
            self.fail(|| Expected::Insensitive(literal.to_string()))
        }
    }

    /// One character in `start..=end`
    pub fn match_range(&mut self, start: char, end: char) -> bool {
        match self.rest().chars().next() {
            Some(c) if (start..=end).contains(&c) => {
                self.pos += c.len_utf8();
                true
            }
            _ => self.fail(|| Expected::Range(start, end)),
        }
    }

    /// Any single character
    pub fn match_any(&mut self) -> bool {
        match self.rest().chars().next() {
            Some(c) => {
                self.pos += c.len_utf8();
                true
            }
            None => self.fail(|| Expected::builtin("ANY")),
        }
    }

    /// Start of input
    pub fn match_soi(&mut self) -> bool {
        self.pos == 0 || self.fail(|| Expected::builtin("SOI"))
    }

    /// End of input
    pub fn match_eoi(&mut self) -> bool {
        self.pos == self.input.len() || self.fail(|| Expected::builtin("EOI"))
    }

    /// Anchored, precompiled pattern
    pub fn match_pattern(&mut self, regex: &Regex, expected: impl FnOnce() -> Expected) -> bool {
        match regex.find(self.rest()) {
            Some(m) => {
                self.pos += m.end();
                true
            }
            None => self.fail(expected),
        }
    }

    /// Pattern terminal compiled through the thread-local cache
    pub fn match_regex(&mut self, term: &RegexTerm) -> Outcome {
        let regex = regex_cache::get_or_compile(&term.pattern).ok_or_else(|| {
            ParseError::InvalidPattern {
                pattern: term.pattern.clone(),
            }
        })?;
        Ok(self.match_pattern(&regex, || Expected::builtin(term.name.clone())))
    }

    /// Squashed choice, compiled through the thread-local cache
    pub fn match_choice_regex(&mut self, choice: &ChoiceRegex) -> Outcome {
        let regex = regex_cache::get_or_compile(&choice.pattern).ok_or_else(|| {
            ParseError::InvalidPattern {
                pattern: choice.pattern.clone(),
            }
        })?;
        Ok(self.match_choice_with(choice, &regex))
    }

    /// Squashed choice with a precompiled pattern
    ///
    /// Records the alternatives an ordered choice would have tried and
    /// failed: all of them on failure, the ones before the winner on a match.
    pub fn match_choice_with(&mut self, choice: &ChoiceRegex, regex: &Regex) -> bool {
        let rest = self.rest();
        let found = regex.find(rest).map(|m| m.end());
        if self.tracking() {
            let tried = match found {
                Some(_) => choice.first_match(rest).unwrap_or(choice.atoms.len()),
                None => choice.atoms.len(),
            };
            if tried > 0 {
                let pos = self.pos;
                self.record(pos, false, || {
                    choice.atoms[..tried].iter().map(ChoiceAtom::expected)
                });
            }
        }
        match found {
            Some(len) => {
                self.pos += len;
                true
            }
            None => false,
        }
    }

    /// Consume up to the earliest terminator (or the end of input)
    pub fn skip_until(&mut self, terminators: &[String]) -> bool {
        search::with_finder(terminators, |finder| {
            self.skip_until_with(finder, terminators)
        })
    }

    /// [`ParserState::skip_until`] with a prebuilt finder
    ///
    /// Records exactly what `(!(t1 | t2 ...) ~ ANY)*` records.
    pub fn skip_until_with(&mut self, finder: &TerminatorFinder, terminators: &[String]) -> bool {
        let start = self.pos;
        let found = finder.find_earliest(self.input, start);
        let stop = found.map_or(self.input.len(), |(at, _)| at);

        let literals = || terminators.iter().map(|t| Expected::literal(t.as_str()));
        match self.lookahead {
            Lookahead::Negative if self.quiet == 0 && self.atomic_depth == 0 => {
                // The inner predicate flips back to tracked: every terminator
                // is tried and fails at each position before `stop`.
                let previous = self.input[start..stop]
                    .char_indices()
                    .next_back()
                    .map(|(offset, _)| start + offset);
                let saved = self.lookahead;
                self.lookahead = Lookahead::Positive;
                if let Some(previous) = previous {
                    self.record(previous, false, literals);
                }
                let failed_first = match found {
                    Some((_, index)) => index,
                    None => terminators.len(),
                };
                if failed_first > 0 {
                    self.record(stop, false, || literals().take(failed_first));
                }
                self.lookahead = saved;
            }
            _ => match found {
                Some(_) => self.record(stop, true, literals),
                None => self.record(stop, false, || [Expected::builtin("ANY")]),
            },
        }

        self.pos = stop;
        true
    }

    // ------------------------------------------------------------------
    // Stack
    // ------------------------------------------------------------------

    /// `PUSH(e)`: push the text `f` matched
    pub fn push<F>(&mut self, f: F) -> Outcome
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        let start = self.pos;
        let matched = f(self)?;
        if matched {
            self.stack.push(Cow::Borrowed(&self.input[start..self.pos]));
        }
        Ok(matched)
    }

    /// `PUSH_LITERAL("s")`
    pub fn push_literal(&mut self, literal: &str) -> bool {
        self.stack.push(Cow::Owned(literal.to_string()));
        true
    }

    fn match_stacked(&mut self, text: &str) -> bool {
        if self.rest().starts_with(text) {
            self.pos += text.len();
            true
        } else {
            let text = text.to_string();
            self.fail(|| Expected::Literal(text))
        }
    }

    /// `PEEK`: match the top value; fails on an empty stack
    pub fn peek(&mut self) -> bool {
        match self.stack.peek().cloned() {
            Some(top) => self.match_stacked(&top),
            None => self.fail(|| Expected::Stack("PEEK".to_string())),
        }
    }

    /// `PEEK[start..end]`: match a slice of the stack, bottom to top
    pub fn peek_slice(&mut self, start: i32, end: Option<i32>) -> bool {
        let values = self.stack.as_slice();
        let (from, to) = slice_bounds(values.len(), start, end);
        let text: String = values[from..to].concat();
        self.match_stacked(&text)
    }

    /// `POP`: match the top value and remove it
    pub fn pop(&mut self) -> Outcome {
        let Some(top) = self.stack.peek().cloned() else {
            return Err(ParseError::StackUnderflow {
                operation: "POP",
                position: self.pos,
            });
        };
        if self.match_stacked(&top) {
            self.stack.pop();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `POP_ALL`: match the whole stack, bottom to top, and clear it
    pub fn pop_all(&mut self) -> bool {
        let text: String = self.stack.as_slice().concat();
        if self.match_stacked(&text) {
            self.stack.clear();
            true
        } else {
            false
        }
    }

    /// `DROP`: remove the top value without matching
    pub fn drop_top(&mut self) -> Outcome {
        match self.stack.pop() {
            Some(_) => Ok(true),
            None => Err(ParseError::StackUnderflow {
                operation: "DROP",
                position: self.pos,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Result
    // ------------------------------------------------------------------

    /// Turn the verdict of the start rule into the parse result
    pub fn finish(self, matched: bool) -> Result<Pairs<'i>, ParseError> {
        if matched {
            Ok(Pairs {
                pairs: self.queue,
                input: self.input,
                start: self.start,
                end: self.pos,
            })
        } else {
            Err(self.tracker.into_error(self.input, self.start).into())
        }
    }
}
