//! Multi-literal search
//!
//! Used by the skip-until terminal to jump straight to the next terminator
//! instead of testing every position. [`TerminatorFinder`] picks the
//! cheapest strategy for a terminator set (memchr for up to three single
//! bytes, memmem for a single literal) and falls back to an
//! [`AhoCorasick`] automaton otherwise.

use aho_corasick::{BuildError, Input, MatchKind};
use hashbrown::HashMap;
use memchr::memmem;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A literal occurrence in a haystack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    /// Index of the pattern in the pattern list
    pub pattern: usize,
    /// Byte offset of the first matched byte
    pub start: usize,
    /// Byte offset after the last matched byte
    pub end: usize,
}

/// Aho-Corasick automata over a literal set
///
/// Holds a standard automaton for overlapping search and a leftmost-first
/// one for the earliest match. Empty patterns never match but keep their
/// index.
#[derive(Debug, Clone)]
pub struct AhoCorasick {
    overlapping: aho_corasick::AhoCorasick,
    leftmost: aho_corasick::AhoCorasick,
    /// Original index of each non-empty pattern
    indices: Vec<usize>,
    count: usize,
    max_len: usize,
}

impl AhoCorasick {
    /// Build the automata
    pub fn new<I, P>(patterns: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let patterns: Vec<P> = patterns.into_iter().collect();
        let (indices, kept): (Vec<usize>, Vec<&[u8]>) = patterns
            .iter()
            .map(|p| p.as_ref())
            .enumerate()
            .filter(|(_, bytes)| !bytes.is_empty())
            .unzip();
        let overlapping = aho_corasick::AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&kept)?;
        let leftmost = aho_corasick::AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&kept)?;
        log_debug!("built Aho-Corasick automata for {} patterns", kept.len());
        Ok(Self {
            overlapping,
            leftmost,
            indices,
            count: patterns.len(),
            max_len: kept.iter().map(|p| p.len()).max().unwrap_or(0),
        })
    }

    /// Number of patterns, empty ones included
    pub fn pattern_count(&self) -> usize {
        self.count
    }

    fn convert(&self, m: aho_corasick::Match) -> Match {
        Match {
            pattern: self.indices[m.pattern().as_usize()],
            start: m.start(),
            end: m.end(),
        }
    }

    /// Every (possibly overlapping) match, ordered by end offset, then start
    pub fn find_iter(&self, haystack: &str) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .overlapping
            .find_overlapping_iter(haystack)
            .map(|m| self.convert(m))
            .collect();
        matches.sort_by_key(|m| (m.end, m.start, m.pattern));
        matches
    }

    /// Match with the smallest start at or after `from`
    ///
    /// Among matches starting at the same offset, the lowest pattern index wins.
    pub fn find_earliest(&self, haystack: &str, from: usize) -> Option<Match> {
        if from > haystack.len() {
            return None;
        }
        let input = Input::new(haystack).span(from..haystack.len());
        self.leftmost.find(input).map(|m| self.convert(m))
    }

    /// True when any pattern occurs in `haystack`
    pub fn is_match(&self, haystack: &str) -> bool {
        self.leftmost.is_match(haystack)
    }

    /// Longest pattern length
    pub fn max_pattern_len(&self) -> usize {
        self.max_len
    }
}

/// Matches a literal set at a fixed position
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    literals: Vec<String>,
    by_first_byte: HashMap<u8, Vec<usize>>,
    has_empty: bool,
}

impl PrefixMatcher {
    /// Index the literals by their first byte
    pub fn new<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let literals: Vec<String> = literals.into_iter().map(Into::into).collect();
        let mut by_first_byte: HashMap<u8, Vec<usize>> = HashMap::new();
        let mut has_empty = false;
        for (index, literal) in literals.iter().enumerate() {
            match literal.as_bytes().first() {
                Some(&byte) => by_first_byte.entry(byte).or_default().push(index),
                None => has_empty = true,
            }
        }
        Self {
            literals,
            by_first_byte,
            has_empty,
        }
    }

    fn candidates<'a>(&'a self, input: &'a str, pos: usize) -> impl Iterator<Item = usize> + 'a {
        let rest = input.get(pos..).unwrap_or("");
        let mut indices: Vec<usize> = rest
            .as_bytes()
            .first()
            .and_then(|b| self.by_first_byte.get(b))
            .cloned()
            .unwrap_or_default();
        if self.has_empty {
            indices.extend(
                self.literals
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| l.is_empty())
                    .map(|(i, _)| i),
            );
            indices.sort_unstable();
        }
        indices
            .into_iter()
            .filter(move |&i| rest.starts_with(self.literals[i].as_str()))
    }

    /// First literal, in declaration order, that starts at `pos`
    pub fn first_at(&self, input: &str, pos: usize) -> Option<(usize, usize)> {
        self.candidates(input, pos)
            .next()
            .map(|i| (i, self.literals[i].len()))
    }

    /// Longest literal that starts at `pos`
    pub fn longest_at(&self, input: &str, pos: usize) -> Option<(usize, usize)> {
        self.candidates(input, pos)
            .map(|i| (i, self.literals[i].len()))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    }

    /// The indexed literals
    pub fn literals(&self) -> &[String] {
        &self.literals
    }
}

/// All occurrences of `patterns` in `haystack`
pub fn find_all<S: AsRef<str>>(haystack: &str, patterns: &[S]) -> Result<Vec<Match>, BuildError> {
    let automaton = AhoCorasick::new(patterns.iter().map(|p| p.as_ref().as_bytes()))?;
    Ok(automaton.find_iter(haystack))
}

/// True when any non-empty pattern occurs in `haystack`
pub fn contains_any<S: AsRef<str>>(haystack: &str, patterns: &[S]) -> bool {
    let bytes = haystack.as_bytes();
    let mut needles = patterns
        .iter()
        .map(|p| p.as_ref().as_bytes())
        .filter(|p| !p.is_empty());
    match patterns {
        [] => false,
        [_] => needles.any(|needle| memmem::find(bytes, needle).is_some()),
        _ => match AhoCorasick::new(patterns.iter().map(|p| p.as_ref().as_bytes())) {
            Ok(automaton) => automaton.is_match(haystack),
            Err(_) => needles.any(|needle| memmem::find(bytes, needle).is_some()),
        },
    }
}

#[derive(Debug, Clone)]
enum Strategy {
    Never,
    Byte1(u8),
    Byte2(u8, u8),
    Byte3(u8, u8, u8),
    Literal(memmem::Finder<'static>),
    Automaton(AhoCorasick),
    /// Terminator set too large for an automaton
    Scan,
}

/// Finds the earliest occurrence of any terminator
#[derive(Debug, Clone)]
pub struct TerminatorFinder {
    terminators: Vec<String>,
    strategy: Strategy,
}

impl TerminatorFinder {
    /// Choose a search strategy for the terminator set
    pub fn new(terminators: &[String]) -> Self {
        let terminators: Vec<String> = terminators.to_vec();
        let single_bytes: Option<Vec<u8>> = terminators
            .iter()
            .map(|t| match t.as_bytes() {
                [b] => Some(*b),
                _ => None,
            })
            .collect();
        let strategy = match (single_bytes.as_deref(), terminators.as_slice()) {
            (_, []) => Strategy::Never,
            (Some([a]), _) => Strategy::Byte1(*a),
            (Some([a, b]), _) => Strategy::Byte2(*a, *b),
            (Some([a, b, c]), _) => Strategy::Byte3(*a, *b, *c),
            (_, [single]) => {
                Strategy::Literal(memmem::Finder::new(single.as_bytes()).into_owned())
            }
            _ => match AhoCorasick::new(terminators.iter().map(String::as_bytes)) {
                Ok(automaton) => Strategy::Automaton(automaton),
                Err(_err) => {
                    log_debug!("terminator automaton unavailable ({}), scanning", _err);
                    Strategy::Scan
                }
            },
        };
        Self {
            terminators,
            strategy,
        }
    }

    /// Earliest offset at or after `from` where a terminator starts
    ///
    /// Returns the offset and the index of the first terminator, in
    /// declaration order, matching there.
    pub fn find_earliest(&self, input: &str, from: usize) -> Option<(usize, usize)> {
        let bytes = input.as_bytes();
        if from > bytes.len() {
            return None;
        }
        if self.terminators.iter().any(String::is_empty) {
            return self.first_matching(input, from).map(|i| (from, i));
        }
        let hay = &bytes[from..];
        let at = match &self.strategy {
            Strategy::Never => None,
            Strategy::Byte1(a) => memchr::memchr(*a, hay),
            Strategy::Byte2(a, b) => memchr::memchr2(*a, *b, hay),
            Strategy::Byte3(a, b, c) => memchr::memchr3(*a, *b, *c, hay),
            Strategy::Literal(finder) => finder.find(hay),
            Strategy::Automaton(automaton) => {
                return automaton
                    .find_earliest(input, from)
                    .and_then(|m| self.first_matching(input, m.start).map(|i| (m.start, i)));
            }
            Strategy::Scan => {
                return (from..=bytes.len())
                    .filter(|&at| input.is_char_boundary(at))
                    .find_map(|at| self.first_matching(input, at).map(|i| (at, i)));
            }
        }?;
        let at = from + at;
        self.first_matching(input, at).map(|i| (at, i))
    }

    fn first_matching(&self, input: &str, at: usize) -> Option<usize> {
        let rest = input.get(at..)?;
        self.terminators
            .iter()
            .position(|t| rest.starts_with(t.as_str()))
    }

    /// The terminator set, in declaration order
    pub fn terminators(&self) -> &[String] {
        &self.terminators
    }
}

// Shared by every parse thread
static FINDER_CACHE: OnceLock<Mutex<HashMap<Vec<String>, Arc<TerminatorFinder>>>> = OnceLock::new();

fn get_finder_cache() -> &'static Mutex<HashMap<Vec<String>, Arc<TerminatorFinder>>> {
    FINDER_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Run `f` with a cached finder for `terminators`
pub fn with_finder<R>(terminators: &[String], f: impl FnOnce(&TerminatorFinder) -> R) -> R {
    let finder = {
        let mut cache = get_finder_cache()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match cache.get(terminators) {
            Some(finder) => Arc::clone(finder),
            None => {
                let finder = Arc::new(TerminatorFinder::new(terminators));
                cache.insert(terminators.to_vec(), Arc::clone(&finder));
                finder
            }
        }
    };
    f(&finder)
}
