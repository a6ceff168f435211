//! Parse tree
//!
//! A successful parse yields [`Pairs`]: the top-level [`Pair`]s produced by
//! the start rule (a silent start rule forwards its children). Each Pair is
//! a named, half-open byte span of the input with ordered children and an
//! optional tag. Pairs borrow the input and hold no reference to the parser.

use crate::source_location::SourcePosition;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::sync::Arc;

/// A matched span of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'i> {
    input: &'i str,
    start: usize,
    end: usize,
}

impl<'i> Span<'i> {
    pub(crate) fn new(input: &'i str, start: usize, end: usize) -> Self {
        Self { input, start, end }
    }

    /// Start byte offset
    pub fn start(&self) -> usize {
        self.start
    }

    /// End byte offset (exclusive)
    pub fn end(&self) -> usize {
        self.end
    }

    /// Matched text
    pub fn as_str(&self) -> &'i str {
        &self.input[self.start..self.end]
    }

    /// 1-based line and column of the start
    pub fn line_col(&self) -> (usize, usize) {
        let position = SourcePosition::from_offset(self.input, self.start);
        (position.line, position.column)
    }
}

/// One node of the parse tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair<'i> {
    pub(crate) rule: Arc<str>,
    pub(crate) input: &'i str,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) children: Vec<Pair<'i>>,
    pub(crate) tag: Option<Arc<str>>,
}

/// Start/end event of a flattened tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairToken<'a> {
    /// A Pair opens
    Start {
        /// Rule name
        rule: &'a str,
        /// Byte offset
        pos: usize,
    },
    /// A Pair closes
    End {
        /// Rule name
        rule: &'a str,
        /// Byte offset
        pos: usize,
    },
}

impl<'i> Pair<'i> {
    /// Name of the rule that produced this Pair
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Matched text
    pub fn as_str(&self) -> &'i str {
        &self.input[self.start..self.end]
    }

    /// Alias of [`Pair::as_str`]
    pub fn text(&self) -> &'i str {
        self.as_str()
    }

    /// Start byte offset
    pub fn start(&self) -> usize {
        self.start
    }

    /// End byte offset (exclusive)
    pub fn end(&self) -> usize {
        self.end
    }

    /// Matched span
    pub fn span(&self) -> Span<'i> {
        Span::new(self.input, self.start, self.end)
    }

    /// 1-based line and column of the start
    pub fn line_col(&self) -> (usize, usize) {
        self.span().line_col()
    }

    /// Tag assigned with `#tag = ...`
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Direct children in document order
    pub fn children(&self) -> &[Pair<'i>] {
        &self.children
    }

    /// Consume the Pair, returning its children
    pub fn into_inner(self) -> Pairs<'i> {
        Pairs {
            pairs: self.children,
            input: self.input,
            start: self.start,
            end: self.end,
        }
    }

    /// First descendant (pre-order, excluding `self`) carrying `tag`
    pub fn find_tagged(&self, tag: &str) -> Option<&Pair<'i>> {
        for child in &self.children {
            if child.tag() == Some(tag) {
                return Some(child);
            }
            if let Some(found) = child.find_tagged(tag) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant carrying `tag`, pre-order
    pub fn find_tagged_all(&self, tag: &str) -> Vec<&Pair<'i>> {
        let mut found = Vec::new();
        for child in &self.children {
            child.walk(&mut |pair| {
                if pair.tag() == Some(tag) {
                    found.push(pair);
                }
            });
        }
        found
    }

    /// Pre-order walk including `self`
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Pair<'i>)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// This Pair and every descendant, pre-order
    pub fn flatten(&self) -> Vec<&Pair<'i>> {
        let mut all = Vec::new();
        self.walk(&mut |pair| all.push(pair));
        all
    }

    /// Start/End event stream
    pub fn tokens(&self) -> Vec<PairToken<'_>> {
        let mut tokens = Vec::new();
        self.push_tokens(&mut tokens);
        tokens
    }

    fn push_tokens<'a>(&'a self, tokens: &mut Vec<PairToken<'a>>) {
        tokens.push(PairToken::Start {
            rule: &self.rule,
            pos: self.start,
        });
        for child in &self.children {
            child.push_tokens(tokens);
        }
        tokens.push(PairToken::End {
            rule: &self.rule,
            pos: self.end,
        });
    }

    /// `{rule, span: {str, start, end}, inner: [...], node_tag?}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

struct SpanDump<'a>(&'a str, usize, usize);

impl Serialize for SpanDump<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("str", self.0)?;
        map.serialize_entry("start", &self.1)?;
        map.serialize_entry("end", &self.2)?;
        map.end()
    }
}

impl Serialize for Pair<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.tag.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("rule", &*self.rule)?;
        map.serialize_entry("span", &SpanDump(self.as_str(), self.start, self.end))?;
        map.serialize_entry("inner", &self.children)?;
        if let Some(tag) = &self.tag {
            map.serialize_entry("node_tag", &**tag)?;
        }
        map.end()
    }
}

impl fmt::Display for Pair<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "#{}=", tag)?;
        }
        write!(f, "{}({}, {}", self.rule, self.start, self.end)?;
        if !self.children.is_empty() {
            write!(f, ", [")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, "]")?;
        }
        write!(f, ")")
    }
}

/// A sequence of sibling Pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairs<'i> {
    pub(crate) pairs: Vec<Pair<'i>>,
    pub(crate) input: &'i str,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl<'i> Pairs<'i> {
    /// Pairs in document order
    pub fn iter(&self) -> std::slice::Iter<'_, Pair<'i>> {
        self.pairs.iter()
    }

    /// Number of top-level Pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no Pair was produced
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// First Pair
    pub fn first(&self) -> Option<&Pair<'i>> {
        self.pairs.first()
    }

    /// The whole match
    pub fn as_str(&self) -> &'i str {
        &self.input[self.start..self.end]
    }

    /// Start byte offset of the whole match
    pub fn start(&self) -> usize {
        self.start
    }

    /// End byte offset of the whole match
    pub fn end(&self) -> usize {
        self.end
    }

    /// Span of the whole match
    pub fn span(&self) -> Span<'i> {
        Span::new(self.input, self.start, self.end)
    }

    /// Every Pair, pre-order
    pub fn flatten(&self) -> Vec<&Pair<'i>> {
        let mut all = Vec::new();
        for pair in &self.pairs {
            pair.walk(&mut |p| all.push(p));
        }
        all
    }

    /// Start/End event stream of every Pair
    pub fn tokens(&self) -> Vec<PairToken<'_>> {
        let mut tokens = Vec::new();
        for pair in &self.pairs {
            pair.push_tokens(&mut tokens);
        }
        tokens
    }

    /// First Pair at any depth carrying `tag`, pre-order
    pub fn find_tagged(&self, tag: &str) -> Option<&Pair<'i>> {
        self.pairs.iter().find_map(|pair| {
            if pair.tag() == Some(tag) {
                Some(pair)
            } else {
                pair.find_tagged(tag)
            }
        })
    }

    /// JSON array of the top-level Pairs
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Pairs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.pairs.len()))?;
        for pair in &self.pairs {
            seq.serialize_element(pair)?;
        }
        seq.end()
    }
}

impl<'i> IntoIterator for Pairs<'i> {
    type Item = Pair<'i>;
    type IntoIter = std::vec::IntoIter<Pair<'i>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a, 'i> IntoIterator for &'a Pairs<'i> {
    type Item = &'a Pair<'i>;
    type IntoIter = std::slice::Iter<'a, Pair<'i>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl fmt::Display for Pairs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", pair)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair<'i>(
        rule: &str,
        input: &'i str,
        start: usize,
        end: usize,
        children: Vec<Pair<'i>>,
    ) -> Pair<'i> {
        Pair {
            rule: Arc::from(rule),
            input,
            start,
            end,
            children,
            tag: None,
        }
    }

    fn sample(input: &str) -> Pair<'_> {
        let mut key = pair("key", input, 0, 1, vec![]);
        key.tag = Some(Arc::from("k"));
        let value = pair("value", input, 2, 3, vec![]);
        pair("entry", input, 0, 3, vec![key, value])
    }

    #[test]
    fn test_accessors() {
        let entry = sample("a=1");
        assert_eq!(entry.rule(), "entry");
        assert_eq!(entry.as_str(), "a=1");
        assert_eq!(entry.children()[1].text(), "1");
        assert_eq!(entry.span().start(), 0);
        assert_eq!(entry.children()[1].line_col(), (1, 3));
    }

    #[test]
    fn test_find_tagged() {
        let entry = sample("a=1");
        assert_eq!(entry.find_tagged("k").map(|p| p.rule()), Some("key"));
        assert!(entry.find_tagged("missing").is_none());
        assert_eq!(entry.find_tagged_all("k").len(), 1);
    }

    #[test]
    fn test_tokens() {
        let entry = sample("a=1");
        assert_eq!(
            entry.tokens(),
            vec![
                PairToken::Start { rule: "entry", pos: 0 },
                PairToken::Start { rule: "key", pos: 0 },
                PairToken::End { rule: "key", pos: 1 },
                PairToken::Start { rule: "value", pos: 2 },
                PairToken::End { rule: "value", pos: 3 },
                PairToken::End { rule: "entry", pos: 3 },
            ]
        );
    }

    #[test]
    fn test_to_json_shape() {
        let entry = sample("a=1");
        assert_eq!(
            entry.to_json(),
            json!({
                "rule": "entry",
                "span": {"str": "a=1", "start": 0, "end": 3},
                "inner": [
                    {"rule": "key", "span": {"str": "a", "start": 0, "end": 1}, "inner": [], "node_tag": "k"},
                    {"rule": "value", "span": {"str": "1", "start": 2, "end": 3}, "inner": []}
                ]
            })
        );
    }

    #[test]
    fn test_pairs_flatten_and_into_inner() {
        let input = "a=1";
        let pairs = Pairs {
            pairs: vec![sample(input)],
            input,
            start: 0,
            end: 3,
        };
        let rules: Vec<_> = pairs.flatten().iter().map(|p| p.rule()).collect();
        assert_eq!(rules, vec!["entry", "key", "value"]);
        assert_eq!(pairs.find_tagged("k").map(|p| p.as_str()), Some("a"));

        let inner = pairs.into_iter().next().map(Pair::into_inner);
        assert_eq!(inner.map(|p| p.len()), Some(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            sample("a=1").to_string(),
            "entry(0, 3, [#k=key(0, 1), value(2, 3)])"
        );
    }
}
