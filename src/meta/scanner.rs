//! Grammar token scanner
//!
//! Lexes grammar source into [`Token`]s. Whitespace, `//` line comments and
//! `/* */` block comments (which may nest) are discarded; `///` rule docs and
//! `//!` grammar docs are kept as tokens. The scanner is a single-pass
//! iterator: after the first error it yields nothing more.

use crate::error::GrammarError;
use crate::source_location::{LineTracker, SourcePosition};
use std::borrow::Cow;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Rule or built-in name
    Ident,
    /// Double-quoted string; `value` holds the unescaped content
    Str,
    /// Single-quoted character; `value` holds the unescaped char
    Char,
    /// Possibly negative integer
    Number,
    /// `=`
    Equals,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `~`
    Tilde,
    /// `|`
    Pipe,
    /// `?`
    Question,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `&`
    Amp,
    /// `!`
    Bang,
    /// `^`
    Caret,
    /// `@`
    At,
    /// `$`
    Dollar,
    /// `_`
    Underscore,
    /// `#`
    Hash,
    /// `..`
    DotDot,
    /// `,`
    Comma,
    /// `//! text`
    GrammarDoc,
    /// `/// text`
    RuleDoc,
}

/// A lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'s> {
    /// Token category
    pub kind: TokenKind,
    /// Semantic value (unescaped literal content, doc text, identifier)
    pub value: Cow<'s, str>,
    /// Raw lexeme as it appears in the grammar source
    pub text: &'s str,
    /// Position of the first character of the lexeme
    pub position: SourcePosition,
}

/// Iterator over the tokens of a grammar source
pub struct Scanner<'s> {
    source: &'s str,
    tracker: LineTracker,
    finished: bool,
}

/// Lex `source` lazily
pub fn tokenize(source: &str) -> Scanner<'_> {
    Scanner::new(source)
}

impl<'s> Scanner<'s> {
    /// Create a scanner over `source`
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            tracker: LineTracker::new(),
            finished: false,
        }
    }

    fn offset(&self) -> usize {
        self.tracker.position().offset
    }

    fn rest(&self) -> &'s str {
        &self.source[self.offset()..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.tracker.advance(c);
        Some(c)
    }

    fn error(&self, message: impl Into<String>, at: SourcePosition) -> GrammarError {
        let found = self.source[at.offset..].chars().next().map(|c| c.to_string());
        GrammarError::syntax(message, found.as_deref(), at)
    }

    /// Skip whitespace and non-doc comments
    fn skip_trivia(&mut self) -> Result<(), GrammarError> {
        loop {
            let rest = self.rest();
            if rest.starts_with(char::is_whitespace) {
                self.bump();
            } else if rest.starts_with("//!")
                || (rest.starts_with("///") && !rest.starts_with("////"))
            {
                return Ok(());
            } else if rest.starts_with("//") {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if rest.starts_with("/*") {
                self.skip_block_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), GrammarError> {
        let start = self.tracker.position();
        let mut depth = 0usize;
        loop {
            let rest = self.rest();
            if rest.starts_with("/*") {
                depth += 1;
                self.bump();
                self.bump();
            } else if rest.starts_with("*/") {
                depth -= 1;
                self.bump();
                self.bump();
                if depth == 0 {
                    return Ok(());
                }
            } else if self.bump().is_none() {
                return Err(self.error("unterminated block comment", start));
            }
        }
    }

    fn token(&self, kind: TokenKind, value: Cow<'s, str>, start: SourcePosition) -> Token<'s> {
        Token {
            kind,
            value,
            text: &self.source[start.offset..self.offset()],
            position: start,
        }
    }

    fn doc(&mut self, kind: TokenKind, start: SourcePosition) -> Token<'s> {
        for _ in 0..3 {
            self.bump();
        }
        let body_start = self.offset();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let body = &self.source[body_start..self.offset()];
        let body = body.strip_prefix(' ').unwrap_or(body).trim_end();
        self.token(kind, Cow::Borrowed(body), start)
    }

    fn escape(&mut self) -> Result<char, GrammarError> {
        let at = self.tracker.position();
        self.bump();
        let c = match self.bump() {
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('/') => '/',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('x') => {
                let digits: String = (0..2).filter_map(|_| self.bump()).collect();
                u8::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|b| b.is_ascii())
                    .map(char::from)
                    .ok_or_else(|| self.error("invalid \\x escape", at))?
            }
            Some('u') => {
                if self.bump() != Some('{') {
                    return Err(self.error("expected `{` after \\u", at));
                }
                let mut digits = String::new();
                loop {
                    match self.bump() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_hexdigit() && digits.len() < 6 => digits.push(d),
                        _ => return Err(self.error("invalid \\u escape", at)),
                    }
                }
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode scalar in \\u escape", at))?
            }
            _ => return Err(self.error("unknown escape sequence", at)),
        };
        Ok(c)
    }

    fn string(&mut self, start: SourcePosition) -> Result<Token<'s>, GrammarError> {
        self.bump();
        let content_start = self.offset();
        let mut owned: Option<String> = None;
        loop {
            match self.peek() {
                None => {
                    return Err(self.error("unterminated string literal", start));
                }
                Some('"') => break,
                Some('\\') => {
                    if owned.is_none() {
                        owned = Some(self.source[content_start..self.offset()].to_string());
                    }
                    let c = self.escape()?;
                    if let Some(buffer) = owned.as_mut() {
                        buffer.push(c);
                    }
                }
                Some(c) => {
                    self.bump();
                    if let Some(buffer) = owned.as_mut() {
                        buffer.push(c);
                    }
                }
            }
        }
        let value = match owned {
            Some(buffer) => Cow::Owned(buffer),
            None => Cow::Borrowed(&self.source[content_start..self.offset()]),
        };
        self.bump();
        Ok(self.token(TokenKind::Str, value, start))
    }

    fn character(&mut self, start: SourcePosition) -> Result<Token<'s>, GrammarError> {
        self.bump();
        let c = match self.peek() {
            Some('\\') => self.escape()?,
            Some('\'') | Some('\n') | None => {
                return Err(self.error("empty or unterminated character literal", start));
            }
            Some(c) => {
                self.bump();
                c
            }
        };
        if self.bump() != Some('\'') {
            return Err(self.error("unterminated character literal", start));
        }
        Ok(self.token(TokenKind::Char, Cow::Owned(c.to_string()), start))
    }

    fn number(&mut self, start: SourcePosition) -> Token<'s> {
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.source[start.offset..self.offset()];
        self.token(TokenKind::Number, Cow::Borrowed(text), start)
    }

    fn identifier(&mut self, start: SourcePosition) -> Token<'s> {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let text = &self.source[start.offset..self.offset()];
        let kind = if text == "_" {
            TokenKind::Underscore
        } else {
            TokenKind::Ident
        };
        self.token(kind, Cow::Borrowed(text), start)
    }

    fn scan(&mut self) -> Option<Result<Token<'s>, GrammarError>> {
        if let Err(err) = self.skip_trivia() {
            return Some(Err(err));
        }
        let start = self.tracker.position();
        let rest = self.rest();
        if rest.starts_with("//!") {
            return Some(Ok(self.doc(TokenKind::GrammarDoc, start)));
        }
        if rest.starts_with("///") {
            return Some(Ok(self.doc(TokenKind::RuleDoc, start)));
        }
        let c = self.peek()?;
        let kind = match c {
            '"' => return Some(self.string(start)),
            '\'' => return Some(self.character(start)),
            '-' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                return Some(Ok(self.number(start)));
            }
            d if d.is_ascii_digit() => return Some(Ok(self.number(start))),
            a if a.is_ascii_alphabetic() || a == '_' => return Some(Ok(self.identifier(start))),
            '.' if self.peek_second() == Some('.') => {
                self.bump();
                self.bump();
                return Some(Ok(self.token(TokenKind::DotDot, Cow::Borrowed(".."), start)));
            }
            '=' => Some(TokenKind::Equals),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '~' => Some(TokenKind::Tilde),
            '|' => Some(TokenKind::Pipe),
            '?' => Some(TokenKind::Question),
            '*' => Some(TokenKind::Star),
            '+' => Some(TokenKind::Plus),
            '&' => Some(TokenKind::Amp),
            '!' => Some(TokenKind::Bang),
            '^' => Some(TokenKind::Caret),
            '@' => Some(TokenKind::At),
            '$' => Some(TokenKind::Dollar),
            '#' => Some(TokenKind::Hash),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        match kind {
            Some(kind) => {
                self.bump();
                let text = &self.source[start.offset..self.offset()];
                Some(Ok(self.token(kind, Cow::Borrowed(text), start)))
            }
            None => Some(Err(self.error("unrecognized character", start))),
        }
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Result<Token<'s>, GrammarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.scan();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}
