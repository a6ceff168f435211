//! Grammar parser
//!
//! Turns the token stream into a [`Grammar`] with a precedence-climbing
//! expression parser:
//!
//! | level | operators |
//! |-------|-----------|
//! | 1     | `\|` (choice) |
//! | 2     | `~` (sequence) |
//! | term  | `#tag =`, then prefix `&` `!` |
//! | postfix | `?` `*` `+` `{n}` `{n,}` `{,n}` `{n,m}` |
//!
//! Chains at one level fold into a single n-ary node; parentheses produce
//! [`Expr::Group`], which stops flattening.

use super::expr::Expr;
use super::grammar::{Grammar, Modifiers, Rule};
use super::scanner::{tokenize, Token, TokenKind};
use crate::error::GrammarError;
use crate::source_location::SourcePosition;

/// Parse grammar source into an unvalidated [`Grammar`]
///
/// Duplicate rule names are rejected here; identifier resolution is left
/// to [`Grammar::validate`].
pub fn parse_grammar(source: &str) -> Result<Grammar, GrammarError> {
    let tokens = tokenize(source).collect::<Result<Vec<_>, _>>()?;
    GrammarParser {
        source,
        tokens,
        pos: 0,
    }
    .grammar()
}

/// Parse a single expression, e.g. `"a" ~ b*`
pub fn parse_expr(source: &str) -> Result<Expr, GrammarError> {
    let tokens = tokenize(source).collect::<Result<Vec<_>, _>>()?;
    let mut parser = GrammarParser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expression()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

struct GrammarParser<'s> {
    source: &'s str,
    tokens: Vec<Token<'s>>,
    pos: usize,
}

impl<'s> GrammarParser<'s> {
    fn peek(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token<'s>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, wanted: &str) -> GrammarError {
        match self.peek() {
            Some(token) => GrammarError::syntax(
                format!("expected {}", wanted),
                Some(token.text),
                token.position,
            ),
            None => GrammarError::syntax(
                format!("expected {}, found end of grammar", wanted),
                None,
                SourcePosition::from_offset(self.source, self.source.len()),
            ),
        }
    }

    fn expect(&mut self, kind: TokenKind, wanted: &str) -> Result<Token<'s>, GrammarError> {
        if self.peek_kind() == Some(kind) {
            self.advance().ok_or_else(|| self.unexpected(wanted))
        } else {
            Err(self.unexpected(wanted))
        }
    }

    fn grammar(mut self) -> Result<Grammar, GrammarError> {
        let mut grammar_doc = Vec::new();
        let mut rule_doc = Vec::new();
        let mut rules = Vec::new();
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::GrammarDoc => {
                    if let Some(token) = self.advance() {
                        grammar_doc.push(token.value.into_owned());
                    }
                }
                TokenKind::RuleDoc => {
                    if let Some(token) = self.advance() {
                        rule_doc.push(token.value.into_owned());
                    }
                }
                TokenKind::Ident => {
                    let rule = self.rule()?;
                    rules.push(rule.with_doc(std::mem::take(&mut rule_doc)));
                }
                _ => return Err(self.unexpected("rule definition")),
            }
        }
        Grammar::new(rules, grammar_doc)
    }

    fn rule(&mut self) -> Result<Rule, GrammarError> {
        let name = self.expect(TokenKind::Ident, "rule name")?;
        self.expect(TokenKind::Equals, "`=`")?;
        let modifiers = match self.peek_kind() {
            Some(TokenKind::Underscore) => Modifiers::SILENT,
            Some(TokenKind::At) => Modifiers::ATOMIC,
            Some(TokenKind::Dollar) => Modifiers::COMPOUND,
            Some(TokenKind::Bang) => Modifiers::NONATOMIC,
            _ => Modifiers::NONE,
        };
        if !modifiers.is_empty() {
            self.pos += 1;
        }
        self.expect(TokenKind::LBrace, "`{`")?;
        let expr = self.expression()?;
        self.expect(TokenKind::RBrace, "`}` or an operator")?;
        Ok(Rule::new(name.value.into_owned(), modifiers, expr))
    }

    fn expression(&mut self) -> Result<Expr, GrammarError> {
        self.eat(TokenKind::Pipe);
        self.climb(1)
    }

    fn climb(&mut self, min_power: u8) -> Result<Expr, GrammarError> {
        let mut lhs = self.term()?;
        loop {
            let power = match self.peek_kind() {
                Some(TokenKind::Pipe) => 1,
                Some(TokenKind::Tilde) => 2,
                _ => break,
            };
            if power < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.climb(power + 1)?;
            lhs = match (power, lhs) {
                (1, Expr::Choice(mut items)) => {
                    items.push(rhs);
                    Expr::Choice(items)
                }
                (1, lhs) => Expr::Choice(vec![lhs, rhs]),
                (_, Expr::Seq(mut items)) => {
                    items.push(rhs);
                    Expr::Seq(items)
                }
                (_, lhs) => Expr::Seq(vec![lhs, rhs]),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, GrammarError> {
        let tag = if self.eat(TokenKind::Hash) {
            let name = self.expect(TokenKind::Ident, "tag name")?;
            self.expect(TokenKind::Equals, "`=` after tag name")?;
            Some(name.value.into_owned())
        } else {
            None
        };

        let mut prefixes = Vec::new();
        while let Some(kind @ (TokenKind::Amp | TokenKind::Bang)) = self.peek_kind() {
            prefixes.push(kind);
            self.pos += 1;
        }

        let mut expr = self.primary()?;
        expr = self.postfix(expr)?;
        for kind in prefixes.into_iter().rev() {
            expr = match kind {
                TokenKind::Amp => Expr::PosPred(Box::new(expr)),
                _ => Expr::NegPred(Box::new(expr)),
            };
        }

        Ok(match tag {
            Some(tag) => Expr::Tag(tag, Box::new(expr)),
            None => expr,
        })
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, GrammarError> {
        loop {
            let Some(kind) = self.peek_kind() else {
                return Ok(expr);
            };
            expr = match kind {
                TokenKind::Question => Expr::Opt(Box::new(expr)),
                TokenKind::Star => Expr::Rep(Box::new(expr)),
                TokenKind::Plus => Expr::RepOnce(Box::new(expr)),
                TokenKind::LBrace => {
                    self.pos += 1;
                    expr = self.bounds(expr)?;
                    continue;
                }
                _ => return Ok(expr),
            };
            self.pos += 1;
        }
    }

    /// `{n}`, `{n,}`, `{,n}` or `{n,m}`, with the opening brace consumed
    fn bounds(&mut self, expr: Expr) -> Result<Expr, GrammarError> {
        let start = self.peek().map(|t| t.position);
        let min = self.count()?;
        let expr = if self.eat(TokenKind::Comma) {
            let max = self.count()?;
            match (min, max) {
                (Some(min), None) => Expr::RepMin(Box::new(expr), min),
                (None, Some(max)) => Expr::RepMax(Box::new(expr), max),
                (Some(min), Some(max)) => {
                    if min > max {
                        return Err(GrammarError::syntax(
                            format!("repetition bounds {{{},{}}} have min greater than max", min, max),
                            None,
                            start.unwrap_or_default(),
                        ));
                    }
                    Expr::RepRange(Box::new(expr), min, max)
                }
                (None, None) => return Err(self.unexpected("a repetition count")),
            }
        } else {
            match min {
                Some(n) => Expr::RepExact(Box::new(expr), n),
                None => return Err(self.unexpected("a repetition count")),
            }
        };
        self.expect(TokenKind::RBrace, "`}` closing the repetition")?;
        Ok(expr)
    }

    fn count(&mut self) -> Result<Option<u32>, GrammarError> {
        if self.peek_kind() != Some(TokenKind::Number) {
            return Ok(None);
        }
        let token = self.expect(TokenKind::Number, "a repetition count")?;
        token.value.parse::<u32>().map(Some).map_err(|_| {
            GrammarError::syntax(
                "repetition count must be a non-negative integer",
                Some(token.text),
                token.position,
            )
        })
    }

    fn index(&mut self) -> Result<Option<i32>, GrammarError> {
        if self.peek_kind() != Some(TokenKind::Number) {
            return Ok(None);
        }
        let token = self.expect(TokenKind::Number, "a stack index")?;
        token.value.parse::<i32>().map(Some).map_err(|_| {
            GrammarError::syntax("stack index out of range", Some(token.text), token.position)
        })
    }

    fn primary(&mut self) -> Result<Expr, GrammarError> {
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("an expression"));
        };
        match kind {
            TokenKind::Str => {
                let token = self.expect(TokenKind::Str, "a string")?;
                Ok(Expr::Str(token.value.into_owned()))
            }
            TokenKind::Caret => {
                self.pos += 1;
                let token = self.expect(TokenKind::Str, "a string after `^`")?;
                Ok(Expr::Insens(token.value.into_owned()))
            }
            TokenKind::Char => self.char_or_range(),
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "`)` or an operator")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            TokenKind::Ident => self.identifier(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn single_char(&mut self) -> Result<(char, Token<'s>), GrammarError> {
        let token = self.expect(TokenKind::Char, "a character literal")?;
        match token.value.chars().next() {
            Some(c) => Ok((c, token)),
            None => Err(GrammarError::syntax(
                "empty character literal",
                Some(token.text),
                token.position,
            )),
        }
    }

    fn char_or_range(&mut self) -> Result<Expr, GrammarError> {
        let (start, token) = self.single_char()?;
        if !self.eat(TokenKind::DotDot) {
            return Ok(Expr::Str(start.to_string()));
        }
        let (end, _) = self.single_char()?;
        if start > end {
            return Err(GrammarError::syntax(
                format!("character range {:?}..{:?} is empty", start, end),
                Some(token.text),
                token.position,
            ));
        }
        Ok(Expr::Range(start, end))
    }

    fn identifier(&mut self) -> Result<Expr, GrammarError> {
        let token = self.expect(TokenKind::Ident, "an identifier")?;
        match token.value.as_ref() {
            "PUSH" => {
                self.expect(TokenKind::LParen, "`(` after PUSH")?;
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "`)` closing PUSH")?;
                Ok(Expr::Push(Box::new(inner)))
            }
            "PUSH_LITERAL" => {
                self.expect(TokenKind::LParen, "`(` after PUSH_LITERAL")?;
                let value = self.expect(TokenKind::Str, "a string literal")?;
                self.expect(TokenKind::RParen, "`)` closing PUSH_LITERAL")?;
                Ok(Expr::PushLiteral(value.value.into_owned()))
            }
            "PEEK" if self.eat(TokenKind::LBracket) => {
                let start = self.index()?;
                self.expect(TokenKind::DotDot, "`..` in PEEK slice")?;
                let end = self.index()?;
                self.expect(TokenKind::RBracket, "`]` closing PEEK slice")?;
                Ok(Expr::PeekSlice(start.unwrap_or(0), end))
            }
            _ => Ok(Expr::Ident(token.value.into_owned())),
        }
    }
}
