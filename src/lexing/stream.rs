//! Token stream with one token of lookahead
//!
//!     The parser never touches the tokenizer directly. It reads through a [TokenStream],
//!     which wraps any `Iterator<Item = Result<Token>>` (the tokenizer, or a chain of
//!     extension stream filters on top of it), keeps the current token, and can peek one
//!     token further. Exhaustion is modelled as a sticky `Eof` token carrying the last line.

use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// A lazy token sequence, as produced by the tokenizer and rewritten by stream filters.
pub type TokenIter<'a> = Box<dyn Iterator<Item = Result<Token>> + 'a>;

pub struct TokenStream<'a> {
    iter: TokenIter<'a>,
    current: Token,
    peeked: Option<Token>,
    last_line: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(iter: TokenIter<'a>) -> Result<Self> {
        let mut stream = TokenStream {
            iter,
            current: Token::new(TokenKind::Eof, 1),
            peeked: None,
            last_line: 1,
        };
        stream.current = stream.pull()?;
        Ok(stream)
    }

    fn pull(&mut self) -> Result<Token> {
        match self.iter.next() {
            Some(Ok(token)) => {
                self.last_line = token.line;
                Ok(token)
            }
            Some(Err(err)) => Err(err),
            None => Ok(Token::new(TokenKind::Eof, self.last_line)),
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn line(&self) -> usize {
        self.current.line
    }

    /// The token after the current one.
    pub fn look(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            let token = self.pull()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.get_or_insert_with(|| Token::new(TokenKind::Eof, 0)))
    }

    /// Advance and return the token that was current.
    pub fn next_token(&mut self) -> Result<Token> {
        let upcoming = match self.peeked.take() {
            Some(token) => token,
            None if self.current.kind == TokenKind::Eof => self.current.clone(),
            None => self.pull()?,
        };
        Ok(std::mem::replace(&mut self.current, upcoming))
    }

    pub fn eos(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    /// Advance past the current token if it has the given kind (payload ignored).
    pub fn skip_if(&mut self, kind: &TokenKind) -> Result<bool> {
        if self.current.kind.same_kind(kind) {
            self.next_token()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Advance past the current token if it is the name `name`.
    pub fn skip_name(&mut self, name: &str) -> Result<bool> {
        if self.current.kind.is_name(name) {
            self.next_token()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn next_if(&mut self, kind: &TokenKind) -> Result<Option<Token>> {
        if self.current.kind.same_kind(kind) {
            return self.next_token().map(Some);
        }
        Ok(None)
    }

    /// Consume a token of the given kind or fail with a syntax error.
    pub fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.current.kind.same_kind(kind) {
            return self.next_token();
        }
        Err(self.unexpected(&kind.to_string()))
    }

    /// Consume the name `name` or fail.
    pub fn expect_name(&mut self, name: &str) -> Result<Token> {
        if self.current.kind.is_name(name) {
            return self.next_token();
        }
        Err(self.unexpected(&format!("'{}'", name)))
    }

    /// Consume any name and return it.
    pub fn expect_any_name(&mut self) -> Result<(String, usize)> {
        match &self.current.kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                let token = self.next_token()?;
                Ok((name, token.line))
            }
            _ => Err(self.unexpected("name")),
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        if self.eos() {
            return Error::syntax(
                format!("unexpected end of template, expected {}.", expected),
                self.current.line,
            );
        }
        Error::syntax(
            format!("expected token {}, got {}", expected, self.current.kind),
            self.current.line,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexing::{SyntaxConfig, Tokenizer, WhitespaceConfig};

    fn stream(source: &'static str) -> TokenStream<'static> {
        let tokenizer = Tokenizer::new(source, &SyntaxConfig::default(), &WhitespaceConfig::default());
        TokenStream::new(Box::new(tokenizer)).unwrap()
    }

    #[test]
    fn test_look_does_not_advance() {
        let mut s = stream("{{ a.b }}");
        assert_eq!(s.current().kind, TokenKind::VariableBegin);
        assert_eq!(s.look().unwrap().kind, TokenKind::Name("a".into()));
        assert_eq!(s.current().kind, TokenKind::VariableBegin);
        s.next_token().unwrap();
        assert_eq!(s.current().kind, TokenKind::Name("a".into()));
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut s = stream("x");
        s.next_token().unwrap();
        assert!(s.eos());
        s.next_token().unwrap();
        assert!(s.eos());
    }

    #[test]
    fn test_expect_reports_found_token() {
        let mut s = stream("{% for %}");
        s.next_token().unwrap();
        let err = s.expect(&TokenKind::VariableEnd).unwrap_err();
        assert_eq!(
            err.message(),
            "expected token end of print statement, got 'for'"
        );
    }
}
