//! Token definitions
//!
//!     Two layers live here. [RawToken] is the logos-derived lexer for the inside of a tag:
//!     names, literals and operators. [Token] is what the rest of the pipeline sees: a typed
//!     [TokenKind] (with literal values already decoded) plus the 1-indexed line it started on.
//!     Delimiter and data tokens only exist at the [Token] level; the tokenizer synthesizes
//!     them from the configured delimiters.

use std::fmt;

use logos::Logos;

/// Tag-interior tokens as recognized by logos.
///
/// Whitespace is not part of this grammar; the tokenizer skips it (and counts newlines)
/// before asking for the next token.
#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum RawToken {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name,

    #[regex(r"[0-9](_?[0-9])*")]
    Int,

    #[regex(r"[0-9](_?[0-9])*\.[0-9](_?[0-9])*([eE][+\-]?[0-9]+)?")]
    #[regex(r"[0-9](_?[0-9])*[eE][+\-]?[0-9]+")]
    Float,

    #[regex(r#"'([^'\\]|\\(.|\n))*'"#)]
    #[regex(r#""([^"\\]|\\(.|\n))*""#)]
    Str,

    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[token("//")]
    FloorDiv,
    #[token("%")]
    Mod,
    #[token("**")]
    Pow,
    #[token("~")]
    Tilde,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Lte,
    #[token(">")]
    Gt,
    #[token(">=")]
    Gte,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
}

/// A token kind with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Literal template text, already whitespace-controlled and newline-normalized.
    Data(String),
    VariableBegin,
    VariableEnd,
    BlockBegin,
    BlockEnd,
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Tilde,
    Dot,
    Comma,
    Colon,
    Pipe,
    Assign,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

impl TokenKind {
    /// Map a payload-free raw token to its kind. Literals are decoded by the tokenizer.
    pub(crate) fn operator(raw: RawToken) -> Option<TokenKind> {
        let kind = match raw {
            RawToken::Add => TokenKind::Add,
            RawToken::Sub => TokenKind::Sub,
            RawToken::Mul => TokenKind::Mul,
            RawToken::Div => TokenKind::Div,
            RawToken::FloorDiv => TokenKind::FloorDiv,
            RawToken::Mod => TokenKind::Mod,
            RawToken::Pow => TokenKind::Pow,
            RawToken::Tilde => TokenKind::Tilde,
            RawToken::Dot => TokenKind::Dot,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Pipe => TokenKind::Pipe,
            RawToken::Assign => TokenKind::Assign,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Ne => TokenKind::Ne,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Lte => TokenKind::Lte,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Gte => TokenKind::Gte,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Name | RawToken::Int | RawToken::Float | RawToken::Str => return None,
        };
        Some(kind)
    }

    /// Source spelling of operator kinds.
    pub fn operator_str(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Add => "+",
            TokenKind::Sub => "-",
            TokenKind::Mul => "*",
            TokenKind::Div => "/",
            TokenKind::FloorDiv => "//",
            TokenKind::Mod => "%",
            TokenKind::Pow => "**",
            TokenKind::Tilde => "~",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Pipe => "|",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Lte => "<=",
            TokenKind::Gt => ">",
            TokenKind::Gte => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            _ => return None,
        })
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, TokenKind::Name(n) if n == name)
    }

    /// Same variant, ignoring payload.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for TokenKind {
    /// Human-readable description used in error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(op) = self.operator_str() {
            return write!(f, "'{}'", op);
        }
        match self {
            TokenKind::Data(_) => f.write_str("template data / text"),
            TokenKind::VariableBegin => f.write_str("begin of print statement"),
            TokenKind::VariableEnd => f.write_str("end of print statement"),
            TokenKind::BlockBegin => f.write_str("begin of statement block"),
            TokenKind::BlockEnd => f.write_str("end of statement block"),
            TokenKind::Name(name) => write!(f, "'{}'", name),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::Int(_) => f.write_str("integer"),
            TokenKind::Float(_) => f.write_str("float"),
            TokenKind::Eof => f.write_str("end of template"),
            _ => Ok(()),
        }
    }
}

/// A token with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Token { kind, line }
    }
}

/// Number of physical newlines in `text`; `\r\n` counts once.
pub fn count_newlines(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => count += 1,
            b'\r' => {
                count += 1;
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<RawToken> {
        RawToken::lexer(source).filter_map(|t| t.ok()).collect()
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(lex_all("**"), vec![RawToken::Pow]);
        assert_eq!(lex_all("//"), vec![RawToken::FloorDiv]);
        assert_eq!(lex_all("<="), vec![RawToken::Lte]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex_all("1_000"), vec![RawToken::Int]);
        assert_eq!(lex_all("1.5e3"), vec![RawToken::Float]);
        assert_eq!(lex_all("2e10"), vec![RawToken::Float]);
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(lex_all(r#"'it\'s'"#), vec![RawToken::Str]);
        assert_eq!(lex_all(r#""a\"b""#), vec![RawToken::Str]);
    }

    #[test]
    fn test_count_newlines() {
        assert_eq!(count_newlines("a\nb\r\nc\rd"), 3);
        assert_eq!(count_newlines("abc"), 0);
    }

    #[test]
    fn test_describe() {
        assert_eq!(TokenKind::Name("endfor".into()).to_string(), "'endfor'");
        assert_eq!(TokenKind::Eof.to_string(), "end of template");
        assert_eq!(TokenKind::Pipe.to_string(), "'|'");
    }
}
