//! Lexer
//!
//!     This module turns raw template text into a lazy sequence of typed tokens. Template
//!     text is modal: outside of tags everything is literal data, inside `{{ }}` and `{% %}`
//!     it is a small expression language. The scanner in [tokenizer] handles the modal split
//!     (delimiters are configurable at runtime, so they can't be baked into a static lexer),
//!     and hands the interior of each tag to the logos lexer in [token].
//!
//! The Lexing Pipeline
//!
//!     1. Newline normalization and trailing-newline removal happen while data tokens are cut.
//!     2. Whitespace control (`-`, `+`, trim_blocks, lstrip_blocks) rewrites the content of the
//!        neighbouring data token before it is emitted. Delimiter tokens never carry it.
//!     3. Comments are consumed and dropped. They never reach stream filters or the parser.
//!     4. Adjacent string literals in one tag are merged into a single token.
//!
//!     The output is an iterator of `Result<Token>`; extensions may wrap it (stream filters)
//!     before it is handed to a [TokenStream] for parsing.

pub mod stream;
pub mod syntax;
pub mod token;
pub mod tokenizer;

pub use stream::{TokenIter, TokenStream};
pub use syntax::{NewlineSequence, SyntaxConfig, WhitespaceConfig};
pub use token::{count_newlines, Token, TokenKind};
pub use tokenizer::Tokenizer;

use crate::error::Result;

/// Tokenize a whole source eagerly.
///
/// Convenience for tooling and tests; the compile pipeline consumes the lazy [Tokenizer]
/// directly.
pub fn tokenize(
    source: &str,
    syntax: &SyntaxConfig,
    whitespace: &WhitespaceConfig,
) -> Result<Vec<Token>> {
    Tokenizer::new(source, syntax, whitespace).collect()
}
